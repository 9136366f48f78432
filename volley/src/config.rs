use crate::constants::{DEFAULT_METHOD, DEFAULT_REQUESTS, DEFAULT_TIMEOUT, DEFAULT_WORKERS};
use crate::error::ConfigError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use std::time::Duration;

/// Settings for a single run. Built once before the run starts and never mutated afterwards.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use volley::RunConfig;
///
/// let config = RunConfig::new("http://127.0.0.1:3002/delay/ms/1")
///     .unwrap()
///     .requests(500)
///     .workers(8)
///     .delay(Duration::from_millis(5));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub url: Url,
    pub method: Method,
    pub body: Option<Bytes>,
    pub headers: HeaderMap,
    /// Total number of requests to send before the run stops on its own.
    pub requests: u64,
    /// Number of concurrent workers. Also bounds the idle connection pool.
    pub workers: usize,
    pub timeout: Duration,
    pub keep_alive: bool,
    /// Pause taken by each worker between two of its own requests.
    pub delay: Duration,
}

impl RunConfig {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let url = parse_url(url)?;
        Ok(Self {
            url,
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            requests: DEFAULT_REQUESTS,
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            keep_alive: true,
            delay: Duration::ZERO,
        })
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn requests(mut self, requests: u64) -> Self {
        self.requests = requests;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Checks the invariants the engine relies on. Called before any worker is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        if self.requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }

        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Url, ConfigError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingUrl);
    }

    Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

pub(crate) fn parse_method(method: &str) -> Result<Method, ConfigError> {
    let method = if method.is_empty() {
        DEFAULT_METHOD
    } else {
        method
    };

    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(method.to_string()))
}
