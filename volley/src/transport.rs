//! HTTP transport used by the workers.
//!
//! The engine only depends on the [`Transport`] trait; [`ReqwestTransport`] is the production
//! implementation backed by a pooled `reqwest::Client`.
use crate::config::RunConfig;
use crate::error::{TransportError, VolleyError};
use crate::timing::{timed, ConnectTimingLayer};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::{Client, Method, StatusCode, Url};
use std::future::Future;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Everything needed to build one request. Derived once per run; cloning is cheap since the
/// body is a reference-counted `Bytes` and is re-read from the start on every attempt.
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl From<&RunConfig> for RequestTemplate {
    fn from(config: &RunConfig) -> Self {
        let mut headers = config.headers.clone();
        if !config.keep_alive {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }

        Self {
            method: config.method.clone(),
            url: config.url.clone(),
            headers,
            body: config.body.clone(),
        }
    }
}

/// Result of one attempt: the status received (or why none was) and the measured latency.
///
/// Latency covers the span from the request holding a connection (pooled, or freshly
/// established) to the response headers. Connection setup is not included. It is zero when the
/// attempt failed before a connection was obtained.
#[derive(Debug)]
pub struct Attempt {
    pub outcome: Result<StatusCode, TransportError>,
    pub latency: Duration,
}

pub trait Transport: Send + Sync + 'static {
    type Request: Send;

    /// Builds a fresh request for a single attempt.
    fn prepare(&self, template: &RequestTemplate) -> Result<Self::Request, TransportError>;

    /// Sends the request, drains and discards the response body, and reports the outcome.
    fn execute(&self, request: Self::Request) -> impl Future<Output = Attempt> + Send;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &RunConfig) -> Result<Self, VolleyError> {
        let idle_per_host = if config.keep_alive { config.workers } else { 0 };

        let client = Client::builder()
            .pool_max_idle_per_host(idle_per_host)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .tcp_nodelay(true)
            .connector_layer(ConnectTimingLayer)
            .build()
            .map_err(VolleyError::Client)?;

        debug!(
            "HTTP client ready: idle_per_host={idle_per_host}, timeout={}",
            humantime::format_duration(config.timeout)
        );

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    type Request = reqwest::Request;

    fn prepare(&self, template: &RequestTemplate) -> Result<Self::Request, TransportError> {
        let mut builder = self
            .client
            .request(template.method.clone(), template.url.clone())
            .headers(template.headers.clone());

        if let Some(body) = &template.body {
            builder = builder.body(body.clone());
        }

        Ok(builder.build()?)
    }

    async fn execute(&self, request: Self::Request) -> Attempt {
        let (res, latency) = timed(self.client.execute(request)).await;

        let response = match res {
            Ok(response) => response,
            Err(err) => {
                // Failures before a connection is obtained have no meaningful latency.
                let latency = if err.is_connect() {
                    Duration::ZERO
                } else {
                    latency
                };
                return Attempt {
                    outcome: Err(err.into()),
                    latency,
                };
            }
        };

        let status = response.status();

        // Drain so the connection can go back to the pool.
        if let Err(err) = response.bytes().await {
            trace!("Discarding unreadable body for {status}: {err}");
        }

        Attempt {
            outcome: Ok(status),
            latency,
        }
    }
}
