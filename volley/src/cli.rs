//! Command-line front end. Turns flags into a validated [`RunConfig`].
use crate::config::{parse_method, RunConfig};
use crate::constants::{DEFAULT_METHOD, DEFAULT_REQUESTS, DEFAULT_WORKERS};
use crate::error::ConfigError;
use bytes::Bytes;
use clap::{ArgAction, Parser};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "volley", version, about = "Concurrent HTTP load generator")]
pub struct Cli {
    /// Endpoint url to stress
    #[arg(short, long)]
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = DEFAULT_METHOD)]
    pub method: String,

    /// Request body; prefix with '@' to read it from a file
    #[arg(short, long)]
    pub data: Option<String>,

    /// Headers to include in every request: h1=v1,h2=v2
    #[arg(short = 'H', long)]
    pub headers: Option<String>,

    /// Number of requests to make
    #[arg(short = 'n', long, default_value_t = DEFAULT_REQUESTS)]
    pub count: u64,

    /// Max number of simultaneous connections (one worker each)
    #[arg(short = 'c', long, default_value_t = DEFAULT_WORKERS)]
    pub max_connections: usize,

    /// Per-request timeout, e.g. `10s` or `500ms`
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Reuse connections between requests
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub keep_alive: bool,

    /// Time each worker waits between its requests, e.g. `50ms`
    #[arg(long, default_value = "0ms", value_parser = humantime::parse_duration)]
    pub delay: Duration,

    /// Increase log verbosity (-v, -vv, -vvv). Logs go to stderr.
    #[arg(short, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut config = RunConfig::new(&self.url)?
            .method(parse_method(&self.method)?)
            .requests(self.count)
            .workers(self.max_connections)
            .timeout(self.timeout)
            .keep_alive(self.keep_alive)
            .delay(self.delay);

        if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
            config = config.body(resolve_body(data)?);
        }

        if let Some(headers) = self.headers.as_deref().filter(|h| !h.is_empty()) {
            config = config.headers(parse_headers(headers)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Default tracing filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "volley=warn",
            1 => "volley=info",
            2 => "volley=debug",
            _ => "volley=trace",
        }
    }
}

/// Parses `k1=v1,k2=v2`. Each pair is split on its first `=`, so values may contain `=`.
pub fn parse_headers(arg: &str) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    for pair in arg.split(',') {
        let invalid = || ConfigError::InvalidHeader(pair.to_string());

        let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }

        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// A leading `@` names a file to read the body from; anything else is the body itself.
pub fn resolve_body(arg: &str) -> Result<Bytes, ConfigError> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read(path)
            .map(Bytes::from)
            .map_err(|source| ConfigError::BodyFile {
                path: path.to_string(),
                source,
            }),
        None => Ok(Bytes::copy_from_slice(arg.as_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("volley").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["--url", "http://localhost:3000/"])
            .into_config()
            .unwrap();

        assert_eq!(config.method, Method::GET);
        assert_eq!(config.requests, 10_000);
        assert_eq!(config.workers, 15);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.keep_alive);
        assert!(config.delay.is_zero());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn all_flags() {
        let config = parse(&[
            "-u",
            "https://example.com/api",
            "-X",
            "post",
            "-d",
            "{\"a\":1}",
            "-H",
            "content-type=application/json,x-token=a=b",
            "-n",
            "42",
            "-c",
            "3",
            "--timeout",
            "750ms",
            "--keep-alive",
            "false",
            "--delay",
            "20ms",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.method, Method::POST);
        assert_eq!(config.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(config.headers["content-type"], "application/json");
        assert_eq!(config.headers["x-token"], "a=b");
        assert_eq!(config.requests, 42);
        assert_eq!(config.workers, 3);
        assert_eq!(config.timeout, Duration::from_millis(750));
        assert!(!config.keep_alive);
        assert_eq!(config.delay, Duration::from_millis(20));
    }

    #[test]
    fn url_is_required() {
        assert!(Cli::try_parse_from(["volley"]).is_err());
    }

    #[test]
    fn empty_url_is_a_config_error() {
        let err = parse(&["--url", ""]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingUrl));
    }

    #[test]
    fn header_without_value_is_rejected() {
        let err = parse_headers("a=1,broken").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader(ref h) if h == "broken"));
        assert_eq!(err.to_string(), "invalid header argument: 'broken'");
    }

    #[test]
    fn header_with_empty_key_is_rejected() {
        assert!(matches!(
            parse_headers("=value"),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn body_from_file() {
        let path = std::env::temp_dir().join(format!("volley-body-{}.json", std::process::id()));
        std::fs::write(&path, b"from a file").unwrap();

        let body = resolve_body(&format!("@{}", path.display())).unwrap();
        assert_eq!(&body[..], b"from a file");

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_body_file_is_reported() {
        let err = resolve_body("@/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::BodyFile { ref path, .. } if path == "/definitely/not/here.json"));
    }

    #[test]
    fn verbosity_raises_filter() {
        assert_eq!(parse(&["-u", "http://a/"]).log_filter(), "volley=warn");
        assert_eq!(parse(&["-u", "http://a/", "-vv"]).log_filter(), "volley=debug");
    }
}
