use thiserror::Error;

/// Errors raised while turning operator input into a [`RunConfig`](crate::RunConfig).
///
/// These are the only failures that stop a run before it starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a target url must be specified")]
    MissingUrl,

    #[error("invalid target url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported url scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("invalid request method '{0}'")]
    InvalidMethod(String),

    #[error("invalid header argument: '{0}'")]
    InvalidHeader(String),

    #[error("unable to read request body from '{path}': {source}")]
    BodyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request count must be greater than zero")]
    ZeroRequests,

    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Per-attempt failures. Never fatal to a worker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    Build(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed reading response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Build(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum VolleyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to construct http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
