use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid search request: {0}")]
    InvalidArgument(String),
    #[error("[{status}] {message}")]
    BadRequest {
        status: u16,
        code: String,
        message: String,
    },
    #[error("search API unavailable: {0}")]
    Unavailable(String),
    #[error("search request failed: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Whether the same request may succeed if retried unmodified.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Unavailable(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            FetchError::Unavailable(err.to_string())
        } else if err.is_decode() {
            FetchError::Unknown(format!("malformed response: {err}"))
        } else {
            FetchError::Unknown(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("offset {offset} exceeds the maximum of {max}")]
    Range { offset: u32, max: u32 },
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("registry is shutting down")]
    ShuttingDown,
    #[error("tracker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<FetchError> for TrackerError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidArgument(msg) => TrackerError::InvalidArgument(msg),
            err @ FetchError::BadRequest { .. } => TrackerError::UpstreamRejected(err.to_string()),
            FetchError::Unavailable(msg) => TrackerError::UpstreamUnavailable(msg),
            FetchError::Unknown(msg) => TrackerError::Upstream(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Readable message for a search API error code.
pub fn describe_api_error(code: &str) -> Option<&'static str> {
    match code {
        "SE01" => Some("malformed query request"),
        "SE02" => Some("display is outside the allowed range (1-100)"),
        "SE03" => Some("start is outside the allowed range (1-1000)"),
        "SE04" => Some("sort value is not supported"),
        "SE05" => Some("search API does not exist"),
        "SE06" => Some("query encoding is invalid"),
        "SE99" => Some("search API internal error"),
        _ => None,
    }
}
