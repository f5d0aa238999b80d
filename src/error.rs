use std::path::PathBuf;
use std::time::Duration;

/// Startup failures. Reading the library is the only thing allowed to abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse library {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot parse config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting {0}")]
    Invalid(String),
}

/// Classified reasons a page could not be retrieved
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("blocked ({})", describe_blocked(.status, .detail))]
    Blocked { status: Option<u16>, detail: String },

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("browser rendering failed: {0}")]
    Render(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

fn describe_blocked(status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("HTTP {}: {}", code, detail),
        None => detail.to_string(),
    }
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Blocked { .. }
            | FetchError::Timeout(_)
            | FetchError::Network(_)
            | FetchError::Render(_) => true,
            FetchError::Status(code) => matches!(code, 408 | 425 | 429 | 500..=599),
            FetchError::Malformed(_) | FetchError::InvalidUrl(_) => false,
        }
    }

    /// Whether the lightweight client was turned away and a rendering browser may get through
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Blocked { .. })
    }

    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else if e.is_decode() || e.is_body() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// No plausible chapter number on a fetched page
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no chapter number found by {parser} parser")]
    NoCandidate { parser: &'static str },

    #[error("page is empty")]
    EmptyPage,
}

/// Writing the library back failed; detected updates may be lost on the next run
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Cannot serialize library: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Delivery failures, always logged and never fatal
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl NotifyError {
    /// Transport errors, rate limiting and server errors are worth another try
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Request(_) => true,
            NotifyError::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
