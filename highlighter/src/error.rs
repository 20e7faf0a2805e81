use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// The transport could not complete the exchange at all (connection refused,
/// DNS failure, timeout, broken body stream).
#[derive(Debug, Error)]
#[error("transport failure: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
        }
    }
}

/// Why a highlight request produced no usable result.
///
/// These never reach the rendered document; the renderer converts them to
/// fallback markup.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("highlight service answered with status {status}")]
    Status { status: u16, body: String },

    #[error("malformed highlight response: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("cannot encode highlight request: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema problem. `span` is a byte range into the
    /// config source when the parser could locate it.
    #[error("{message}")]
    Parse {
        message: String,
        span: Option<Range<usize>>,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse {
            message: err.message().to_string(),
            span: err.span(),
        }
    }
}
