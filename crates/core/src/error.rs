use std::path::PathBuf;

/// Result alias that carries the custom [`PlayerError`] type.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Common error type for the core crate.
///
/// Everything here is fatal at startup. Once playback begins the frame
/// pipeline itself does not fail; only a dead transform worker surfaces as
/// [`PlayerError::Worker`].
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The animated bitmap or audio container could not be decoded.
    #[error("failed to decode `{}`: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    /// A required input file could not be opened or read.
    #[error("failed to read `{}`: {source}", path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration rejected during startup validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Configuration file is not valid JSON for [`crate::AppConfig`].
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The transform worker went away while the scheduler still needed it.
    #[error("transform worker {0}")]
    Worker(&'static str),
}

impl PlayerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }
}

impl From<&str> for PlayerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PlayerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
