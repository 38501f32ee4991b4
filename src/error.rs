use std::fmt;

/// Which rolling window tripped the request governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Daily,
    Minute,
}

impl Window {
    pub fn message(&self) -> &'static str {
        match self {
            Window::Daily => "Daily API limit reached (20/day). Please wait until tomorrow.",
            Window::Minute => "Minute API limit reached (5/min). Please slow down.",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Daily => write!(f, "daily"),
            Window::Minute => write!(f, "minute"),
        }
    }
}

/// Everything that can go wrong while collecting cards. None of these are
/// fatal: the user sees the message and may retry.
#[derive(Debug, thiserror::Error)]
pub enum IntelError {
    #[error("Storage error: {0}")]
    Persistence(String),

    #[error("{}", .window.message())]
    RateLimitExceeded { window: Window },

    #[error("Invalid JSON format: {0}")]
    MalformedExtractionOutput(String),

    #[error("Extraction request failed: {0}")]
    NetworkFailure(String),
}

impl From<rusqlite::Error> for IntelError {
    fn from(err: rusqlite::Error) -> Self {
        IntelError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for IntelError {
    fn from(err: std::io::Error) -> Self {
        IntelError::Persistence(err.to_string())
    }
}

pub type IntelResult<T> = std::result::Result<T, IntelError>;
