use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsujiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Translation channel closed before a response arrived")]
    ChannelClosed,

    #[error("Translation context invalidated")]
    ContextInvalidated,

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR worker initialization timed out")]
    OcrInitTimeout,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TsujiError {
    /// True for the session-fatal messaging failure, which latches until restart
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, TsujiError::ContextInvalidated)
    }
}

pub type Result<T> = std::result::Result<T, TsujiError>;
