/// Custom error types for the subscriber broadcast bot.
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration errors (missing or invalid environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telegram API errors.
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Generic I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result alias using our custom error type.
pub type Result<T> = std::result::Result<T, BotError>;
