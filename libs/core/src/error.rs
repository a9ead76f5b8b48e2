use thiserror::Error;

/// Reasons a notification is refused before it reaches the wire
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device token: {0}")]
    InvalidToken(#[from] hex::FromHexError),

    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
