use thiserror::Error;

/// Failures at the wire and transport layer
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{field} is {len} bytes, its length prefix holds at most 65535")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Gateway address not set")]
    MissingAddress,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake error: {0}")]
    Handshake(String),

    #[error("{operation} timeout exceeded")]
    Timeout { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
