use thiserror::Error;

/// Failure of a client operation
///
/// Every variant is local to the call that produced it. Nothing is retried
/// by the client; retrying is up to the caller.
#[derive(Error, Debug)]
pub enum SendError {
    /// Identity material could not be turned into a transport configuration
    #[error("Identity error: {0}")]
    Identity(#[source] courier_fabric::Error),

    /// Dial or handshake failed for the connection this send triggered
    #[error("Connect error: {0}")]
    Connect(#[source] courier_fabric::Error),

    /// The notification was rejected before reaching the wire
    #[error("Invalid notification: {0}")]
    Invalid(#[from] courier_core::Error),

    /// The frame could not be encoded; no identifier was consumed
    #[error("Encode error: {0}")]
    Encode(#[source] courier_fabric::Error),

    /// Writing the frame failed; the identifier was consumed
    #[error("Write error for identifier {identifier}: {source}")]
    Write {
        identifier: u32,
        #[source]
        source: std::io::Error,
    },

    /// Closing the connection on request failed
    #[error("Close error: {0}")]
    Close(#[source] std::io::Error),

    /// The connection owner is no longer running
    #[error("Client has shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, SendError>;
