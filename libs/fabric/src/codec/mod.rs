//! Binary frames of the legacy push protocol
//!
//! Two shapes travel over a connection: push-request frames written by the
//! client and error-response frames the server may send back at any time.
//! All integers are big-endian.

pub mod push;
pub mod response;

pub use self::push::{decode_push_frame, encode_push_frame, PushFrame};
pub use self::response::{decode_error_frame, ErrorResponse, Status};

/// Command tag of a push-request frame
pub const PUSH_COMMAND: u8 = 1;

/// Command tag of an error-response frame
pub const ERROR_RESPONSE_COMMAND: u8 = 8;

/// Size of a complete error-response frame
pub const ERROR_RESPONSE_SIZE: usize = 6;

/// Fixed bytes of a push-request frame around the token and payload
pub const PUSH_HEADER_SIZE: usize = 1 + 4 + 4 + 2 + 2;
