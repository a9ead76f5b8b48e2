use std::fmt;

use bytes::{Buf, BufMut};

use crate::codec::{ERROR_RESPONSE_COMMAND, ERROR_RESPONSE_SIZE};

/// Status code carried by an error-response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NoErrors,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    Unknown,
    Unrecognized(u8),
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::NoErrors => 0,
            Status::ProcessingError => 1,
            Status::MissingDeviceToken => 2,
            Status::MissingTopic => 3,
            Status::MissingPayload => 4,
            Status::InvalidTokenSize => 5,
            Status::InvalidTopicSize => 6,
            Status::InvalidPayloadSize => 7,
            Status::InvalidToken => 8,
            Status::Shutdown => 10,
            Status::Unknown => 255,
            Status::Unrecognized(code) => code,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Status::NoErrors => "No errors encountered",
            Status::ProcessingError => "Processing error",
            Status::MissingDeviceToken => "Missing device token",
            Status::MissingTopic => "Missing topic",
            Status::MissingPayload => "Missing payload",
            Status::InvalidTokenSize => "Invalid token size",
            Status::InvalidTopicSize => "Invalid topic size",
            Status::InvalidPayloadSize => "Invalid payload size",
            Status::InvalidToken => "Invalid token",
            Status::Shutdown => "Shutdown",
            Status::Unknown => "None (unknown)",
            Status::Unrecognized(_) => "Unrecognized status code",
        }
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0 => Status::NoErrors,
            1 => Status::ProcessingError,
            2 => Status::MissingDeviceToken,
            3 => Status::MissingTopic,
            4 => Status::MissingPayload,
            5 => Status::InvalidTokenSize,
            6 => Status::InvalidTopicSize,
            7 => Status::InvalidPayloadSize,
            8 => Status::InvalidToken,
            10 => Status::Shutdown,
            255 => Status::Unknown,
            other => Status::Unrecognized(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// A decoded error-response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub command: u8,
    pub status: Status,
    /// Identifier of the push-request frame this response refers to
    pub identifier: u32,
}

impl ErrorResponse {
    pub fn new(status: Status, identifier: u32) -> Self {
        Self {
            command: ERROR_RESPONSE_COMMAND,
            status,
            identifier,
        }
    }

    pub fn encode(&self) -> [u8; ERROR_RESPONSE_SIZE] {
        let mut out = [0u8; ERROR_RESPONSE_SIZE];
        let mut buf = &mut out[..];
        buf.put_u8(self.command);
        buf.put_u8(self.status.code());
        buf.put_u32(self.identifier);
        out
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for identifier {}", self.status, self.identifier)
    }
}

/// Interpret the bytes of one read as an error-response frame
///
/// Only a complete frame yields parsed fields; a partial or empty read
/// yields `None`. The command tag is reported as read, not checked.
pub fn decode_error_frame(bytes: &[u8]) -> Option<ErrorResponse> {
    if bytes.len() < ERROR_RESPONSE_SIZE {
        return None;
    }

    let mut buf = &bytes[..ERROR_RESPONSE_SIZE];
    Some(ErrorResponse {
        command: buf.get_u8(),
        status: Status::from(buf.get_u8()),
        identifier: buf.get_u32(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_frame() {
        let response = decode_error_frame(&[8, 8, 0, 0, 0x01, 0x02]).unwrap();
        assert_eq!(response.command, ERROR_RESPONSE_COMMAND);
        assert_eq!(response.status, Status::InvalidToken);
        assert_eq!(response.identifier, 0x0102);
    }

    #[test]
    fn partial_and_empty_reads_parse_nothing() {
        assert_eq!(decode_error_frame(&[]), None);
        assert_eq!(decode_error_frame(&[8, 8, 0]), None);
        assert_eq!(decode_error_frame(&[8, 8, 0, 0, 0]), None);
    }

    #[test]
    fn encode_matches_decode() {
        let response = ErrorResponse::new(Status::Shutdown, 41);
        assert_eq!(response.encode(), [8, 10, 0, 0, 0, 41]);
        assert_eq!(decode_error_frame(&response.encode()), Some(response));
    }

    #[test]
    fn status_codes_survive_conversion() {
        for code in 0..=u8::MAX {
            assert_eq!(Status::from(code).code(), code);
        }
        assert_eq!(Status::from(9), Status::Unrecognized(9));
        assert_eq!(Status::from(255), Status::Unknown);
    }

    #[test]
    fn display_includes_status_and_identifier() {
        let text = ErrorResponse::new(Status::MissingPayload, 3).to_string();
        assert_eq!(text, "Missing payload (4) for identifier 3");
    }
}
