use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{PUSH_COMMAND, PUSH_HEADER_SIZE};
use crate::error::{Error, Result};

/// A decoded push-request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFrame {
    pub identifier: u32,
    pub expiry: u32,
    pub token: Bytes,
    pub payload: Bytes,
}

/// Encode a push-request frame
///
/// Layout: `command(1) | identifier(4) | expiry(4) | token_len(2) | token | payload_len(2) | payload`
///
/// Fails only when the token or payload cannot be described by a 16-bit
/// length field.
pub fn encode_push_frame(identifier: u32, expiry: u32, token: &[u8], payload: &[u8]) -> Result<Bytes> {
    let token_len = field_len("token", token)?;
    let payload_len = field_len("payload", payload)?;

    let mut buf = BytesMut::with_capacity(PUSH_HEADER_SIZE + token.len() + payload.len());
    buf.put_u8(PUSH_COMMAND);
    buf.put_u32(identifier);
    buf.put_u32(expiry);
    buf.put_u16(token_len);
    buf.put_slice(token);
    buf.put_u16(payload_len);
    buf.put_slice(payload);

    Ok(buf.freeze())
}

/// Decode a complete push-request frame
///
/// The input must hold exactly one frame.
pub fn decode_push_frame(bytes: &[u8]) -> Result<PushFrame> {
    let mut buf = bytes;

    if buf.remaining() < 1 + 4 + 4 + 2 {
        return Err(truncated(bytes.len()));
    }

    let command = buf.get_u8();
    if command != PUSH_COMMAND {
        return Err(Error::InvalidFrame(format!(
            "Unexpected command tag: {}",
            command
        )));
    }

    let identifier = buf.get_u32();
    let expiry = buf.get_u32();
    let token = take_field(&mut buf, bytes.len())?;
    let payload = take_field(&mut buf, bytes.len())?;

    if buf.has_remaining() {
        return Err(Error::InvalidFrame(format!(
            "{} trailing bytes after frame",
            buf.remaining()
        )));
    }

    Ok(PushFrame {
        identifier,
        expiry,
        token,
        payload,
    })
}

fn field_len(field: &'static str, bytes: &[u8]) -> Result<u16> {
    u16::try_from(bytes.len()).map_err(|_| Error::FieldTooLong {
        field,
        len: bytes.len(),
    })
}

fn take_field(buf: &mut &[u8], total: usize) -> Result<Bytes> {
    if buf.remaining() < 2 {
        return Err(truncated(total));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(truncated(total));
    }
    Ok(buf.copy_to_bytes(len))
}

fn truncated(len: usize) -> Error {
    Error::InvalidFrame(format!("Truncated push frame: {} bytes", len))
}
