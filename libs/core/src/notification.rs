use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::payload::Payload;

/// Largest serialized payload the legacy protocol accepts
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// Raw device token decoded from its hex representation
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceToken(Vec<u8>);

impl DeviceToken {
    /// Decode a hex-encoded token
    pub fn parse(hex_token: &str) -> Result<Self> {
        Ok(Self(hex::decode(hex_token)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceToken({})", hex::encode(&self.0))
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// A notification addressed to a single device
///
/// The payload is already serialized; use [`Notification::with_payload`] to
/// build one from a [`Payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    device_token: String,
    expire_after_seconds: u32,
    payload: Bytes,
}

impl Notification {
    pub fn new(
        device_token: impl Into<String>,
        expire_after_seconds: u32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            device_token: device_token.into(),
            expire_after_seconds,
            payload: payload.into(),
        }
    }

    /// Build a notification by serializing `payload` to JSON
    pub fn with_payload(
        device_token: impl Into<String>,
        expire_after_seconds: u32,
        payload: &Payload,
    ) -> Result<Self> {
        Ok(Self::new(
            device_token,
            expire_after_seconds,
            payload.to_bytes()?,
        ))
    }

    pub fn device_token(&self) -> &str {
        &self.device_token
    }

    pub fn expire_after_seconds(&self) -> u32 {
        self.expire_after_seconds
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Decode the token and enforce the payload size ceiling
    ///
    /// Nothing that fails here is ever framed or written.
    pub fn prepare(&self) -> Result<PreparedNotification> {
        let token = DeviceToken::parse(&self.device_token)?;

        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(PreparedNotification {
            token,
            expire_after_seconds: self.expire_after_seconds,
            payload: self.payload.clone(),
        })
    }
}

/// A validated notification, ready to be framed
#[derive(Debug, Clone)]
pub struct PreparedNotification {
    token: DeviceToken,
    expire_after_seconds: u32,
    payload: Bytes,
}

impl PreparedNotification {
    pub fn token(&self) -> &[u8] {
        self.token.as_bytes()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Absolute expiry in unix seconds, relative to `now`
    ///
    /// Saturates at `u32::MAX` instead of wrapping.
    pub fn expiry_at(&self, now: SystemTime) -> u32 {
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let expiry = since_epoch.as_secs() + u64::from(self.expire_after_seconds);
        u32::try_from(expiry).unwrap_or(u32::MAX)
    }
}
