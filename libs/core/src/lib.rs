//! Courier Core - Notification data model
//!
//! Device tokens, notification payloads and the validation that happens
//! before a notification is allowed anywhere near the wire.
//!
//! # Example
//!
//! ```
//! use courier_core::{Notification, Payload};
//!
//! let payload = Payload::new().alert("Hello").badge(1).sound("default");
//! let notification = Notification::with_payload("ab12", 3600, &payload).unwrap();
//! let prepared = notification.prepare().unwrap();
//! assert_eq!(prepared.token(), &[0xab, 0x12]);
//! ```

pub mod error;
pub mod notification;
pub mod payload;

pub use error::{Error, Result};
pub use notification::{DeviceToken, Notification, PreparedNotification, MAX_PAYLOAD_SIZE};
pub use payload::{Alert, Payload};
