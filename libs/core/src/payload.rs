use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Application payload of a push notification
///
/// Serialized as a JSON object with an `aps` dictionary plus any custom
/// top-level keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    aps: Aps,
    #[serde(flatten)]
    custom: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<String>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    content_available: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

/// Alert shown to the user, either a plain string or a localized dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alert {
    Plain(String),
    Localized {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(rename = "loc-key", skip_serializing_if = "Option::is_none")]
        loc_key: Option<String>,
        #[serde(rename = "loc-args", default, skip_serializing_if = "Vec::is_empty")]
        loc_args: Vec<String>,
        #[serde(rename = "action-loc-key", skip_serializing_if = "Option::is_none")]
        action_loc_key: Option<String>,
        #[serde(rename = "launch-image", skip_serializing_if = "Option::is_none")]
        launch_image: Option<String>,
    },
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain string alert
    pub fn alert(mut self, text: impl Into<String>) -> Self {
        self.aps.alert = Some(Alert::Plain(text.into()));
        self
    }

    /// Set a structured alert
    pub fn alert_with(mut self, alert: Alert) -> Self {
        self.aps.alert = Some(alert);
        self
    }

    pub fn badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    /// Mark the notification as a silent background update
    pub fn content_available(mut self) -> Self {
        self.aps.content_available = Some(1);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.aps.category = Some(category.into());
        self
    }

    /// Add a custom top-level key next to `aps`
    ///
    /// A custom key named `aps` is ignored on serialization.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "aps" {
            self.custom.insert(key, value.into());
        }
        self
    }

    /// Serialize to compact JSON
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
