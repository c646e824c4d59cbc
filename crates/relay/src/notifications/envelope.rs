//! Service hook notification envelope.
//!
//! Azure DevOps posts one JSON shape for every event with an event specific
//! `resource`. Only the envelope is typed; formatters read the resource
//! through JSON pointers since its layout differs per event.
//!
//! See: <https://learn.microsoft.com/azure/devops/service-hooks/events>

use devops_relay_core::EventType;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Azure DevOps sends explicit `null` for absent fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Markdown {
    #[serde(deserialize_with = "null_as_default")]
    pub markdown: String,
}

/// A delivered service hook event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Envelope {
    #[serde(alias = "subscriptionID", deserialize_with = "null_as_default")]
    pub subscription_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: Markdown,
    #[serde(deserialize_with = "null_as_default")]
    pub detailed_message: Markdown,
    pub resource: Value,
    pub resource_containers: Value,
}

impl Envelope {
    /// Parse a delivery body.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed bodies.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The event type, `None` for events the relay has no formatter for.
    #[must_use]
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// The detailed markdown, or the short one when the detailed is empty.
    #[must_use]
    pub fn base_markdown(&self) -> &str {
        if self.detailed_message.markdown.is_empty() {
            &self.message.markdown
        } else {
            &self.detailed_message.markdown
        }
    }

    /// String at `pointer` inside `resource`, `None` when absent or empty.
    #[must_use]
    pub fn text(&self, pointer: &str) -> Option<&str> {
        self.resource
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Value at `pointer` inside `resource` rendered as text. Numbers are
    /// formatted; strings are returned as is.
    #[must_use]
    pub fn scalar(&self, pointer: &str) -> Option<String> {
        match self.resource.pointer(pointer)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn array(&self, pointer: &str) -> &[Value] {
        self.resource
            .pointer(pointer)
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Organization name from the collection container URL,
    /// e.g. `https://dev.azure.com/Org1/` gives `Org1`.
    #[must_use]
    pub fn organization(&self) -> Option<String> {
        let base_url = self
            .resource_containers
            .pointer("/collection/baseUrl")
            .and_then(Value::as_str)?;
        let url = url::Url::parse(base_url).ok()?;
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(str::to_string)
    }
}
