//! Newtype IDs for chat-platform entities.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally passing a channel id where a user id is expected.

/// Length of every chat-platform entity id.
pub const PLATFORM_ID_LENGTH: usize = 26;

/// Whether `id` has the shape of a chat-platform entity id: 26 ASCII
/// alphanumeric characters.
#[must_use]
pub fn is_valid_platform_id(id: &str) -> bool {
    id.len() == PLATFORM_ID_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Default`
/// - Conversion methods: `new()`, `as_str()`, `is_valid()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use devops_relay_core::define_id;
/// define_id!(BotId);
///
/// let bot = BotId::new("abcdefghijklmnopqrstuvwxyz");
/// assert!(bot.is_valid());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            Default,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID has the platform's id shape.
            #[must_use]
            pub fn is_valid(&self) -> bool {
                $crate::types::id::is_valid_platform_id(&self.0)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_id!(UserId);
define_id!(ChannelId);
define_id!(TeamId);
define_id!(PostId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_platform_id() {
        assert!(is_valid_platform_id("mockChannelIDmockChannelID"));
        assert!(ChannelId::new("mockChannelIDmockChannelID").is_valid());
    }

    #[test]
    fn test_invalid_platform_ids() {
        assert!(!is_valid_platform_id("mockInvalidChannelID"));
        assert!(!is_valid_platform_id(""));
        assert!(!is_valid_platform_id("mockChannelIDmockChannel-D"));
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = UserId::new("user");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"user\"");
        assert_eq!(id.to_string(), "user");
    }
}
