//! Typed ID wrappers for marshal.
//!
//! IDs are opaque String wrappers (serde-transparent) generated as UUID v4.
//! Consumers may also supply their own string values.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_uuid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a submitted message.
    MessageId
);
typed_id!(
    /// Unique identifier for a pending approval ticket.
    ApprovalId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_new_is_unique() {
        let a = MessageId::new_uuid();
        let b = MessageId::new_uuid();
        assert_ne!(a, b);
    }

    #[test]
    fn approval_id_from_string() {
        let id = ApprovalId::from_string("apr-1");
        assert_eq!(id.as_str(), "apr-1");
        assert_eq!(id.to_string(), "apr-1");
    }

    #[test]
    fn typed_id_serde_roundtrip() {
        let id = MessageId::from_string("MSG001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"MSG001\"");
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn typed_id_hash_equality() {
        use std::collections::HashSet;
        let a = ApprovalId::from_string("same");
        let b = ApprovalId::from_string("same");
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
