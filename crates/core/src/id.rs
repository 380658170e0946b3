//! Name-based identifiers used as registry keys.

use std::borrow::Borrow;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Name of an event (e.g. `"note-on"`).
///
/// Primary key of both handler registries. Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Arc<str>);

/// Identifies one handler among those registered for the same event type in
/// the same registry. Re-registering under an existing key replaces the entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerKey(Arc<str>);

macro_rules! impl_name_newtype {
    ($t:ident) => {
        impl $t {
            pub fn new(name: impl AsRef<str>) -> Self {
                Self(Arc::from(name.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl core::fmt::Debug for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}({:?})", stringify!($t), &*self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(Arc::from(value))
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(Arc::from(value))
            }
        }

        impl From<&$t> for $t {
            fn from(value: &$t) -> Self {
                value.clone()
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $t {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $t {
            fn eq(&self, other: &str) -> bool {
                &*self.0 == other
            }
        }

        impl PartialEq<&str> for $t {
            fn eq(&self, other: &&str) -> bool {
                &*self.0 == *other
            }
        }

        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self::from)
            }
        }
    };
}

impl_name_newtype!(EventType);
impl_name_newtype!(HandlerKey);

impl HandlerKey {
    /// Mint a fresh key for an anonymous subscription.
    ///
    /// Uses UUIDv7 (time-ordered), so generated keys sort by creation time.
    pub fn generate() -> Self {
        Self::from(Uuid::now_v7().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn equal_names_hash_to_the_same_slot() {
        let mut map = HashMap::new();
        map.insert(EventType::from("note-on"), 1);

        assert_eq!(map.get(&EventType::new("note-on")), Some(&1));
        // Borrow<str> allows lookups without allocating.
        assert_eq!(map.get("note-on"), Some(&1));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = HandlerKey::generate();
        let b = HandlerKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let ty = EventType::from("ping");
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, "\"ping\"");

        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", HandlerKey::from("k1")), "HandlerKey(\"k1\")");
        assert_eq!(EventType::from("ping").to_string(), "ping");
    }
}
