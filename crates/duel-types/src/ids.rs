//! Type-safe identifier wrappers.
//!
//! [`EntityId`] is the one identifier shared by the logical game model,
//! the rendering projection, and the UI input surface. Every card instance
//! on the board carries one, and the consistency auditor compares the
//! three containers by it alone.
//!
//! [`CommandId`] and [`PhaseName`] are string-backed because their values
//! come from configuration rather than from the running game.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Unique identifier for a card instance in play.
///
/// Shared by the logical model, the rendering projection, and the
/// interactive affordances of the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Generates a newtype wrapper around a configured [`String`] name.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create a name from anything string-like.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }

        impl core::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name! {
    /// Identifier of a dispatchable user command (e.g. `attack`, `end-turn`).
    CommandId
}

define_name! {
    /// Name of a discrete game phase (e.g. `setup`, `player-main`).
    PhaseName
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn entity_ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn names_serialize_as_plain_strings() {
        let id = CommandId::new("attack");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"attack\""));
    }

    #[test]
    fn names_borrow_as_str_for_map_lookup() {
        let mut map: BTreeMap<PhaseName, u32> = BTreeMap::new();
        map.insert(PhaseName::from("setup"), 1);
        assert_eq!(map.get("setup"), Some(&1));
    }
}
