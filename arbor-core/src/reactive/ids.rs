//! Identifier types for the reactive system.
//!
//! Every node, transition, channel and listener gets a unique ID when created.
//! IDs are what the reaction sets are keyed by, so registering the same
//! transition twice on a node is a no-op and removal is by identity.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique ID.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a reactive node.
    NodeId
);

define_id!(
    /// Unique identifier for a transition.
    TransitionId
);

define_id!(
    /// Unique identifier for a channel.
    ChannelId
);

define_id!(
    /// Unique identifier for a channel listener.
    ListenerId
);

define_id!(
    /// Unique identifier for a tree. Trees compare by this ID.
    TreeId
);

crate::impl_structural_eq!(NodeId, TransitionId, ChannelId, ListenerId, TreeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        let id3 = NodeId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ids_are_monotonic_per_kind() {
        let a = TransitionId::new();
        let b = TransitionId::new();
        assert!(a.raw() < b.raw());
    }

    #[test]
    fn display_names_the_kind() {
        let id = ListenerId::new();
        assert!(id.to_string().starts_with("ListenerId#"));
    }
}
