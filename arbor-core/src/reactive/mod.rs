//! Reactive Primitives
//!
//! This module implements the dataflow half of Arbor: nodes, transitions and
//! channels.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A Node is a mutable cell holding an optional value. Writes are gated by
//! structural equality, so writing an equal value does nothing. An accepted
//! write runs every bound transition exactly once, synchronously.
//!
//! ## Transitions
//!
//! A Transition is a reaction explicitly bound to a list of nodes. There is
//! no automatic dependency tracking: the caller names the nodes up front, and
//! the reaction reads whatever it likes.
//!
//! ## Channels
//!
//! A Channel is a discrete event port. Every put notifies every listener,
//! even when the value did not change.
//!
//! # Implementation Notes
//!
//! Everything runs on the caller's thread. The only safeguard against
//! feedback loops is the per-node `updating` flag; networks are expected to
//! settle in a single pass.

mod channel;
mod equality;
pub(crate) mod ids;
mod metadata;
mod node;
mod transition;

pub use channel::{
    derive_channel, listen, listen_once, map_channels, unlisten, Channel, Listenable, Listener,
    Port, WeakChannel,
};
pub use equality::{equal, StructuralEq};
pub use ids::{ChannelId, ListenerId, NodeId, TransitionId};
pub use metadata::{MetaKey, Metadata};
pub use node::{Dependency, Node, NodeValue, Source, WeakNode};
pub use transition::{
    bind, bind_lazy, derive, guarded_bind, guarded_derive, guarded_map_values, map_values, unbind,
    Flow, IntoFlow, Transition,
};
