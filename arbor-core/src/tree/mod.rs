//! Reactive Trees
//!
//! Tree-shaped descriptions whose children live in nodes, plus the
//! operations that consume them.
//!
//! # Concepts
//!
//! ## Trees
//!
//! A [`Tree`] is a value with a reactive children list. Values may be nested
//! trees that wrap their children through [`Entry`] markers.
//!
//! ## Flattening
//!
//! [`flatten`] splices nested trees into their wrappers so that every value
//! is a plain item. It runs once, up front; the flattened tree then follows
//! its source as children change.
//!
//! ## Reconciliation
//!
//! A [`Reconciler`] mirrors a flattened tree into an external structure via
//! a [`Renderer`], creating and destroying outputs as children come and go.

mod flatten;
mod map;
mod reconcile;
mod switch;
#[allow(clippy::module_inception)]
mod tree;

pub use flatten::flatten;
pub use map::{first, map_if, map_if_else, map_top, map_tree, tree_path, walk_tree, Path, Walk};
pub use reconcile::{MountState, Reconciler, Renderer};
pub use switch::{switcher, Route};
pub use tree::{Children, Entry, Tree, TreeId, TreeValue};
