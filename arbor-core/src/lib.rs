//! Arbor Core
//!
//! This crate provides the dataflow core for Arbor, a reactive layer for
//! tree-shaped UI descriptions. It implements:
//!
//! - Reactive primitives (nodes, transitions, channels)
//! - Structural equality used to gate propagation
//! - Reactive trees with Entry-based flattening
//! - A reconciler that mirrors trees into an external structure
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Nodes, explicitly bound transitions and event channels
//! - `tree`: Reactive trees, traversal, flattening and reconciliation
//! - `value`: A dynamic value type for heterogeneous node contents
//! - `vector`: Shape-checked element-wise arithmetic
//! - `error`: Error types
//!
//! Everything runs synchronously on the calling thread. Logging goes through
//! `tracing`; installing a subscriber is up to the application.
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::reactive::{bind, Node};
//!
//! // Create a node
//! let count = Node::new(0);
//!
//! // Derive a value
//! let doubled = count.map(|v| v.unwrap_or(0) * 2);
//!
//! // React to changes
//! let shown = doubled.clone();
//! bind(&[&doubled], move || {
//!     println!("Doubled: {:?}", shown.read());
//! });
//!
//! // Update the node
//! count.write(5);
//! // The transition runs synchronously, prints: "Doubled: Some(10)"
//! ```

pub mod error;
pub mod reactive;
pub mod tree;
pub mod value;
pub mod vector;

pub use error::{DataflowError, Result};
pub use value::Value;
