//! Error types for the dataflow core.
//!
//! The core defines very few failure modes of its own. Panics raised by user
//! reactions or renderer callbacks are never caught here: they unwind through
//! the `write`/`instantiate` call that triggered them.

/// Errors reported by tree operations and shape-checked helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataflowError {
    /// A structural contract was broken (unmatched Entry markers, unflattened
    /// trees handed to the reconciler, double mounts).
    #[error("Invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken contract
        message: String,
    },

    /// Two sequences that must line up element-wise have different lengths.
    #[error("Shape mismatch: expected {expected} elements, found {found}")]
    ShapeMismatch {
        /// Length of the left-hand sequence
        expected: usize,
        /// Length of the right-hand sequence
        found: usize,
    },
}

impl DataflowError {
    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape(expected: usize, found: usize) -> Self {
        Self::ShapeMismatch { expected, found }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DataflowError>;
