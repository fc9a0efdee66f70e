//! Node Implementation
//!
//! A Node is the mutable reactive cell of the dataflow graph. It holds an
//! optional value, remembers the value it held before the last change, and
//! keeps the set of transitions bound to it.
//!
//! # How Writes Work
//!
//! 1. If the node is already propagating a change, the write is dropped.
//!    This per-node `updating` flag is the only guard against a transition
//!    feeding back into the node that triggered it.
//!
//! 2. If the new value is structurally equal to the current one, nothing
//!    happens: no reaction runs and `previous` is untouched.
//!
//! 3. Otherwise `previous` takes the current value, the new value is stored,
//!    and every bound transition runs once, synchronously, in registration
//!    order.
//!
//! Networks are assumed to stabilize in that single pass. There is no
//! scheduler and no fixpoint iteration: a cascading write to another node
//! propagates immediately, depth first, from inside the reaction.
//!
//! # Absent Values
//!
//! `None` is the graph's explicit "absent" marker. Guarded bindings wait
//! until all of their nodes hold `Some`. Falsy-but-present values such as
//! `Some(0)` count as present.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::equality::{equal, StructuralEq};
use super::ids::{NodeId, TransitionId};
use super::metadata::{MetaKey, Metadata};
use super::transition::{Flow, Transition};

/// Values a node can hold.
pub trait NodeValue: StructuralEq + Clone + Send + Sync + 'static {}

impl<T: StructuralEq + Clone + Send + Sync + 'static> NodeValue for T {}

/// Type-erased view of a node, as seen by the transitions bound to it.
pub trait Source: Send + Sync {
    /// ID of the underlying node.
    fn node_id(&self) -> NodeId;

    /// True if the node currently holds a value.
    fn is_present(&self) -> bool;

    /// Register a transition. Returns false if it was already registered.
    fn attach(&self, transition: &Transition) -> bool;

    /// Unregister a transition. Unknown IDs are ignored.
    fn detach(&self, id: TransitionId);

    /// Check whether a transition is registered.
    fn is_bound(&self, id: TransitionId) -> bool;
}

/// Anything a transition can be bound to.
pub trait Dependency {
    /// Shared handle to the node behind this dependency.
    fn source(&self) -> Arc<dyn Source>;
}

struct NodeState<T> {
    value: Option<T>,
    previous: Option<T>,
    updating: bool,
}

pub(crate) struct NodeInner<T> {
    id: NodeId,
    state: Mutex<NodeState<T>>,
    transitions: Mutex<IndexMap<TransitionId, Transition>>,
    meta: Mutex<Metadata>,
}

/// Resets the `updating` flag when a propagation pass ends, including when
/// a reaction panics.
struct UpdateGuard<'a, T> {
    state: &'a Mutex<NodeState<T>>,
}

impl<T> Drop for UpdateGuard<'_, T> {
    fn drop(&mut self) {
        self.state.lock().updating = false;
    }
}

/// A reactive cell holding an optional value of type `T`.
///
/// Cloning a node yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Node::new(1);
/// let doubled = count.map(|v| v.unwrap_or(0) * 2);
///
/// count.write(5);
/// assert_eq!(doubled.read(), Some(10));
/// ```
pub struct Node<T> {
    inner: Arc<NodeInner<T>>,
}

impl<T: NodeValue> Node<T> {
    /// Create a node holding `value`.
    pub fn new(value: T) -> Self {
        Self::with_value(Some(value))
    }

    /// Create a node with no value.
    pub fn empty() -> Self {
        Self::with_value(None)
    }

    /// Create a node from an optional initial value.
    pub fn with_value(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: NodeId::new(),
                state: Mutex::new(NodeState {
                    value,
                    previous: None,
                    updating: false,
                }),
                transitions: Mutex::new(IndexMap::new()),
                meta: Mutex::new(Metadata::new()),
            }),
        }
    }

    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    pub fn read(&self) -> Option<T> {
        self.inner.state.lock().value.clone()
    }

    /// Get the value held before the most recent change.
    pub fn previous(&self) -> Option<T> {
        self.inner.state.lock().previous.clone()
    }

    /// True if the node currently holds a value.
    pub fn is_present(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    /// True while the node is running its transitions.
    pub fn is_updating(&self) -> bool {
        self.inner.state.lock().updating
    }

    /// Store `value` and propagate it.
    pub fn write(&self, value: T) {
        self.set(Some(value));
    }

    /// Remove the value and propagate the absence.
    pub fn clear(&self) {
        self.set(None);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let next = f(self.read());
        self.set(next);
    }

    /// Set a new (possibly absent) value.
    ///
    /// Does nothing while this node is already propagating, or when `value`
    /// is structurally equal to the current value. Otherwise every bound
    /// transition runs exactly once before this returns.
    ///
    /// # Panics
    ///
    /// A panic inside a transition propagates to the caller and the remaining
    /// transitions of this pass do not run. The node itself is left
    /// consistent: the new value is stored and `updating` is reset.
    pub fn set(&self, value: Option<T>) {
        {
            let mut state = self.inner.state.lock();
            if state.updating {
                tracing::trace!(node = %self.inner.id, "write suppressed: node is propagating");
                return;
            }
            if equal(&state.value, &value) {
                return;
            }
            state.previous = std::mem::replace(&mut state.value, value);
            state.updating = true;
        }
        let _guard = UpdateGuard {
            state: &self.inner.state,
        };

        let reactions: SmallVec<[Transition; 8]> =
            self.inner.transitions.lock().values().cloned().collect();
        tracing::trace!(
            node = %self.inner.id,
            reactions = reactions.len(),
            "propagating node change"
        );

        for transition in reactions {
            // Skip entries unbound earlier in this same pass.
            if !self.inner.is_bound(transition.id()) {
                continue;
            }
            if transition.fire() == Flow::Remove {
                transition.unbind();
            }
        }
    }

    /// Number of transitions bound to this node.
    pub fn transition_count(&self) -> usize {
        self.inner.transitions.lock().len()
    }

    /// Check whether `transition` is bound to this node.
    pub fn has_transition(&self, transition: &Transition) -> bool {
        self.inner.is_bound(transition.id())
    }

    /// Store a metadata value under `key`, returning the old one.
    pub fn set_meta<V: Send + Sync + 'static>(&self, key: MetaKey<V>, value: V) -> Option<Arc<V>> {
        self.inner.meta.lock().insert(key, value)
    }

    /// Look up the metadata value stored under `key`.
    pub fn meta<V: Send + Sync + 'static>(&self, key: MetaKey<V>) -> Option<Arc<V>> {
        self.inner.meta.lock().get(key)
    }

    /// Remove the metadata value stored under `key`.
    pub fn remove_meta<V: Send + Sync + 'static>(&self, key: MetaKey<V>) -> Option<Arc<V>> {
        self.inner.meta.lock().remove(key)
    }

    /// Check whether metadata is stored under `key`.
    pub fn has_meta<V>(&self, key: MetaKey<V>) -> bool {
        self.inner.meta.lock().contains(key)
    }

    /// True if both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a handle that does not keep the node alive.
    pub fn downgrade(&self) -> WeakNode<T> {
        WeakNode {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning handle to a node.
///
/// A node owns its transitions, so a reaction that reads the node it is bound
/// to must hold one of these. A strong handle there is never released.
pub struct WeakNode<T> {
    inner: Weak<NodeInner<T>>,
}

impl<T: NodeValue> WeakNode<T> {
    /// Get a strong handle, if the node is still alive.
    pub fn upgrade(&self) -> Option<Node<T>> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    /// Current value, or `None` once the node is gone.
    pub fn read(&self) -> Option<T> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.state.lock().value.clone())
    }

    /// True while some strong handle or derived reaction keeps the node.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakNode<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> NodeInner<T> {
    fn is_bound(&self, id: TransitionId) -> bool {
        self.transitions.lock().contains_key(&id)
    }
}

impl<T: NodeValue> Source for NodeInner<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn is_present(&self) -> bool {
        self.state.lock().value.is_some()
    }

    fn attach(&self, transition: &Transition) -> bool {
        let mut transitions = self.transitions.lock();
        if transitions.contains_key(&transition.id()) {
            return false;
        }
        transitions.insert(transition.id(), transition.clone());
        true
    }

    fn detach(&self, id: TransitionId) {
        self.transitions.lock().shift_remove(&id);
    }

    fn is_bound(&self, id: TransitionId) -> bool {
        NodeInner::is_bound(self, id)
    }
}

impl<T: NodeValue> Dependency for Node<T> {
    fn source(&self) -> Arc<dyn Source> {
        self.inner.clone()
    }
}

impl<T: NodeValue> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: NodeValue + Default> Default for Node<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: NodeValue> From<T> for Node<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: NodeValue + Debug> Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("value", &self.read())
            .field("previous", &self.previous())
            .field("transition_count", &self.transition_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
