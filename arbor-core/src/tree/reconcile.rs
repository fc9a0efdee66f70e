//! Tree Reconciler
//!
//! Keeps an external structure (DOM elements, widgets, scene objects) in step
//! with a flattened reactive tree. The external side is a [`Renderer`]: it
//! creates an output for a value under a parent context and tears it down
//! again.
//!
//! # How It Works
//!
//! Instantiating a tree creates its output, records the mount, and installs a
//! transition on the tree's children node. Whenever the children change, the
//! transition compares the previous list with the current one by identity:
//!
//! - children only in the current list are instantiated under this tree's
//!   context
//! - children only in the previous list are destroyed
//!
//! A child that is in both lists is left alone, even if it moved.
//!
//! Destroying a tree tears down its output, unbinds every transition tied to
//! the mount, and destroys all current children recursively.
//!
//! # Locking
//!
//! Renderer callbacks run with no reconciler lock held, so a renderer can
//! query the reconciler or write nodes that feed back into it.

use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use super::flatten::flatten;
use super::tree::{Tree, TreeId};
use crate::error::{DataflowError, Result};
use crate::reactive::{bind_lazy, Channel, Flow, Transition};

/// The external side of reconciliation.
pub trait Renderer<V>: Send + Sync + 'static {
    /// What a created output hands down to its children, typically a handle
    /// to where child outputs attach.
    type Context: Clone + Send + Sync + 'static;

    /// Create the output for `value` under `parent`.
    fn on_create(&self, value: &V, parent: &Self::Context) -> Self::Context;

    /// Release the output created with `context`. Called once per context.
    fn on_destroy(&self, context: Self::Context);
}

/// Where a tree is in its reconciler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Never instantiated.
    Unmounted,
    /// Instantiated and live.
    Mounted,
    /// Destroyed.
    TornDown,
}

struct Mount<C> {
    context: C,
    tracked: Vec<Transition>,
}

struct ReconcilerInner<V, R: Renderer<V>> {
    renderer: R,
    mounts: Mutex<IndexMap<TreeId, Mount<R::Context>>>,
    torn_down: Mutex<IndexSet<TreeId>>,
    mounted: Channel<TreeId>,
    unmounted: Channel<TreeId>,
    _values: PhantomData<fn(&V)>,
}

/// Instantiates and destroys renderer outputs as a tree changes.
///
/// Cloning yields another handle to the same reconciler.
///
/// # Example
///
/// ```rust,ignore
/// let reconciler = Reconciler::new(DomRenderer::new());
/// let root = reconciler.mount(&page, body_context)?;
///
/// // Adding a child instantiates just that child.
/// root.set_children(vec![header, Tree::leaf(footer)]);
/// ```
pub struct Reconciler<V, R: Renderer<V>> {
    inner: Arc<ReconcilerInner<V, R>>,
}

impl<V, R> Reconciler<V, R>
where
    V: Send + Sync + 'static,
    R: Renderer<V>,
{
    /// Create a reconciler driving `renderer`.
    pub fn new(renderer: R) -> Self {
        Self {
            inner: Arc::new(ReconcilerInner {
                renderer,
                mounts: Mutex::new(IndexMap::new()),
                torn_down: Mutex::new(IndexSet::new()),
                mounted: Channel::new(),
                unmounted: Channel::new(),
                _values: PhantomData,
            }),
        }
    }

    /// Get the renderer.
    pub fn renderer(&self) -> &R {
        &self.inner.renderer
    }

    /// Flatten `tree` and instantiate the result under `root`.
    ///
    /// Returns the flattened tree, which is the one to mutate and destroy
    /// from now on.
    pub fn mount(&self, tree: &Tree<V>, root: R::Context) -> Result<Tree<V>> {
        let flat = flatten(tree)?;
        self.instantiate(&flat, &root)?;
        Ok(flat)
    }

    /// Create the output for `tree` under `parent`, then for all of its
    /// current children, and follow its children from now on.
    ///
    /// # Errors
    ///
    /// [`DataflowError::InvariantViolation`] if `tree` holds a nested tree,
    /// has [`Entry`](super::Entry) children, or is already mounted. A failing
    /// child leaves its already instantiated ancestors and siblings mounted.
    pub fn instantiate(&self, tree: &Tree<V>, parent: &R::Context) -> Result<()> {
        let Some(item) = tree.item() else {
            return Err(DataflowError::invariant(format!(
                "{} holds a nested tree; flatten before instantiating",
                tree.id()
            )));
        };
        let Some(children) = tree.children_node() else {
            return Err(DataflowError::invariant(format!(
                "{} has unresolved entry children",
                tree.id()
            )));
        };
        if self.inner.mounts.lock().contains_key(&tree.id()) {
            return Err(DataflowError::invariant(format!(
                "{} is already mounted",
                tree.id()
            )));
        }

        let context = self.inner.renderer.on_create(item, parent);
        self.inner.mounts.lock().insert(
            tree.id(),
            Mount {
                context: context.clone(),
                tracked: Vec::new(),
            },
        );
        self.inner.torn_down.lock().shift_remove(&tree.id());

        let weak = Arc::downgrade(&self.inner);
        let (source, id) = (children.downgrade(), tree.id());
        let transition = bind_lazy(&[children], move || {
            let (Some(reconciler), Some(source)) = (Self::upgrade(&weak), source.upgrade()) else {
                return Flow::Remove;
            };
            reconciler.reconcile_children(id, source.previous(), source.read())
        });
        if let Some(transition) = transition {
            self.track(tree, transition)?;
        }

        tracing::debug!(tree = %tree.id(), "tree mounted");
        self.inner.mounted.put(tree.id());

        for child in tree.current_children() {
            self.instantiate(&child, &context)?;
        }
        Ok(())
    }

    fn upgrade(weak: &Weak<ReconcilerInner<V, R>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn reconcile_children(
        &self,
        id: TreeId,
        previous: Option<Vec<Tree<V>>>,
        current: Option<Vec<Tree<V>>>,
    ) -> Flow {
        let Some(context) = self.context_by_id(id) else {
            return Flow::Remove;
        };
        let previous = previous.unwrap_or_default();
        let current = current.unwrap_or_default();

        // A tree listed twice is still one mount.
        let mut seen = IndexSet::new();
        let removed: Vec<&Tree<V>> = previous
            .iter()
            .filter(|t| !current.contains(t) && seen.insert(t.id()))
            .collect();
        seen.clear();
        let added: Vec<&Tree<V>> = current
            .iter()
            .filter(|t| !previous.contains(t) && seen.insert(t.id()))
            .collect();
        tracing::trace!(
            tree = %id,
            added = added.len(),
            removed = removed.len(),
            "reconciling children"
        );

        for child in removed {
            self.destroy(child);
        }
        for child in added {
            if let Err(err) = self.instantiate(child, &context) {
                panic!("{err}");
            }
        }
        Flow::Continue
    }

    /// Tear down the output of `tree` and of all its current children.
    ///
    /// Destroying a tree that is not mounted does nothing.
    pub fn destroy(&self, tree: &Tree<V>) {
        let id = tree.id();
        let Some(mount) = self.inner.mounts.lock().shift_remove(&id) else {
            tracing::warn!(tree = %id, "destroy called on a tree that is not mounted");
            return;
        };

        self.inner.renderer.on_destroy(mount.context);
        for transition in &mount.tracked {
            transition.unbind();
        }
        self.inner.torn_down.lock().insert(id);
        tracing::debug!(tree = %id, tracked = mount.tracked.len(), "tree destroyed");
        self.inner.unmounted.put(id);

        for child in tree.current_children() {
            self.destroy(&child);
        }
    }

    /// Unbind `transition` when `tree` is destroyed.
    ///
    /// # Errors
    ///
    /// [`DataflowError::InvariantViolation`] if `tree` is not mounted. The
    /// transition stays bound in that case.
    pub fn track(&self, tree: &Tree<V>, transition: Transition) -> Result<()> {
        match self.inner.mounts.lock().get_mut(&tree.id()) {
            Some(mount) => {
                mount.tracked.push(transition);
                Ok(())
            }
            None => Err(DataflowError::invariant(format!(
                "cannot track {} on {}: not mounted",
                transition.id(),
                tree.id()
            ))),
        }
    }

    /// Get the lifecycle state of `tree`.
    pub fn state(&self, tree: &Tree<V>) -> MountState {
        if self.inner.mounts.lock().contains_key(&tree.id()) {
            MountState::Mounted
        } else if self.inner.torn_down.lock().contains(&tree.id()) {
            MountState::TornDown
        } else {
            MountState::Unmounted
        }
    }

    /// Get the context created for `tree`, while it is mounted.
    pub fn context(&self, tree: &Tree<V>) -> Option<R::Context> {
        self.context_by_id(tree.id())
    }

    fn context_by_id(&self, id: TreeId) -> Option<R::Context> {
        self.inner.mounts.lock().get(&id).map(|m| m.context.clone())
    }

    /// Number of trees currently mounted.
    pub fn mounted_count(&self) -> usize {
        self.inner.mounts.lock().len()
    }

    /// Number of transitions tied to the mount of `tree`.
    pub fn tracked_count(&self, tree: &Tree<V>) -> usize {
        self.inner
            .mounts
            .lock()
            .get(&tree.id())
            .map_or(0, |m| m.tracked.len())
    }

    /// Receives the ID of every tree as it is mounted.
    pub fn mounted(&self) -> Channel<TreeId> {
        self.inner.mounted.clone()
    }

    /// Receives the ID of every tree as it is destroyed.
    pub fn unmounted(&self) -> Channel<TreeId> {
        self.inner.unmounted.clone()
    }
}

impl<V, R: Renderer<V>> Clone for Reconciler<V, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, R> std::fmt::Debug for Reconciler<V, R>
where
    V: Send + Sync + 'static,
    R: Renderer<V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("mounted_count", &self.mounted_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
