//! Transitions
//!
//! A Transition is a reaction bound to one or more nodes. It runs whenever
//! any of those nodes accepts a new value, once per write regardless of how
//! many of its nodes changed.
//!
//! # Binding Flavors
//!
//! - [`bind`]: runs once right away if every node holds a value, then on
//!   every change, even if some nodes are absent. Absent operands are the
//!   reaction's problem; this transient state is intentional.
//!
//! - [`guarded_bind`]: same, but every firing is skipped unless all nodes
//!   hold a value.
//!
//! - [`bind_lazy`]: registers without the initial catch-up run.
//!
//! # Self-Removal
//!
//! A reaction may return [`Flow::Remove`] to unbind itself from all of its
//! nodes. Removal takes effect during the pass that returned it.
//!
//! # Lifetime
//!
//! Transitions hold their nodes weakly; nodes hold their transitions
//! strongly. A reaction closure that captures its own nodes keeps them
//! alive until the transition is unbound; capture a
//! [`WeakNode`](super::WeakNode) instead. The derived helpers here read
//! their inputs weakly and hold only their output, so a derived node lives
//! as long as its inputs or its own handles.

use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::ids::TransitionId;
use super::node::{Dependency, Node, NodeValue, Source, WeakNode};

/// What a reaction wants to happen to its transition after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Stay bound.
    #[default]
    Continue,
    /// Unbind from every node.
    Remove,
}

/// Conversion from a reaction's return value into a [`Flow`].
pub trait IntoFlow {
    /// Interpret the value.
    fn into_flow(self) -> Flow;
}

impl IntoFlow for () {
    fn into_flow(self) -> Flow {
        Flow::Continue
    }
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Flow {
        self
    }
}

type Reaction = Box<dyn Fn() -> Flow + Send + Sync>;

/// Weak handles to the nodes of one binding.
#[derive(Clone)]
struct Sources(SmallVec<[Weak<dyn Source>; 4]>);

impl Sources {
    /// Dropped nodes count as absent.
    fn all_present(&self) -> bool {
        self.0
            .iter()
            .all(|source| source.upgrade().is_some_and(|s| s.is_present()))
    }
}

struct TransitionInner {
    id: TransitionId,
    sources: Sources,
    reaction: Reaction,
}

/// A reaction registered on a set of nodes.
///
/// Cloning yields another handle to the same transition.
#[derive(Clone)]
pub struct Transition {
    inner: Arc<TransitionInner>,
}

impl Transition {
    /// Get the transition's unique ID.
    pub fn id(&self) -> TransitionId {
        self.inner.id
    }

    /// Run the reaction once.
    pub(crate) fn fire(&self) -> Flow {
        (self.inner.reaction)()
    }

    /// True if every node this transition depends on holds a value.
    pub fn all_present(&self) -> bool {
        self.inner.sources.all_present()
    }

    /// True if the transition is still registered on at least one live node.
    pub fn is_bound(&self) -> bool {
        self.inner
            .sources
            .0
            .iter()
            .filter_map(Weak::upgrade)
            .any(|source| source.is_bound(self.inner.id))
    }

    /// Remove this transition from every node it is bound to.
    ///
    /// Idempotent.
    pub fn unbind(&self) {
        for source in self.inner.sources.0.iter().filter_map(Weak::upgrade) {
            source.detach(self.inner.id);
        }
        tracing::trace!(transition = %self.inner.id, "transition unbound");
    }

    /// Number of nodes the transition was bound to.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.0.len()
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.inner.id)
            .field("dependency_count", &self.dependency_count())
            .field("bound", &self.is_bound())
            .finish()
    }
}

fn register<M>(deps: &[&dyn Dependency], make_reaction: M) -> Option<Transition>
where
    M: FnOnce(&Sources) -> Reaction,
{
    if deps.is_empty() {
        return None;
    }
    let strong: SmallVec<[Arc<dyn Source>; 4]> = deps.iter().map(|dep| dep.source()).collect();
    let sources = Sources(strong.iter().map(Arc::downgrade).collect());
    let reaction = make_reaction(&sources);

    let transition = Transition {
        inner: Arc::new(TransitionInner {
            id: TransitionId::new(),
            sources,
            reaction,
        }),
    };
    for source in &strong {
        source.attach(&transition);
    }
    tracing::debug!(
        transition = %transition.id(),
        dependencies = strong.len(),
        "transition bound"
    );
    Some(transition)
}

/// Run the initial catch-up if every dependency holds a value.
fn catch_up(transition: Transition) -> Transition {
    if transition.all_present() && transition.fire() == Flow::Remove {
        transition.unbind();
    }
    transition
}

/// Bind `reaction` to `deps`.
///
/// Returns `None` if `deps` is empty. The reaction runs immediately if every
/// dependency holds a value, then once per accepted write on any of them.
pub fn bind<R, F>(deps: &[&dyn Dependency], reaction: F) -> Option<Transition>
where
    R: IntoFlow,
    F: Fn() -> R + Send + Sync + 'static,
{
    register(deps, |_| Box::new(move || reaction().into_flow())).map(catch_up)
}

/// Bind `reaction` to `deps`, skipping every firing while any dependency is
/// absent.
pub fn guarded_bind<R, F>(deps: &[&dyn Dependency], reaction: F) -> Option<Transition>
where
    R: IntoFlow,
    F: Fn() -> R + Send + Sync + 'static,
{
    register(deps, |sources| {
        let guard = sources.clone();
        Box::new(move || {
            if guard.all_present() {
                reaction().into_flow()
            } else {
                Flow::Continue
            }
        })
    })
    .map(catch_up)
}

/// Bind `reaction` to `deps` without running it now.
pub fn bind_lazy<R, F>(deps: &[&dyn Dependency], reaction: F) -> Option<Transition>
where
    R: IntoFlow,
    F: Fn() -> R + Send + Sync + 'static,
{
    register(deps, |_| Box::new(move || reaction().into_flow()))
}

/// Remove `transition` from every node it is bound to.
pub fn unbind(transition: &Transition) {
    transition.unbind();
}

/// Create a node that holds `compute()`, recomputed whenever `deps` change.
pub fn derive<U, F>(deps: &[&dyn Dependency], compute: F) -> Node<U>
where
    U: NodeValue,
    F: Fn() -> U + Send + Sync + 'static,
{
    let output = Node::empty();
    let target = output.clone();
    bind(deps, move || target.write(compute()));
    output
}

/// Like [`derive`], but the output stays untouched while any dependency is
/// absent.
pub fn guarded_derive<U, F>(deps: &[&dyn Dependency], compute: F) -> Node<U>
where
    U: NodeValue,
    F: Fn() -> U + Send + Sync + 'static,
{
    let output = Node::empty();
    let target = output.clone();
    guarded_bind(deps, move || target.write(compute()));
    output
}

/// Derive a node from the current values of `nodes`, passed positionally.
pub fn map_values<T, U, F>(nodes: &[Node<T>], compute: F) -> Node<U>
where
    T: NodeValue,
    U: NodeValue,
    F: Fn(Vec<Option<T>>) -> U + Send + Sync + 'static,
{
    let deps: Vec<&dyn Dependency> = nodes.iter().map(|n| n as &dyn Dependency).collect();
    let inputs: Vec<WeakNode<T>> = nodes.iter().map(Node::downgrade).collect();
    derive(&deps, move || compute(inputs.iter().map(WeakNode::read).collect()))
}

/// Guarded [`map_values`]: `compute` only ever sees present values.
pub fn guarded_map_values<T, U, F>(nodes: &[Node<T>], compute: F) -> Node<U>
where
    T: NodeValue,
    U: NodeValue,
    F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
    let deps: Vec<&dyn Dependency> = nodes.iter().map(|n| n as &dyn Dependency).collect();
    let inputs: Vec<WeakNode<T>> = nodes.iter().map(Node::downgrade).collect();
    let output = Node::empty();
    let target = output.clone();
    guarded_bind(&deps, move || {
        // A node can go absent between the guard and the read.
        if let Some(values) = inputs.iter().map(WeakNode::read).collect::<Option<Vec<T>>>() {
            target.write(compute(values));
        }
    });
    output
}

impl<T: NodeValue> Node<T> {
    /// Derive a node from this one.
    pub fn map<U, F>(&self, f: F) -> Node<U>
    where
        U: NodeValue,
        F: Fn(Option<T>) -> U + Send + Sync + 'static,
    {
        let input = self.downgrade();
        derive(&[self], move || f(input.read()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
