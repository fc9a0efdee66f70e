//! Tree Traversal
//!
//! [`map_tree`] rebuilds a tree through a function, [`walk_tree`] visits it
//! for side effects. Both stay reactive: when a children node changes, the
//! affected subtree is mapped or walked again.
//!
//! Every visited value comes with its path, the list of child indices from
//! the root. Nested tree values are visited at the path of the tree that
//! holds them.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::tree::{Children, Tree, TreeId, TreeValue};
use crate::reactive::{bind, derive, Transition};

/// Child indices from the root to a subtree.
pub type Path = SmallVec<[usize; 8]>;

type MapFn<V, W> = Arc<dyn Fn(&V, &[usize]) -> W + Send + Sync>;
type WalkFn<V> = Arc<dyn Fn(&V, &[usize]) + Send + Sync>;

/// Build a tree of `f(value, path)` with the same shape as `tree`.
///
/// [`Entry`](super::Entry) children stay entry points. Other children follow
/// the source children node; a child that keeps its index across a change
/// keeps its mapped tree.
pub fn map_tree<V, W, F>(tree: &Tree<V>, f: F) -> Tree<W>
where
    V: Send + Sync + 'static,
    W: Send + Sync + 'static,
    F: Fn(&V, &[usize]) -> W + Send + Sync + 'static,
{
    let f: MapFn<V, W> = Arc::new(f);
    map_at(tree, &Path::new(), &f)
}

fn map_at<V, W>(tree: &Tree<V>, path: &Path, f: &MapFn<V, W>) -> Tree<W>
where
    V: Send + Sync + 'static,
    W: Send + Sync + 'static,
{
    let value = match tree.value() {
        TreeValue::Item(item) => TreeValue::Item(Arc::new(f(item, path))),
        TreeValue::Tree(inner) => TreeValue::Tree(map_at(inner, path, f)),
    };
    let children = match tree.children() {
        Children::Entry => Children::Entry,
        Children::Node(source) => {
            let input = source.downgrade();
            let (path, f) = (path.clone(), Arc::clone(f));
            let cache: Mutex<IndexMap<(TreeId, usize), Tree<W>>> = Mutex::default();
            Children::Node(derive(&[source], move || {
                let current = input.read().unwrap_or_default();
                let mut cache = cache.lock();
                let mut next = IndexMap::with_capacity(current.len());
                for (index, child) in current.iter().enumerate() {
                    let key = (child.id(), index);
                    let mapped = cache.swap_remove(&key).unwrap_or_else(|| {
                        let mut child_path = path.clone();
                        child_path.push(index);
                        map_at(child, &child_path, &f)
                    });
                    next.insert(key, mapped);
                }
                *cache = next;
                cache.values().cloned().collect::<Vec<_>>()
            }))
        }
    };
    Tree::from_parts(value, children, false)
}

#[derive(Default)]
struct WalkScope {
    /// One entry per walked children node, with the scope of its walk.
    entries: Mutex<Vec<(Transition, Arc<WalkScope>)>>,
}

impl WalkScope {
    fn clear(&self) {
        let stale = std::mem::take(&mut *self.entries.lock());
        for (transition, scope) in stale {
            transition.unbind();
            scope.clear();
        }
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|(_, scope)| 1 + scope.len())
            .sum()
    }
}

/// Handle to a running [`walk_tree`].
pub struct Walk {
    root: Arc<WalkScope>,
}

impl Walk {
    /// Stop reacting to children changes anywhere in the walked tree.
    pub fn stop(&self) {
        self.root.clear();
    }

    /// Number of transitions the walk currently holds.
    pub fn transition_count(&self) -> usize {
        self.root.len()
    }
}

impl std::fmt::Debug for Walk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walk")
            .field("transition_count", &self.transition_count())
            .finish()
    }
}

/// Call `f(value, path)` for every value in `tree`, and again for a subtree
/// whenever its children node changes.
///
/// Re-walking a subtree first drops the transitions of its previous walk, so
/// walkers do not pile up.
pub fn walk_tree<V, F>(tree: &Tree<V>, f: F) -> Walk
where
    V: Send + Sync + 'static,
    F: Fn(&V, &[usize]) + Send + Sync + 'static,
{
    let f: WalkFn<V> = Arc::new(f);
    let root = Arc::new(WalkScope::default());
    walk_at(tree, &Path::new(), &f, &root);
    Walk { root }
}

fn walk_at<V: Send + Sync + 'static>(tree: &Tree<V>, path: &Path, f: &WalkFn<V>, scope: &Arc<WalkScope>) {
    match tree.value() {
        TreeValue::Item(item) => f(item, path),
        TreeValue::Tree(inner) => walk_at(inner, path, f, scope),
    }

    let Children::Node(source) = tree.children() else {
        return;
    };
    let inner_scope = Arc::new(WalkScope::default());
    let input = source.downgrade();
    let (path, f, walked) = (path.clone(), Arc::clone(f), Arc::clone(&inner_scope));
    let transition = bind(&[source], move || {
        walked.clear();
        for (index, child) in input.read().unwrap_or_default().iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(index);
            walk_at(child, &child_path, &f, &walked);
        }
    });
    if let Some(transition) = transition {
        scope.entries.lock().push((transition, inner_scope));
    }
}

/// Find the subtree at `path`, looking at current children only.
pub fn tree_path<V: Send + Sync + 'static>(tree: &Tree<V>, path: &[usize]) -> Option<Tree<V>> {
    let mut current = tree.clone();
    for &index in path {
        current = current.current_children().get(index)?.clone();
    }
    Some(current)
}

/// The tree at the empty path, that is `tree` itself.
pub fn first<V: Send + Sync + 'static>(tree: &Tree<V>) -> Option<Tree<V>> {
    tree_path(tree, &[])
}

/// Map every value satisfying `pred` through `f`, keeping the others.
pub fn map_if<V, P, F>(tree: &Tree<V>, pred: P, f: F) -> Tree<V>
where
    V: Clone + Send + Sync + 'static,
    P: Fn(&V) -> bool + Send + Sync + 'static,
    F: Fn(&V) -> V + Send + Sync + 'static,
{
    map_tree(tree, move |value, _| if pred(value) { f(value) } else { value.clone() })
}

/// Two-branch [`map_if`]: values satisfying `pred_a` go through `f_a`, the
/// remaining ones satisfying `pred_b` through `f_b`.
pub fn map_if_else<V, PA, PB, FA, FB>(
    tree: &Tree<V>,
    pred_a: PA,
    pred_b: PB,
    f_a: FA,
    f_b: FB,
) -> Tree<V>
where
    V: Clone + Send + Sync + 'static,
    PA: Fn(&V) -> bool + Send + Sync + 'static,
    PB: Fn(&V) -> bool + Send + Sync + 'static,
    FA: Fn(&V) -> V + Send + Sync + 'static,
    FB: Fn(&V) -> V + Send + Sync + 'static,
{
    map_tree(tree, move |value, _| {
        if pred_a(value) {
            f_a(value)
        } else if pred_b(value) {
            f_b(value)
        } else {
            value.clone()
        }
    })
}

/// Apply `f` to the top value only, sharing the children.
///
/// For a nested value the top item of the nested tree is replaced.
pub fn map_top<V, F>(tree: &Tree<V>, f: F) -> Tree<V>
where
    V: Send + Sync + 'static,
    F: FnOnce(&V) -> V,
{
    let value = match tree.value() {
        TreeValue::Item(item) => TreeValue::Item(Arc::new(f(item))),
        TreeValue::Tree(inner) => TreeValue::Tree(map_top(inner, f)),
    };
    Tree::from_parts(value, tree.children().clone(), false)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
