//! Reactive Trees
//!
//! A [`Tree`] pairs a value with a reactive list of children. The children
//! always end up as a `Node<Vec<Tree<V>>>`, whatever shape the caller passed
//! in, so any subtree can grow or shrink at runtime by writing that node.
//!
//! # Trees of Trees
//!
//! A tree's value may itself be a tree ([`TreeValue::Tree`]). Such nested
//! trees describe reusable wrappers: the inner tree marks where the outer
//! children go with an [`Entry`] placeholder, and
//! [`flatten`](super::flatten) splices them in.
//!
//! ```rust,ignore
//! // A frame that puts its content inside a padding box.
//! let frame = Tree::new("frame", Tree::new("padding", Entry));
//!
//! // Use the frame around two labels.
//! let framed = Tree::nested(frame, vec![Tree::leaf("a"), Tree::leaf("b")]);
//!
//! // frame -> padding -> [a, b]
//! let flat = flatten(&framed)?;
//! ```
//!
//! # Identity
//!
//! Trees compare by [`TreeId`], never by contents. Two trees built from the
//! same value are different trees.

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use crate::reactive::{bind_lazy, Node, StructuralEq};

pub use crate::reactive::ids::TreeId;

/// Placeholder children marking where a nested tree receives the children of
/// the tree that wraps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry;

/// What a tree holds: a plain item, or another tree to be flattened.
pub enum TreeValue<V> {
    /// An ordinary value.
    Item(Arc<V>),
    /// A nested tree whose [`Entry`] markers receive this tree's children.
    Tree(Tree<V>),
}

/// The children of a tree.
pub enum Children<V> {
    /// A reactive list of subtrees. Absent counts as empty.
    Node(Node<Vec<Tree<V>>>),
    /// An entry point, resolved by flattening.
    Entry,
}

pub(crate) struct TreeInner<V> {
    id: TreeId,
    value: TreeValue<V>,
    children: Children<V>,
    /// Set on trees produced by flattening.
    is_flat: bool,
    /// Memoized flattening result for non-flat trees.
    pub(crate) flat: OnceLock<Tree<V>>,
}

/// A value with reactive children.
///
/// Cloning yields another handle to the same tree.
pub struct Tree<V> {
    pub(crate) inner: Arc<TreeInner<V>>,
}

impl<V: Send + Sync + 'static> Tree<V> {
    /// Create a tree holding `value`.
    ///
    /// `children` may be `()`, a single tree, a `Vec` of trees, a node of
    /// either, or [`Entry`].
    pub fn new(value: V, children: impl Into<Children<V>>) -> Self {
        Self::from_parts(TreeValue::Item(Arc::new(value)), children.into(), false)
    }

    /// Create a tree without children.
    pub fn leaf(value: V) -> Self {
        Self::new(value, ())
    }

    /// Create a tree whose value is `inner`. Flattening puts `children` at
    /// the [`Entry`] markers of `inner`.
    pub fn nested(inner: Tree<V>, children: impl Into<Children<V>>) -> Self {
        Self::from_parts(TreeValue::Tree(inner), children.into(), false)
    }

    pub(crate) fn from_parts(value: TreeValue<V>, children: Children<V>, is_flat: bool) -> Self {
        Self {
            inner: Arc::new(TreeInner {
                id: TreeId::new(),
                value,
                children,
                is_flat,
                flat: OnceLock::new(),
            }),
        }
    }

    /// The node holding the children, unless they are an [`Entry`].
    pub fn children_node(&self) -> Option<&Node<Vec<Tree<V>>>> {
        match &self.inner.children {
            Children::Node(node) => Some(node),
            Children::Entry => None,
        }
    }

    /// Snapshot of the current children. Empty for [`Entry`] children.
    pub fn current_children(&self) -> Vec<Tree<V>> {
        self.children_node()
            .and_then(Node::read)
            .unwrap_or_default()
    }

    /// Replace the children. Does nothing for [`Entry`] children.
    pub fn set_children(&self, children: Vec<Tree<V>>) {
        if let Some(node) = self.children_node() {
            node.write(children);
        }
    }
}

impl<V> Tree<V> {
    /// Get the tree's unique ID.
    pub fn id(&self) -> TreeId {
        self.inner.id
    }

    /// Get the tree's value.
    pub fn value(&self) -> &TreeValue<V> {
        &self.inner.value
    }

    /// The item, if this tree's value is not a nested tree.
    pub fn item(&self) -> Option<&V> {
        match &self.inner.value {
            TreeValue::Item(item) => Some(&**item),
            TreeValue::Tree(_) => None,
        }
    }

    /// Get the tree's children.
    pub fn children(&self) -> &Children<V> {
        &self.inner.children
    }

    /// True if the children are an [`Entry`] marker.
    pub fn is_entry(&self) -> bool {
        matches!(self.inner.children, Children::Entry)
    }

    /// True if this tree came out of flattening.
    pub fn is_flat(&self) -> bool {
        self.inner.is_flat
    }

    /// True if both handles point at the same tree.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<V> TreeValue<V> {
    /// True for a nested tree.
    pub fn is_tree(&self) -> bool {
        matches!(self, TreeValue::Tree(_))
    }
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Clone for TreeValue<V> {
    fn clone(&self) -> Self {
        match self {
            TreeValue::Item(item) => TreeValue::Item(Arc::clone(item)),
            TreeValue::Tree(tree) => TreeValue::Tree(tree.clone()),
        }
    }
}

impl<V: Send + Sync + 'static> Clone for Children<V> {
    fn clone(&self) -> Self {
        match self {
            Children::Node(node) => Children::Node(node.clone()),
            Children::Entry => Children::Entry,
        }
    }
}

impl<V> StructuralEq for Tree<V> {
    fn structural_eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<V> PartialEq for Tree<V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<V> Eq for Tree<V> {}

impl<V: Debug + Send + Sync + 'static> Debug for Tree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Tree");
        s.field("id", &self.inner.id);
        match &self.inner.value {
            TreeValue::Item(item) => s.field("item", item),
            TreeValue::Tree(inner) => s.field("nested", &inner.id()),
        };
        match &self.inner.children {
            Children::Node(node) => s.field(
                "children",
                &node
                    .read()
                    .unwrap_or_default()
                    .iter()
                    .map(Tree::id)
                    .collect::<Vec<_>>(),
            ),
            Children::Entry => s.field("children", &Entry),
        };
        s.finish()
    }
}

// ----------------------------------------------------------------------------
// Children conversions
// ----------------------------------------------------------------------------

impl<V: Send + Sync + 'static> From<()> for Children<V> {
    fn from(_: ()) -> Self {
        Children::Node(Node::new(Vec::new()))
    }
}

impl<V: Send + Sync + 'static> From<Entry> for Children<V> {
    fn from(_: Entry) -> Self {
        Children::Entry
    }
}

impl<V: Send + Sync + 'static> From<Tree<V>> for Children<V> {
    fn from(tree: Tree<V>) -> Self {
        Children::Node(Node::new(vec![tree]))
    }
}

impl<V: Send + Sync + 'static> From<Vec<Tree<V>>> for Children<V> {
    fn from(trees: Vec<Tree<V>>) -> Self {
        Children::Node(Node::new(trees))
    }
}

impl<V: Send + Sync + 'static> From<Node<Vec<Tree<V>>>> for Children<V> {
    fn from(node: Node<Vec<Tree<V>>>) -> Self {
        Children::Node(node)
    }
}

/// A node holding a single (possibly absent) tree becomes a node holding a
/// zero- or one-element list that follows it.
impl<V: Send + Sync + 'static> From<Node<Tree<V>>> for Children<V> {
    fn from(node: Node<Tree<V>>) -> Self {
        let list = Node::new(node.read().into_iter().collect());
        let (source, target) = (node.downgrade(), list.clone());
        bind_lazy(&[&node], move || {
            target.write(source.read().into_iter().collect());
        });
        Children::Node(list)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_shapes_normalize_to_a_node() {
        let leaf = Tree::leaf(1);
        assert!(leaf.current_children().is_empty());

        let single = Tree::new(0, Tree::leaf(1));
        assert_eq!(single.current_children().len(), 1);

        let many = Tree::new(0, vec![Tree::leaf(1), Tree::leaf(2)]);
        assert_eq!(many.current_children().len(), 2);

        let node = Node::new(vec![Tree::leaf(3)]);
        let reactive = Tree::new(0, node.clone());
        assert!(reactive.children_node().unwrap().ptr_eq(&node));
    }

    #[test]
    fn entry_children_are_kept() {
        let tree: Tree<i32> = Tree::new(0, Entry);
        assert!(tree.is_entry());
        assert!(tree.children_node().is_none());
        assert!(tree.current_children().is_empty());
    }

    #[test]
    fn single_tree_node_follows_its_source() {
        let slot: Node<Tree<&str>> = Node::empty();
        let tree = Tree::new("root", slot.clone());
        assert!(tree.current_children().is_empty());

        let child = Tree::leaf("child");
        slot.write(child.clone());
        assert_eq!(tree.current_children(), vec![child]);

        slot.clear();
        assert!(tree.current_children().is_empty());
    }

    #[test]
    fn trees_compare_by_identity() {
        let a = Tree::leaf(1);
        let b = Tree::leaf(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.structural_eq(&a.clone()));
    }

    #[test]
    fn nested_value_is_reported() {
        let inner = Tree::new("inner", Entry);
        let outer = Tree::nested(inner.clone(), ());
        assert!(outer.value().is_tree());
        assert!(outer.item().is_none());
        assert_eq!(inner.item(), Some(&"inner"));
    }

    #[test]
    fn set_children_replaces_the_list() {
        let tree = Tree::new(0, vec![Tree::leaf(1)]);
        let replacement = vec![Tree::leaf(2), Tree::leaf(3)];
        tree.set_children(replacement.clone());
        assert_eq!(tree.current_children(), replacement);
    }

    #[test]
    fn single_tree_node_does_not_outlive_its_handles() {
        let slot = Node::new(Tree::leaf(1));
        let tree = Tree::new(0, slot.clone());
        let list = tree.children_node().unwrap().downgrade();
        let weak_slot = slot.downgrade();

        drop(tree);
        slot.write(Tree::leaf(2));
        assert_eq!(list.read().map(|c| c.len()), Some(1));

        drop(slot);
        assert!(!weak_slot.is_alive());
        assert!(!list.is_alive());
    }
}
