//! Flattening
//!
//! Turns a tree of trees into a plain tree. For every tree whose value is a
//! nested tree, the wrapping tree's children are substituted into the nested
//! tree's [`Entry`](super::Entry) markers, depth first, and the result is
//! flattened again. Ordinary trees keep their value and get a children node
//! that follows the source children, flattened.
//!
//! # Identity
//!
//! Results are memoized on the source tree, so flattening the same tree twice
//! gives the same tree, and a child that survives a children change keeps its
//! flattened identity. The reconciler diffs children by identity and relies
//! on this.
//!
//! # Errors
//!
//! Problems visible at flattening time come back as
//! [`DataflowError::InvariantViolation`]. Problems that only appear after a
//! later children change are raised inside the reaction that found them, as
//! a panic carrying the same message.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::tree::{Children, Tree, TreeId, TreeValue};
use crate::error::{DataflowError, Result};
use crate::reactive::{bind_lazy, Node};

/// Flatten `tree` into a tree whose values are all items.
pub fn flatten<V: Send + Sync + 'static>(tree: &Tree<V>) -> Result<Tree<V>> {
    if tree.is_flat() {
        return Ok(tree.clone());
    }
    if let Some(done) = tree.inner.flat.get() {
        return Ok(done.clone());
    }

    let result = match tree.value() {
        TreeValue::Tree(inner) => {
            let (substituted, found) = substitute(inner, tree.children())?;
            if !found {
                return Err(DataflowError::invariant(format!(
                    "nested {} has no entry point for the children of {}",
                    inner.id(),
                    tree.id()
                )));
            }
            flatten(&substituted)?
        }
        TreeValue::Item(item) => match tree.children() {
            Children::Node(children) => {
                Tree::from_parts(TreeValue::Item(Arc::clone(item)), flatten_children(children)?, true)
            }
            Children::Entry => {
                return Err(DataflowError::invariant(format!(
                    "{} reached flattening with an unresolved entry point",
                    tree.id()
                )));
            }
        },
    };

    tracing::trace!(source = %tree.id(), flat = %result.id(), "tree flattened");
    Ok(tree.inner.flat.get_or_init(|| result).clone())
}

/// Follow `children`, flattening every child.
fn flatten_children<V: Send + Sync + 'static>(children: &Node<Vec<Tree<V>>>) -> Result<Children<V>> {
    let current = children.read().unwrap_or_default();
    let flat = current.iter().map(flatten).collect::<Result<Vec<_>>>()?;

    let output = Node::new(flat);
    let (source, target) = (children.downgrade(), output.clone());
    bind_lazy(&[children], move || {
        let next = source
            .read()
            .unwrap_or_default()
            .iter()
            .map(|child| raise(flatten(child)))
            .collect();
        target.write(next);
    });
    Ok(Children::Node(output))
}

/// Rebuild `tree` with every [`Entry`](super::Entry) replaced by `outer`.
///
/// The flag reports whether at least one entry point was found among the
/// current children.
fn substitute<V: Send + Sync + 'static>(tree: &Tree<V>, outer: &Children<V>) -> Result<(Tree<V>, bool)> {
    let children = match tree.children() {
        Children::Entry => {
            return Ok((Tree::from_parts(tree.value().clone(), outer.clone(), false), true));
        }
        Children::Node(children) => children,
    };

    let mut cache: IndexMap<TreeId, Tree<V>> = IndexMap::new();
    let mut found = false;
    let current = children.read().unwrap_or_default();
    for child in &current {
        if cache.contains_key(&child.id()) {
            continue;
        }
        let (replaced, child_found) = substitute(child, outer)?;
        found |= child_found;
        cache.insert(child.id(), replaced);
    }
    let output = Node::new(lookup(&cache, &current));

    // Substituted children are cached by source ID so a child that stays put
    // across a change keeps its substituted identity.
    let cache = Arc::new(Mutex::new(cache));
    let (source, target, outer) = (children.downgrade(), output.clone(), outer.clone());
    bind_lazy(&[children], move || {
        let current = source.read().unwrap_or_default();
        let next = {
            let mut cache = cache.lock();
            cache.retain(|id, _| current.iter().any(|child| child.id() == *id));
            for child in &current {
                if !cache.contains_key(&child.id()) {
                    let (replaced, _) = raise(substitute(child, &outer));
                    cache.insert(child.id(), replaced);
                }
            }
            lookup(&cache, &current)
        };
        target.write(next);
    });

    Ok((
        Tree::from_parts(tree.value().clone(), Children::Node(output), false),
        found,
    ))
}

fn lookup<V>(cache: &IndexMap<TreeId, Tree<V>>, children: &[Tree<V>]) -> Vec<Tree<V>> {
    children
        .iter()
        .filter_map(|child| cache.get(&child.id()).cloned())
        .collect()
}

/// Reactions cannot return errors; contract violations found there unwind.
fn raise<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
