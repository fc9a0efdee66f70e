//! Route-driven children.
//!
//! [`switcher`] turns a route node and a table of routes into a children
//! node: the active route is shown, the others are hidden or dropped.

use std::hash::Hash;

use indexmap::IndexMap;

use super::tree::Tree;
use crate::reactive::{bind, equal, Node, NodeValue};

/// One entry of a [`switcher`] table.
pub struct Route<V> {
    tree: Tree<V>,
    visible: Node<bool>,
    destroy_when_hidden: bool,
}

impl<V: Send + Sync + 'static> Route<V> {
    /// A route that stays in the children while hidden.
    pub fn new(tree: Tree<V>) -> Self {
        Self {
            tree,
            visible: Node::new(false),
            destroy_when_hidden: false,
        }
    }

    /// Drop the route from the children while it is hidden, so a reconciler
    /// destroys its outputs.
    pub fn destroy_when_hidden(mut self) -> Self {
        self.destroy_when_hidden = true;
        self
    }

    /// The route's content.
    pub fn tree(&self) -> &Tree<V> {
        &self.tree
    }

    /// True while the route is active. Bind styling to this node to hide
    /// routes that stay mounted.
    pub fn visible(&self) -> &Node<bool> {
        &self.visible
    }
}

impl<V> Clone for Route<V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            visible: self.visible.clone(),
            destroy_when_hidden: self.destroy_when_hidden,
        }
    }
}

/// Build a children node that follows `route`.
///
/// On every route change the children become the routes in declaration
/// order. The active route's `visible` node is set to true and every other
/// route's to false; hidden routes declared with
/// [`Route::destroy_when_hidden`] are left out. An absent route hides
/// everything.
pub fn switcher<K, V>(route: &Node<K>, routes: IndexMap<K, Route<V>>) -> Node<Vec<Tree<V>>>
where
    K: NodeValue + Eq + Hash,
    V: Send + Sync + 'static,
{
    let children = Node::empty();
    let (input, target) = (route.downgrade(), children.clone());
    bind(&[route], move || {
        let active = input.read();
        let mut shown = Vec::with_capacity(routes.len());
        for (key, entry) in &routes {
            let is_active = active.as_ref().is_some_and(|a| equal(a, key));
            entry.visible.write(is_active);
            if is_active || !entry.destroy_when_hidden {
                shown.push(entry.tree.clone());
            }
        }
        tracing::trace!(routes = routes.len(), shown = shown.len(), "route switched");
        target.write(shown);
    });
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    fn table() -> (IndexMap<&'static str, Route<&'static str>>, Vec<Tree<&'static str>>) {
        let home = Tree::leaf("home");
        let settings = Tree::leaf("settings");
        let about = Tree::leaf("about");
        let mut routes = IndexMap::new();
        routes.insert("home", Route::new(home.clone()));
        routes.insert("settings", Route::new(settings.clone()).destroy_when_hidden());
        routes.insert("about", Route::new(about.clone()));
        (routes, vec![home, settings, about])
    }

    #[test]
    fn active_route_is_visible() {
        let (routes, trees) = table();
        let handles = routes.clone();
        let route = Node::new("home");
        let children = switcher(&route, routes);

        assert_eq!(handles["home"].visible().read(), Some(true));
        assert_eq!(handles["about"].visible().read(), Some(false));
        // Hidden and destroyable: not among the children.
        assert_eq!(children.read(), Some(vec![trees[0].clone(), trees[2].clone()]));
    }

    #[test]
    fn switching_updates_children_and_visibility() {
        let (routes, trees) = table();
        let handles = routes.clone();
        let route = Node::new("home");
        let children = switcher(&route, routes);

        route.write("settings");
        assert_eq!(handles["home"].visible().read(), Some(false));
        assert_eq!(handles["settings"].visible().read(), Some(true));
        assert_eq!(children.read(), Some(trees.clone()));

        route.write("about");
        assert_eq!(children.read(), Some(vec![trees[0].clone(), trees[2].clone()]));
    }

    #[test]
    fn absent_route_hides_everything() {
        let (routes, trees) = table();
        let handles = routes.clone();
        let route: Node<&'static str> = Node::empty();
        let children = switcher(&route, routes);
        assert_eq!(children.read(), None);

        route.write("about");
        route.clear();
        assert!(handles.values().all(|r| r.visible().read() == Some(false)));
        assert_eq!(children.read(), Some(vec![trees[0].clone(), trees[2].clone()]));
    }

    #[test]
    fn route_node_is_not_kept_alive_by_the_switcher() {
        let (routes, _) = table();
        let route = Node::new("home");
        let children = switcher(&route, routes);
        let weak_route = route.downgrade();

        drop(route);
        assert!(!weak_route.is_alive());
        assert_eq!(children.read().map(|c| c.len()), Some(2));
    }
}
