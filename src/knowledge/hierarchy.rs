//! Parent/child hierarchy with owning and linked edges.
//!
//! QASets form a tree that may share subtrees: a node has exactly one chain
//! of owning parent edges plus any number of non-owning "linked parent"
//! edges. Diagnoses use the same structure for their solution DAG. Backed
//! by a `petgraph` stable graph dual-indexed with an id → node map.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

/// Whether an edge owns its child or merely links to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Owning tree edge.
    Owned,
    /// Non-owning DAG-sharing edge.
    Linked,
}

/// Directed parent → child hierarchy over string-identified nodes.
#[derive(Debug, Default)]
pub struct Hierarchy {
    graph: StableDiGraph<String, LinkKind>,
    index: HashMap<String, NodeIndex>,
}

impl Hierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a node exists for `id`, returning its index.
    pub fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Whether `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Add a parent → child edge of the given kind. Creates missing nodes.
    pub fn add_edge(&mut self, parent: &str, child: &str, kind: LinkKind) {
        let p = self.ensure_node(parent);
        let c = self.ensure_node(child);
        // One edge per (parent, child) pair; a later Linked wiring wins.
        if let Some(existing) = self.graph.find_edge(p, c) {
            self.graph[existing] = kind;
            return;
        }
        self.graph.add_edge(p, c, kind);
    }

    /// All parents of `id`, owning and linked alike.
    pub fn parents(&self, id: &str) -> Vec<String> {
        self.neighbors_in(id, None)
    }

    /// Only the linked (non-owning) parents of `id`.
    pub fn linked_parents(&self, id: &str) -> Vec<String> {
        self.neighbors_in(id, Some(LinkKind::Linked))
    }

    /// All children of `id`.
    pub fn children(&self, id: &str) -> Vec<String> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.graph[e.target()].clone())
            .collect()
    }

    fn neighbors_in(&self, id: &str, filter: Option<LinkKind>) -> Vec<String> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| filter.is_none_or(|k| *e.weight() == k))
            .map(|e| self.graph[e.source()].clone())
            .collect()
    }

    /// Remove a node and all its edges. Children keep their other parents.
    pub fn remove(&mut self, id: &str) {
        if let Some(idx) = self.index.remove(id) {
            self.graph.remove_node(idx);
        }
    }

    /// Ids of all nodes with no parent at all, excluding `root`.
    pub fn parentless(&self, root: &str) -> Vec<String> {
        self.index
            .iter()
            .filter(|(id, _)| id.as_str() != root)
            .filter(|&(_, &idx)| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the hierarchy has no nodes.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterate over all node ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiring_and_queries() {
        let mut h = Hierarchy::new();
        h.add_edge("root", "a", LinkKind::Owned);
        h.add_edge("root", "b", LinkKind::Owned);
        h.add_edge("a", "c", LinkKind::Owned);
        h.add_edge("b", "c", LinkKind::Linked);

        let mut children = h.children("root");
        children.sort();
        assert_eq!(children, ["a", "b"]);

        let mut parents = h.parents("c");
        parents.sort();
        assert_eq!(parents, ["a", "b"]);
        assert_eq!(h.linked_parents("c"), ["b"]);
        assert!(h.linked_parents("a").is_empty());
    }

    #[test]
    fn remove_keeps_other_parents() {
        let mut h = Hierarchy::new();
        h.add_edge("root", "a", LinkKind::Owned);
        h.add_edge("root", "b", LinkKind::Owned);
        h.add_edge("a", "shared", LinkKind::Owned);
        h.add_edge("b", "shared", LinkKind::Linked);

        h.remove("a");
        assert!(!h.contains("a"));
        assert_eq!(h.parents("shared"), ["b"]);
    }

    #[test]
    fn parentless_excludes_root() {
        let mut h = Hierarchy::new();
        h.ensure_node("root");
        h.ensure_node("stray");
        h.add_edge("root", "a", LinkKind::Owned);

        assert_eq!(h.parentless("root"), ["stray"]);
    }
}
