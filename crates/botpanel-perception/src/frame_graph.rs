//! Frame-Graph Builder.
//!
//! Accumulates the parent → child relations carried by TF messages into a
//! mapping from each parent frame id to the set of its direct children.
//! Inserting a relation twice is a no-op, so merging is idempotent and the
//! result depends only on the set of relations seen, not their order.
//!
//! The graph does not assume the relations form a tree.  [`FrameGraph::tree`]
//! derives a forest view for rendering that tolerates cycles and frames with
//! several parents.
//!
//! # Example
//!
//! ```rust
//! use botpanel_perception::frame_graph::FrameGraph;
//!
//! let mut graph = FrameGraph::new();
//! graph.insert("map", "odom");
//! graph.insert("odom", "base_link");
//! graph.insert("map", "odom");
//!
//! assert_eq!(graph.roots(), vec!["map"]);
//! assert_eq!(graph.children("map").map(|c| c.len()), Some(1));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use botpanel_types::TfMessage;

/// Parent frame id → ordered set of child frame ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameGraph {
    children: BTreeMap<String, BTreeSet<String>>,
}

/// One frame in the rendered forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNode {
    pub name: String,
    pub children: Vec<FrameNode>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `child` is a direct child of `parent`.
    pub fn insert(&mut self, parent: impl Into<String>, child: impl Into<String>) {
        self.children
            .entry(parent.into())
            .or_default()
            .insert(child.into());
    }

    /// Fold every relation of one TF message into the graph.
    pub fn merge_tf(&mut self, message: &TfMessage) {
        for (parent, child) in message.relations() {
            self.insert(parent, child);
        }
    }

    /// Direct children of `parent`, if it has ever been seen as a parent.
    pub fn children(&self, parent: &str) -> Option<&BTreeSet<String>> {
        self.children.get(parent)
    }

    /// Iterate `(parent, children)` in frame-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.children.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Number of distinct parent frames.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of distinct parent → child relations.
    pub fn relation_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }

    /// Every frame id mentioned, as parent or child.
    pub fn frames(&self) -> BTreeSet<&str> {
        self.children
            .iter()
            .flat_map(|(parent, children)| {
                std::iter::once(parent.as_str()).chain(children.iter().map(String::as_str))
            })
            .collect()
    }

    /// Parents that never appear as anybody's child.
    pub fn roots(&self) -> Vec<&str> {
        let all_children: BTreeSet<&str> = self
            .children
            .values()
            .flat_map(|c| c.iter().map(String::as_str))
            .collect();
        self.children
            .keys()
            .map(String::as_str)
            .filter(|frame| !all_children.contains(frame))
            .collect()
    }

    /// Forest view for rendering.
    ///
    /// Starts from [`FrameGraph::roots`]; parents only reachable through a
    /// cycle become extra top-level entries.  Each frame is expanded once, so
    /// a frame listed under several parents shows its children only at its
    /// first occurrence.
    pub fn tree(&self) -> Vec<FrameNode> {
        let mut expanded = BTreeSet::new();
        let mut forest: Vec<FrameNode> = self
            .roots()
            .into_iter()
            .map(|root| self.expand(root, &mut expanded))
            .collect();

        for parent in self.children.keys() {
            if !expanded.contains(parent.as_str()) {
                forest.push(self.expand(parent, &mut expanded));
            }
        }
        forest
    }

    fn expand<'a>(&'a self, name: &'a str, expanded: &mut BTreeSet<&'a str>) -> FrameNode {
        let mut node = FrameNode {
            name: name.to_string(),
            children: Vec::new(),
        };
        if !expanded.insert(name) {
            return node;
        }
        if let Some(children) = self.children.get(name) {
            node.children = children
                .iter()
                .map(|child| self.expand(child, expanded))
                .collect();
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use botpanel_types::TransformStamped;

    use super::*;

    fn tf(relations: &[(&str, &str)]) -> TfMessage {
        TfMessage {
            transforms: relations
                .iter()
                .map(|(p, c)| TransformStamped::new(*p, *c))
                .collect(),
        }
    }

    fn names(nodes: &[FrameNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn merge_is_idempotent() {
        let message = tf(&[("map", "odom"), ("odom", "base_link")]);
        let mut once = FrameGraph::new();
        once.merge_tf(&message);
        let mut twice = once.clone();
        twice.merge_tf(&message);

        assert_eq!(once, twice);
        assert_eq!(once.relation_count(), 2);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = tf(&[("map", "odom")]);
        let b = tf(&[("odom", "base_link"), ("map", "world_marker")]);

        let mut ab = FrameGraph::new();
        ab.merge_tf(&a);
        ab.merge_tf(&b);
        let mut ba = FrameGraph::new();
        ba.merge_tf(&b);
        ba.merge_tf(&a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn children_are_grouped_under_their_parent() {
        let mut graph = FrameGraph::new();
        graph.merge_tf(&tf(&[
            ("base_link", "laser"),
            ("base_link", "camera"),
            ("odom", "base_link"),
        ]));

        let children: Vec<&str> = graph
            .children("base_link")
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(children, vec!["camera", "laser"]);
        assert!(graph.children("laser").is_none());
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.frames().len(), 4);
    }

    #[test]
    fn tree_hangs_children_under_roots() {
        let mut graph = FrameGraph::new();
        graph.merge_tf(&tf(&[
            ("odom", "base_link"),
            ("map", "odom"),
            ("base_link", "laser"),
        ]));

        let forest = graph.tree();
        assert_eq!(names(&forest), vec!["map"]);
        let odom = &forest[0].children[0];
        assert_eq!(odom.name, "odom");
        assert_eq!(names(&odom.children), vec!["base_link"]);
        assert_eq!(names(&odom.children[0].children), vec!["laser"]);
    }

    #[test]
    fn tree_survives_cycles() {
        let mut graph = FrameGraph::new();
        graph.merge_tf(&tf(&[("a", "b"), ("b", "a")]));

        assert!(graph.roots().is_empty());
        let forest = graph.tree();
        assert_eq!(names(&forest), vec!["a"]);
        assert_eq!(names(&forest[0].children), vec!["b"]);
        assert_eq!(names(&forest[0].children[0].children), vec!["a"]);
        assert!(forest[0].children[0].children[0].children.is_empty());
    }

    #[test]
    fn empty_graph_has_empty_tree() {
        assert!(FrameGraph::new().tree().is_empty());
    }
}
