//! Node ownership graph: an arena of nodes plus the collections that own them.

pub mod factory;
pub mod node;

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::CoreError;
pub use node::Node;

/// Ordered set of sibling nodes owned by the project root (`owner == None`)
/// or by a group node. Insertion order is preserved for presentation.
#[derive(Clone, Debug, Default)]
pub struct NodeCollection {
    pub owner: Option<Uuid>,
    pub node_ids: Vec<Uuid>,
}

impl NodeCollection {
    fn new(owner: Option<Uuid>) -> Self {
        Self {
            owner,
            node_ids: Vec::new(),
        }
    }
}

/// Arena of nodes keyed by stable ids. Collections hold ordered id lists;
/// the parent back-reference on a node is a lookup key, never a second owner.
#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: HashMap<Uuid, Node>,
    root: NodeCollection,
    groups: HashMap<Uuid, NodeCollection>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes in the graph, groups included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// The collection owned by `key` (`None` = project root). Only group
    /// nodes own a collection.
    pub fn collection(&self, key: Option<Uuid>) -> Option<&NodeCollection> {
        match key {
            None => Some(&self.root),
            Some(id) => self.groups.get(&id),
        }
    }

    fn collection_mut(&mut self, key: Option<Uuid>) -> Option<&mut NodeCollection> {
        match key {
            None => Some(&mut self.root),
            Some(id) => self.groups.get_mut(&id),
        }
    }

    /// Insert a fully built node into the collection named by `node.parent`.
    /// The name must already be unique within that collection.
    pub fn insert(&mut self, node: Node) -> Result<Uuid, CoreError> {
        let key = node.parent;
        if self.collection(key).is_none() {
            return Err(CoreError::Project(format!(
                "no group collection for parent {:?}",
                key
            )));
        }
        if self.name_taken(key, &node.name) {
            return Err(CoreError::NameCollision(node.name));
        }
        let id = node.id;
        if node.is_group {
            self.groups.insert(id, NodeCollection::new(Some(id)));
        }
        self.nodes.insert(id, node);
        if let Some(collection) = self.collection_mut(key) {
            collection.node_ids.push(id);
        }
        Ok(id)
    }

    /// Remove a node; removing a group cascades to its contained nodes.
    pub fn remove(&mut self, id: Uuid) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        if let Some(collection) = self.collection_mut(node.parent) {
            collection.node_ids.retain(|n| *n != id);
        }
        self.remove_children_of(id);
        Some(node)
    }

    fn remove_children_of(&mut self, id: Uuid) {
        if let Some(children) = self.groups.remove(&id) {
            for child in children.node_ids {
                self.nodes.remove(&child);
                self.remove_children_of(child);
            }
        }
    }

    pub fn name_taken(&self, key: Option<Uuid>, name: &str) -> bool {
        self.id_by_name_in(key, name).is_some()
    }

    pub fn id_by_name_in(&self, key: Option<Uuid>, name: &str) -> Option<Uuid> {
        let collection = self.collection(key)?;
        collection
            .node_ids
            .iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
            .copied()
    }

    /// Use `wanted` as-is when free; otherwise fail under the strict policy
    /// or fall back to auto-suffixing.
    pub fn unique_name(
        &self,
        key: Option<Uuid>,
        wanted: &str,
        strict: bool,
    ) -> Result<String, CoreError> {
        if !self.name_taken(key, wanted) {
            return Ok(wanted.to_string());
        }
        if strict {
            return Err(CoreError::NameCollision(wanted.to_string()));
        }
        let stem = wanted.trim_end_matches(|c: char| c.is_ascii_digit());
        Ok(self.auto_name(key, stem))
    }

    /// Generate `Stem1`, `Stem2`, ... taking the first free suffix.
    pub fn auto_name(&self, key: Option<Uuid>, stem: &str) -> String {
        let mut n = 1u32;
        loop {
            let candidate = format!("{}{}", stem, n);
            if !self.name_taken(key, &candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Look a node up by its group-path-qualified name, e.g. `"Group1.Blur2"`.
    pub fn node_by_fully_qualified_name(&self, qualified: &str) -> Option<&Node> {
        let mut key: Option<Uuid> = None;
        let mut found: Option<Uuid> = None;
        for segment in qualified.split('.') {
            let id = self.id_by_name_in(key, segment)?;
            found = Some(id);
            key = Some(id);
        }
        found.and_then(|id| self.nodes.get(&id))
    }

    pub fn fully_qualified_name(&self, id: Uuid) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(&id)?;
        segments.push(current.name.clone());
        while let Some(parent) = current.parent {
            current = self.nodes.get(&parent)?;
            segments.push(current.name.clone());
        }
        segments.reverse();
        Some(segments.join("."))
    }

    /// Top-level node ids in insertion order.
    pub fn top_level_ids(&self) -> &[Uuid] {
        &self.root.node_ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::catalog::PluginDescriptor;

    fn leaf(graph: &NodeGraph, name: &str, parent: Option<Uuid>) -> Node {
        let descriptor = PluginDescriptor {
            id: "Test".to_string(),
            major: 1,
            minor: 0,
        };
        let mut node = Node::new(&descriptor, parent, (0.0, 0.0));
        node.name = graph.unique_name(parent, name, false).unwrap();
        node
    }

    #[test]
    fn remove_group_cascades_to_children() {
        let mut graph = NodeGraph::new();
        let mut group = leaf(&graph, "Group1", None);
        group.is_group = true;
        let group_id = graph.insert(group).unwrap();
        let child = leaf(&graph, "Blur1", Some(group_id));
        graph.insert(child).unwrap();
        assert_eq!(graph.len(), 2);

        graph.remove(group_id);
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn fully_qualified_lookup_descends_groups() {
        let mut graph = NodeGraph::new();
        let mut group = leaf(&graph, "Group1", None);
        group.is_group = true;
        let group_id = graph.insert(group).unwrap();
        let child = leaf(&graph, "Blur1", Some(group_id));
        let child_id = graph.insert(child).unwrap();

        let found = graph.node_by_fully_qualified_name("Group1.Blur1").unwrap();
        assert_eq!(found.id, child_id);
        assert_eq!(
            graph.fully_qualified_name(child_id).unwrap(),
            "Group1.Blur1"
        );
        assert!(graph.node_by_fully_qualified_name("Group1.Missing").is_none());
    }

    #[test]
    fn unique_name_policies() {
        let mut graph = NodeGraph::new();
        graph.insert(leaf(&graph, "Write1", None)).unwrap();
        assert_eq!(graph.unique_name(None, "Write1", false).unwrap(), "Write2");
        assert!(matches!(
            graph.unique_name(None, "Write1", true),
            Err(CoreError::NameCollision(_))
        ));
    }
}
