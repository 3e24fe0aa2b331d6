use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::plugin::catalog::PluginDescriptor;

/// One processing unit in the compositing graph.
///
/// A node is owned by exactly one collection at a time: either the project
/// root or the collection of a parent group node. Group nodes own a child
/// collection of their own.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: Uuid,
    /// Unique within the owning collection at any instant.
    pub name: String,
    pub plugin_id: String,
    pub major: u32,
    pub minor: u32,
    /// Owning group node, `None` for the project root collection.
    pub parent: Option<Uuid>,
    pub position: (f64, f64),
    pub params: BTreeMap<String, Value>,
    pub multi_instance_parent: Option<String>,
    pub is_group: bool,
    pub is_output: bool,
    /// Non-persistent nodes are skipped by project serialization.
    pub persistent: bool,
}

impl Node {
    pub fn new(descriptor: &PluginDescriptor, parent: Option<Uuid>, position: (f64, f64)) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            plugin_id: descriptor.id.clone(),
            major: descriptor.major,
            minor: descriptor.minor,
            parent,
            position,
            params: BTreeMap::new(),
            multi_instance_parent: None,
            is_group: false,
            is_output: false,
            persistent: true,
        }
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}
