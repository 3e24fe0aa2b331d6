//! Project/document state: node graph, timeline and serialization payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

use crate::graph::NodeGraph;

/// Frame range and playhead of the open document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Timeline {
    pub first_frame: i64,
    pub last_frame: i64,
    pub fps: f64,
    pub current_frame: i64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            first_frame: 1,
            last_frame: 250,
            fps: 24.0,
            current_frame: 1,
        }
    }
}

impl Timeline {
    pub fn frame_range(&self) -> (i64, i64) {
        (self.first_frame, self.last_frame)
    }
}

/// One open project/document. Owned by exactly one `AppInstance`; mutated
/// only from the owning thread.
#[derive(Debug, Default)]
pub struct Project {
    pub name: String,
    pub path: Option<PathBuf>,
    pub timeline: Timeline,
    pub graph: NodeGraph,
    /// Compatibility flag for documents authored by the case-inconsistent
    /// 1.0 series; carried per project, never process-global.
    pub lower_case_plugin_ids: bool,
    /// Name of the scripted callback to run once the project is created or
    /// loaded. Execution is delegated to the embedding scripting host.
    pub on_created_callback: Option<String>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty() && self.path.is_none()
    }

    /// Walk the arena into a nested serialization payload. Non-persistent
    /// nodes are skipped.
    pub fn serialize(&self) -> ProjectSerialization {
        let nodes = self
            .graph
            .top_level_ids()
            .iter()
            .filter_map(|id| self.serialize_node(*id))
            .collect();
        ProjectSerialization {
            name: self.name.clone(),
            timeline: self.timeline.clone(),
            created_with_lower_case_ids: self.lower_case_plugin_ids,
            on_created_callback: self.on_created_callback.clone(),
            nodes,
        }
    }

    fn serialize_node(&self, id: Uuid) -> Option<NodeSerialization> {
        let node = self.graph.node(id)?;
        if !node.persistent {
            return None;
        }
        let children = if node.is_group {
            self.graph
                .collection(Some(id))
                .map(|collection| {
                    collection
                        .node_ids
                        .iter()
                        .filter_map(|child| self.serialize_node(*child))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Some(NodeSerialization {
            plugin_id: node.plugin_id.clone(),
            major: node.major as i32,
            minor: node.minor as i32,
            name: node.name.clone(),
            position: node.position,
            multi_instance_parent: node.multi_instance_parent.clone(),
            params: node
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            children,
        })
    }
}

/// Opaque per-node payload: identifier, version, name and parameter values.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NodeSerialization {
    pub plugin_id: String,
    pub major: i32,
    pub minor: i32,
    pub name: String,
    #[serde(default)]
    pub position: (f64, f64),
    #[serde(default)]
    pub multi_instance_parent: Option<String>,
    #[serde(default)]
    pub params: Vec<(String, Value)>,
    #[serde(default)]
    pub children: Vec<NodeSerialization>,
}

/// Top-level project payload: node graph, timeline state, frame range.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectSerialization {
    pub name: String,
    #[serde(default)]
    pub timeline: Timeline,
    #[serde(default)]
    pub created_with_lower_case_ids: bool,
    #[serde(default)]
    pub on_created_callback: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSerialization>,
}
