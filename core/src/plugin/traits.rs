//! Core plugin traits.

use serde_json::Value;

use crate::error::CoreError;
use crate::graph::Node;

/// A processing-node plugin as registered in the catalog.
///
/// Several versions of the same identifier may coexist; the catalog keys
/// entries by `(id, major, minor)`.
pub trait NodePlugin: Send + Sync {
    fn id(&self) -> &str;

    /// Display label, also the stem for auto-generated node names.
    fn label(&self) -> String;

    /// `(major, minor)` version of this registration.
    fn version(&self) -> (u32, u32);

    /// Writer plugins produce output on disk and can be rendered.
    fn is_output(&self) -> bool {
        false
    }

    /// Set up the freshly constructed node (default parameter values and the
    /// like). A failure here aborts the creation with `ConstructionFailed`.
    fn construct(&self, node: &mut Node) -> Result<(), CoreError>;

    /// Composite/group plugins return the sub-nodes to create inside their
    /// child collection; leaf plugins return `None`.
    fn group_contents(&self) -> Option<Vec<GroupChildSpec>> {
        None
    }
}

/// One sub-node of a composite plugin, created recursively by the factory
/// during group expansion.
#[derive(Clone, Debug)]
pub struct GroupChildSpec {
    pub plugin_id: String,
    pub major: i32,
    pub minor: i32,
    pub name_hint: Option<String>,
    pub params: Vec<(String, Value)>,
}

impl GroupChildSpec {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            major: -1,
            minor: -1,
            name_hint: None,
            params: Vec::new(),
        }
    }
}

/// Constructor symbol exported by dynamically loaded plugin libraries.
pub type NodePluginCreateFn = unsafe extern "C" fn() -> *mut dyn NodePlugin;
