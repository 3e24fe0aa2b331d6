//! Built-in node plugins registered at startup.
//!
//! These cover the minimum surface a headless session needs: a generator,
//! a merge, a writer and a composite group. Everything else comes from
//! dynamically loaded plugin libraries.

use std::sync::Arc;

use serde_json::json;

use crate::error::CoreError;
use crate::graph::Node;
use crate::plugin::catalog::PluginCatalog;
use crate::plugin::traits::{GroupChildSpec, NodePlugin};

pub const CHECKERBOARD_ID: &str = "Checkerboard";
pub const MERGE_ID: &str = "Merge";
pub const WRITE_IMAGE_ID: &str = "WriteImage";
pub const SCRIPT_GROUP_ID: &str = "ScriptGroup";

pub fn register_builtins(catalog: &mut PluginCatalog) {
    // Two majors of Checkerboard stay registered so documents pinned to the
    // old major keep loading.
    catalog.register(Arc::new(CheckerboardPlugin { major: 1, minor: 0 }));
    catalog.register(Arc::new(CheckerboardPlugin { major: 2, minor: 0 }));
    catalog.register(Arc::new(CheckerboardPlugin { major: 2, minor: 1 }));
    catalog.register(Arc::new(MergePlugin));
    catalog.register(Arc::new(WriteImagePlugin));
    catalog.register(Arc::new(ScriptGroupPlugin));
}

struct CheckerboardPlugin {
    major: u32,
    minor: u32,
}

impl NodePlugin for CheckerboardPlugin {
    fn id(&self) -> &str {
        CHECKERBOARD_ID
    }

    fn label(&self) -> String {
        "Checkerboard".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    fn construct(&self, node: &mut Node) -> Result<(), CoreError> {
        node.set_param("box_size", json!(64));
        node.set_param("color0", json!([0.0, 0.0, 0.0, 1.0]));
        node.set_param("color1", json!([1.0, 1.0, 1.0, 1.0]));
        Ok(())
    }
}

struct MergePlugin;

impl NodePlugin for MergePlugin {
    fn id(&self) -> &str {
        MERGE_ID
    }

    fn label(&self) -> String {
        "Merge".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, node: &mut Node) -> Result<(), CoreError> {
        node.set_param("operation", json!("over"));
        node.set_param("mix", json!(1.0));
        Ok(())
    }
}

struct WriteImagePlugin;

impl NodePlugin for WriteImagePlugin {
    fn id(&self) -> &str {
        WRITE_IMAGE_ID
    }

    fn label(&self) -> String {
        "Write".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn is_output(&self) -> bool {
        true
    }

    fn construct(&self, node: &mut Node) -> Result<(), CoreError> {
        node.set_param("filename", json!(""));
        node.set_param("format", json!("png"));
        Ok(())
    }
}

/// Composite plugin whose contents come from a scripted template: a
/// generator merged over the group input.
struct ScriptGroupPlugin;

impl NodePlugin for ScriptGroupPlugin {
    fn id(&self) -> &str {
        SCRIPT_GROUP_ID
    }

    fn label(&self) -> String {
        "ScriptGroup".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, _node: &mut Node) -> Result<(), CoreError> {
        Ok(())
    }

    fn group_contents(&self) -> Option<Vec<GroupChildSpec>> {
        Some(vec![
            GroupChildSpec::new(CHECKERBOARD_ID),
            GroupChildSpec::new(MERGE_ID),
        ])
    }
}
