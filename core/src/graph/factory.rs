//! Node creation orchestration: plugin resolution, construction, naming,
//! insertion and recursive group expansion.

use std::sync::Arc;

use log::debug;
use serde_json::Value;
use uuid::Uuid;

use crate::app::guard::{AppFlags, FlagGuard};
use crate::app::presentation::SessionPresentation;
use crate::error::CoreError;
use crate::graph::Node;
use crate::plugin::catalog::PluginCatalog;
use crate::plugin::traits::GroupChildSpec;
use crate::project::{NodeSerialization, Project};

/// Unified description of one node creation, covering both the fresh
/// creation path and the load-from-serialization path. Exactly one of the
/// two is active: `serialization` is `Some` iff loading.
#[derive(Clone, Debug)]
pub struct NodeCreationRequest {
    pub plugin_id: String,
    /// Requested major version, -1 = latest.
    pub major: i32,
    /// Requested minor version, -1 = latest.
    pub minor: i32,
    pub multi_instance_parent: Option<String>,
    /// Spatial hint for presentation only.
    pub position: (f64, f64),
    pub fixed_name: Option<String>,
    /// With a fixed name: fail with `NameCollision` instead of auto-suffixing.
    pub strict_name: bool,
    /// Parameter defaults applied in order after construction.
    pub param_values: Vec<(String, Value)>,
    /// Owning collection: a group node id, or `None` for the project root.
    pub group: Option<Uuid>,
    pub auto_connect: bool,
    pub push_undo_redo: bool,
    pub user_edited: bool,
    pub add_to_project: bool,
    pub create_presentation: bool,
    pub requested_by_load: bool,
    /// On the load path: regenerate the name instead of honoring the
    /// serialized one (copy/paste flows, where it would clash).
    pub dont_load_name: bool,
    pub serialization: Option<NodeSerialization>,
}

impl NodeCreationRequest {
    /// Fresh-creation request with interactive defaults.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            major: -1,
            minor: -1,
            multi_instance_parent: None,
            position: (0.0, 0.0),
            fixed_name: None,
            strict_name: false,
            param_values: Vec::new(),
            group: None,
            auto_connect: true,
            push_undo_redo: true,
            user_edited: true,
            add_to_project: true,
            create_presentation: true,
            requested_by_load: false,
            dont_load_name: false,
            serialization: None,
        }
    }

    /// Request replaying a serialization payload (project load, paste).
    pub fn for_load(serialization: NodeSerialization, dont_load_name: bool) -> Self {
        Self {
            plugin_id: serialization.plugin_id.clone(),
            major: serialization.major,
            minor: serialization.minor,
            multi_instance_parent: serialization.multi_instance_parent.clone(),
            position: serialization.position,
            fixed_name: None,
            strict_name: false,
            param_values: Vec::new(),
            group: None,
            auto_connect: false,
            push_undo_redo: false,
            user_edited: false,
            add_to_project: true,
            create_presentation: true,
            requested_by_load: true,
            dont_load_name,
            serialization: Some(serialization),
        }
    }

    pub fn with_group(mut self, group: Option<Uuid>) -> Self {
        self.group = group;
        self
    }

    pub fn with_fixed_name(mut self, name: impl Into<String>, strict: bool) -> Self {
        self.fixed_name = Some(name.into());
        self.strict_name = strict;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.param_values.push((key.into(), value));
        self
    }

    pub fn with_version(mut self, major: i32, minor: i32) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }
}

/// What the presentation layer needs to hear about a finished top-level
/// creation. Kept separate from the graph mutation so a caller holding a
/// project lock can release it before the hooks run.
#[derive(Clone, Debug)]
pub struct CreationNotice {
    pub requested_by_load: bool,
    pub auto_connect: bool,
    pub user_edited: bool,
    pub position: (f64, f64),
    pub push_undo_redo: bool,
    pub create_presentation: bool,
}

impl CreationNotice {
    fn from_request(request: &NodeCreationRequest) -> Self {
        Self {
            requested_by_load: request.requested_by_load,
            auto_connect: request.auto_connect,
            user_edited: request.user_edited,
            position: request.position,
            push_undo_redo: request.push_undo_redo,
            create_presentation: request.create_presentation,
        }
    }
}

/// Resolves plugins, constructs nodes and attaches them into the project
/// graph. Creation is all-or-nothing: a failure anywhere (including inside
/// recursive group expansion) leaves the graph unchanged.
pub struct NodeFactory {
    catalog: Arc<PluginCatalog>,
    presentation: Arc<dyn SessionPresentation>,
    flags: Arc<AppFlags>,
}

impl NodeFactory {
    pub fn new(
        catalog: Arc<PluginCatalog>,
        presentation: Arc<dyn SessionPresentation>,
        flags: Arc<AppFlags>,
    ) -> Self {
        Self {
            catalog,
            presentation,
            flags,
        }
    }

    /// Create a fresh node from an explicit request.
    pub fn create_node(
        &self,
        project: &mut Project,
        request: NodeCreationRequest,
    ) -> Result<Uuid, CoreError> {
        let (id, notice) = self.create_node_deferred(project, request)?;
        if let Some(node) = project.graph.node(id) {
            self.notify_created(node, &notice);
        }
        Ok(id)
    }

    /// `create_node` minus the presentation hooks, which the caller fires
    /// through `notify_created` once it no longer holds the project lock.
    pub fn create_node_deferred(
        &self,
        project: &mut Project,
        request: NodeCreationRequest,
    ) -> Result<(Uuid, CreationNotice), CoreError> {
        let notice = CreationNotice::from_request(&request);
        let id = self.create_node_internal(project, request)?;
        Ok((id, notice))
    }

    /// Same pipeline as `create_node`, sourcing name and parameters from the
    /// attached serialization payload.
    pub fn load_node(
        &self,
        project: &mut Project,
        request: NodeCreationRequest,
    ) -> Result<Uuid, CoreError> {
        let (id, notice) = self.load_node_deferred(project, request)?;
        if let Some(node) = project.graph.node(id) {
            self.notify_created(node, &notice);
        }
        Ok(id)
    }

    /// `load_node` minus the presentation hooks.
    pub fn load_node_deferred(
        &self,
        project: &mut Project,
        request: NodeCreationRequest,
    ) -> Result<(Uuid, CreationNotice), CoreError> {
        if request.serialization.is_none() {
            return Err(CoreError::Project(
                "load_node requires a serialization payload".to_string(),
            ));
        }
        self.create_node_deferred(project, request)
    }

    /// Fire the top-level presentation hooks for a created node.
    pub fn notify_created(&self, node: &Node, notice: &CreationNotice) {
        if notice.create_presentation {
            self.presentation.create_node_gui(
                node,
                notice.requested_by_load,
                notice.auto_connect,
                notice.user_edited,
                notice.position,
                notice.push_undo_redo,
            );
        }
        self.presentation
            .on_group_creation_finished(node, notice.requested_by_load, notice.user_edited);
    }

    fn create_node_internal(
        &self,
        project: &mut Project,
        request: NodeCreationRequest,
    ) -> Result<Uuid, CoreError> {
        let _creating = FlagGuard::acquire(&self.flags.creating_node, true);

        let resolved = self.catalog.resolve_with_fallback(
            &request.plugin_id,
            request.major,
            request.minor,
            project.lower_case_plugin_ids,
        )?;
        debug!(
            "creating node from plugin '{}' v{}.{}",
            resolved.descriptor.id, resolved.descriptor.major, resolved.descriptor.minor
        );

        let contents = resolved.plugin.group_contents();

        let mut node = Node::new(&resolved.descriptor, request.group, request.position);
        node.is_group = contents.is_some();
        node.is_output = resolved.plugin.is_output();
        node.persistent = request.add_to_project;
        node.multi_instance_parent = request.multi_instance_parent.clone();
        resolved
            .plugin
            .construct(&mut node)
            .map_err(|e| CoreError::ConstructionFailed {
                plugin: resolved.descriptor.id.clone(),
                reason: e.to_string(),
            })?;

        node.name = match (&request.serialization, request.dont_load_name) {
            (Some(payload), false) => {
                project
                    .graph
                    .unique_name(request.group, &payload.name, false)?
            }
            _ => match &request.fixed_name {
                Some(fixed) => {
                    project
                        .graph
                        .unique_name(request.group, fixed, request.strict_name)?
                }
                None => project
                    .graph
                    .auto_name(request.group, &resolved.plugin.label()),
            },
        };

        match &request.serialization {
            Some(payload) => {
                for (key, value) in &payload.params {
                    node.set_param(key.clone(), value.clone());
                }
            }
            None => {
                for (key, value) in &request.param_values {
                    node.set_param(key.clone(), value.clone());
                }
            }
        }

        let id = project.graph.insert(node)?;

        // Recursive phase: serialized children win over scripted contents so
        // that loading a group replays what the document actually contained.
        let child_requests = self.child_requests(&request, contents);
        if !child_requests.is_empty() {
            let _tree = FlagGuard::acquire(&self.flags.creating_node_tree, true);
            let _group = FlagGuard::acquire(&self.flags.creating_group, true);
            for child in child_requests {
                let child = child.with_group(Some(id));
                if let Err(e) = self.create_node_internal(project, child) {
                    project.graph.remove(id);
                    return Err(e);
                }
            }
        }

        Ok(id)
    }

    fn child_requests(
        &self,
        request: &NodeCreationRequest,
        contents: Option<Vec<GroupChildSpec>>,
    ) -> Vec<NodeCreationRequest> {
        if let Some(payload) = &request.serialization {
            // The payload is authoritative, even when its child list is
            // empty: a group the user emptied must not re-expand its
            // scripted contents on reload.
            return payload
                .children
                .iter()
                .map(|child| {
                    let mut req = NodeCreationRequest::for_load(child.clone(), false);
                    req.create_presentation = false;
                    req
                })
                .collect();
        }
        contents
            .unwrap_or_default()
            .into_iter()
            .map(|spec| {
                let mut req = NodeCreationRequest::new(&spec.plugin_id);
                req.major = spec.major;
                req.minor = spec.minor;
                req.fixed_name = spec.name_hint;
                req.param_values = spec.params;
                req.auto_connect = false;
                req.push_undo_redo = false;
                req.user_edited = false;
                req.create_presentation = false;
                req.requested_by_load = request.requested_by_load;
                req
            })
            .collect()
    }
}
