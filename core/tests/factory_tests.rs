//! Node creation workflow: naming, rollback and recursive group expansion.

use std::sync::{Arc, Mutex};

use serde_json::json;

use lattice::plugin::traits::GroupChildSpec;
use lattice::plugin::{NodePlugin, PluginCatalog};
use lattice::{
    AppFlags, CoreError, HeadlessPresentation, Node, NodeCreationRequest, NodeFactory,
    NodeSerialization, Project,
};

struct LeafPlugin {
    id: &'static str,
}

impl NodePlugin for LeafPlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, node: &mut Node) -> Result<(), CoreError> {
        node.set_param("size", json!(10.0));
        Ok(())
    }
}

struct BrokenPlugin;

impl NodePlugin for BrokenPlugin {
    fn id(&self) -> &str {
        "Broken"
    }

    fn label(&self) -> String {
        "Broken".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, _node: &mut Node) -> Result<(), CoreError> {
        Err(CoreError::Project("factory exploded".to_string()))
    }
}

/// Records the session flags observed while each node constructs, so tests
/// can assert what recursive expansion looked like from the inside.
struct SpyPlugin {
    id: &'static str,
    flags: Arc<AppFlags>,
    seen: Arc<Mutex<Vec<(bool, bool)>>>,
}

impl NodePlugin for SpyPlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, _node: &mut Node) -> Result<(), CoreError> {
        self.seen.lock().unwrap().push((
            self.flags.creating_node.get(),
            self.flags.creating_node_tree.get(),
        ));
        Ok(())
    }
}

struct GroupPlugin {
    id: &'static str,
    children: Vec<&'static str>,
}

impl NodePlugin for GroupPlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, _node: &mut Node) -> Result<(), CoreError> {
        Ok(())
    }

    fn group_contents(&self) -> Option<Vec<GroupChildSpec>> {
        Some(self.children.iter().map(|id| GroupChildSpec::new(*id)).collect())
    }
}

struct Fixture {
    factory: NodeFactory,
    flags: Arc<AppFlags>,
    seen: Arc<Mutex<Vec<(bool, bool)>>>,
    project: Project,
}

fn fixture() -> Fixture {
    let flags = Arc::new(AppFlags::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut catalog = PluginCatalog::new();
    catalog.register(Arc::new(LeafPlugin { id: "Blur" }));
    catalog.register(Arc::new(BrokenPlugin));
    catalog.register(Arc::new(SpyPlugin {
        id: "Spy",
        flags: Arc::clone(&flags),
        seen: Arc::clone(&seen),
    }));
    catalog.register(Arc::new(GroupPlugin {
        id: "Group",
        children: vec!["Spy", "Blur"],
    }));
    catalog.register(Arc::new(GroupPlugin {
        id: "Outer",
        children: vec!["Group"],
    }));
    catalog.register(Arc::new(GroupPlugin {
        id: "BadGroup",
        children: vec!["Blur", "Broken"],
    }));

    let factory = NodeFactory::new(
        Arc::new(catalog),
        Arc::new(HeadlessPresentation),
        Arc::clone(&flags),
    );
    Fixture {
        factory,
        flags,
        seen,
        project: Project::new("Test"),
    }
}

#[test]
fn auto_names_take_first_free_suffix() {
    let mut f = fixture();
    let a = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("Blur"))
        .unwrap();
    let b = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("Blur"))
        .unwrap();
    assert_eq!(f.project.graph.node(a).unwrap().name, "Blur1");
    assert_eq!(f.project.graph.node(b).unwrap().name, "Blur2");
}

#[test]
fn fixed_name_collision_suffixes_by_default_and_fails_when_strict() {
    let mut f = fixture();
    let request = NodeCreationRequest::new("Blur").with_fixed_name("Soften", false);
    f.factory.create_node(&mut f.project, request).unwrap();

    let relaxed = NodeCreationRequest::new("Blur").with_fixed_name("Soften", false);
    let id = f.factory.create_node(&mut f.project, relaxed).unwrap();
    assert_eq!(f.project.graph.node(id).unwrap().name, "Soften1");

    let before = f.project.graph.len();
    let strict = NodeCreationRequest::new("Blur").with_fixed_name("Soften", true);
    let err = f.factory.create_node(&mut f.project, strict).unwrap_err();
    assert!(matches!(err, CoreError::NameCollision(name) if name == "Soften"));
    assert_eq!(f.project.graph.len(), before);
}

#[test]
fn failed_construction_leaves_graph_unchanged() {
    let mut f = fixture();
    let before = f.project.graph.len();
    let err = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("Broken"))
        .unwrap_err();
    assert!(matches!(err, CoreError::ConstructionFailed { .. }));
    assert_eq!(f.project.graph.len(), before);
}

#[test]
fn unknown_plugin_leaves_graph_unchanged() {
    let mut f = fixture();
    let err = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("NoSuchThing"))
        .unwrap_err();
    assert!(matches!(err, CoreError::PluginNotFound(_)));
    assert_eq!(f.project.graph.len(), 0);
}

#[test]
fn group_expansion_creates_children_in_the_group_collection() {
    let mut f = fixture();
    let group = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("Group"))
        .unwrap();

    assert_eq!(f.project.graph.len(), 3);
    let spy = f
        .project
        .graph
        .node_by_fully_qualified_name("Group1.Spy1")
        .expect("child should live inside the group");
    assert_eq!(spy.parent, Some(group));
    assert!(
        f.project
            .graph
            .node_by_fully_qualified_name("Group1.Blur1")
            .is_some()
    );
    // Children are not visible at the root.
    assert!(f.project.graph.node_by_fully_qualified_name("Spy1").is_none());
}

#[test]
fn tree_flag_is_set_during_expansion_and_restored_after() {
    let mut f = fixture();
    f.factory
        .create_node(&mut f.project, NodeCreationRequest::new("Outer"))
        .unwrap();

    // The spy sits two group levels deep; both flags were observed true
    // while it constructed.
    let seen = f.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(true, true)]);
    drop(seen);

    assert!(!f.flags.creating_node.get());
    assert!(!f.flags.creating_node_tree.get());
    assert!(!f.flags.creating_group.get());
}

#[test]
fn failed_child_rolls_back_the_entire_group() {
    let mut f = fixture();
    let err = f
        .factory
        .create_node(&mut f.project, NodeCreationRequest::new("BadGroup"))
        .unwrap_err();
    assert!(matches!(err, CoreError::ConstructionFailed { .. }));
    assert_eq!(f.project.graph.len(), 0);
    assert!(!f.flags.creating_node_tree.get());
}

#[test]
fn param_values_apply_in_list_order() {
    let mut f = fixture();
    let request = NodeCreationRequest::new("Blur")
        .with_param("size", json!(2.0))
        .with_param("size", json!(7.5));
    let id = f.factory.create_node(&mut f.project, request).unwrap();
    assert_eq!(f.project.graph.node(id).unwrap().param("size"), Some(&json!(7.5)));
}

fn blur_payload(name: &str) -> NodeSerialization {
    NodeSerialization {
        plugin_id: "Blur".to_string(),
        major: 1,
        minor: 0,
        name: name.to_string(),
        position: (10.0, 20.0),
        multi_instance_parent: None,
        params: vec![("size".to_string(), json!(3.0))],
        children: Vec::new(),
    }
}

#[test]
fn load_node_honors_the_serialized_name() {
    let mut f = fixture();
    let request = NodeCreationRequest::for_load(blur_payload("CustomBlur"), false);
    let id = f.factory.load_node(&mut f.project, request).unwrap();
    let node = f.project.graph.node(id).unwrap();
    assert_eq!(node.name, "CustomBlur");
    assert_eq!(node.param("size"), Some(&json!(3.0)));
}

#[test]
fn dont_load_name_regenerates_to_avoid_collisions() {
    let mut f = fixture();
    f.factory
        .create_node(&mut f.project, NodeCreationRequest::new("Blur"))
        .unwrap();

    // Paste flow: the serialized name "Blur1" would clash.
    let request = NodeCreationRequest::for_load(blur_payload("Blur1"), true);
    let id = f.factory.load_node(&mut f.project, request).unwrap();
    assert_eq!(f.project.graph.node(id).unwrap().name, "Blur2");
}

#[test]
fn emptied_group_reloads_without_its_script_contents() {
    let mut f = fixture();

    // A document whose "Group" node had its scripted children deleted: the
    // serialized child list is empty and must stay authoritative on reload.
    let payload = NodeSerialization {
        plugin_id: "Group".to_string(),
        major: 1,
        minor: 0,
        name: "Group1".to_string(),
        position: (0.0, 0.0),
        multi_instance_parent: None,
        params: Vec::new(),
        children: Vec::new(),
    };
    let id = f
        .factory
        .load_node(&mut f.project, NodeCreationRequest::for_load(payload, false))
        .unwrap();

    assert_eq!(f.project.graph.len(), 1);
    assert!(f.project.graph.node(id).unwrap().is_group);
    assert!(
        f.project
            .graph
            .node_by_fully_qualified_name("Group1.Spy1")
            .is_none()
    );
    // The scripted Spy child never constructed.
    assert!(f.seen.lock().unwrap().is_empty());
}

#[test]
fn load_node_requires_a_payload() {
    let mut f = fixture();
    let err = f
        .factory
        .load_node(&mut f.project, NodeCreationRequest::new("Blur"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Project(_)));
}
