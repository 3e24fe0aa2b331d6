use lattice::plugin::NodePlugin;
use lattice::{CoreError, Node};
use serde_json::json;

/// Linear gradient generator, loaded dynamically by the plugin catalog.
pub struct RampPlugin;

impl NodePlugin for RampPlugin {
    fn id(&self) -> &str {
        "Ramp"
    }

    fn label(&self) -> String {
        "Ramp".to_string()
    }

    fn version(&self) -> (u32, u32) {
        (1, 0)
    }

    fn construct(&self, node: &mut Node) -> Result<(), CoreError> {
        node.set_param("color0", json!([0.0, 0.0, 0.0, 1.0]));
        node.set_param("color1", json!([1.0, 1.0, 1.0, 1.0]));
        node.set_param("angle", json!(0.0));
        Ok(())
    }
}

#[allow(improper_ctypes_definitions)]
#[no_mangle]
pub extern "C" fn create_node_plugin() -> *mut dyn NodePlugin {
    let plugin: Box<dyn NodePlugin> = Box::new(RampPlugin);
    Box::into_raw(plugin)
}
