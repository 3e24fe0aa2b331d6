pub mod builtin;
pub mod catalog;
pub mod traits;

pub use catalog::{PluginCatalog, PluginDescriptor, ResolvedPlugin};
pub use traits::{GroupChildSpec, NodePlugin};
