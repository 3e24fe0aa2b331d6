//! Application-instance core of the Lattice node compositor.
//!
//! Owns the lifecycle of one open project, instantiates processing nodes
//! from a versioned plugin catalog, and assembles and dispatches render
//! jobs over frame ranges. The pixel-processing engine, GUI and scripting
//! host are external collaborators consumed through narrow interfaces.

pub mod app;
pub mod error;
pub mod graph;
pub mod plugin;
pub mod project;
pub mod render;

pub use app::guard::{AppFlags, FlagGuard, ReentrancyFlag};
pub use app::presentation::{HeadlessPresentation, SessionPresentation, StandardButton};
pub use app::{AppInstance, SessionRegistry, SessionState, WritersRenderOutcome};
pub use error::CoreError;
pub use graph::factory::{CreationNotice, NodeCreationRequest, NodeFactory};
pub use graph::{Node, NodeCollection, NodeGraph};
pub use plugin::{NodePlugin, PluginCatalog};
pub use project::{NodeSerialization, Project, ProjectSerialization, Timeline};
pub use render::engine::{NullRenderEngine, RenderEngine};
pub use render::{RenderRequest, RenderSubmission, RenderWork};
