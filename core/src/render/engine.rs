//! Invocation contract of the render-tree evaluation engine.
//!
//! Pixel processing itself lives outside this core; the dispatcher only
//! drives this interface frame by frame.

use log::debug;

use crate::error::CoreError;
use crate::graph::Node;

#[allow(unused_variables)]
pub trait RenderEngine: Send + Sync {
    /// Called once before the frame loop of a work item. `enable_stats`
    /// requests per-frame render statistics collection.
    fn begin_sequence(
        &self,
        writer: &Node,
        first_frame: i64,
        last_frame: i64,
        frame_step: i64,
        enable_stats: bool,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    /// Evaluate the render tree upstream of `writer` for one frame.
    fn render_frame(&self, writer: &Node, frame: i64) -> Result<(), CoreError>;

    /// Called once after the frame loop, on success and failure alike.
    fn end_sequence(&self, writer: &Node) {}
}

/// Engine used by headless sessions with no evaluation backend attached;
/// every frame is a logged no-op.
pub struct NullRenderEngine;

impl RenderEngine for NullRenderEngine {
    fn render_frame(&self, writer: &Node, frame: i64) -> Result<(), CoreError> {
        debug!("null engine: writer '{}' frame {}", writer.name, frame);
        Ok(())
    }
}
