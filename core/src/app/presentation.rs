//! Presentation callbacks exposed to a GUI collaborator.
//!
//! The core never requires a GUI: every method has a no-op default and
//! `HeadlessPresentation` is the stock null implementation.

use crate::graph::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardButton {
    Yes,
    No,
    Ok,
    Cancel,
}

#[allow(unused_variables)]
pub trait SessionPresentation: Send + Sync {
    /// Create the node's presentation (node-graph item, settings panel).
    /// `load_request` suppresses interactive affordances such as file
    /// dialogs and auto-connect during bulk/load operations.
    fn create_node_gui(
        &self,
        node: &Node,
        load_request: bool,
        auto_connect: bool,
        user_edited: bool,
        position: (f64, f64),
        push_undo_redo: bool,
    ) {
    }

    /// Invoked once per top-level creation call, after any recursive group
    /// expansion finished.
    fn on_group_creation_finished(&self, node: &Node, requested_by_load: bool, user_edited: bool) {}

    /// A background render process was spawned for `sequence_name`.
    fn notify_render_process_handler_started(
        &self,
        sequence_name: &str,
        first_frame: i64,
        last_frame: i64,
        frame_step: i64,
    ) {
    }

    fn progress_start(&self, message: &str, can_cancel: bool) {}

    /// Returns false when the user asked to cancel.
    fn progress_update(&self, fraction: f64) -> bool {
        true
    }

    fn progress_end(&self) {}

    fn error_dialog(&self, title: &str, message: &str) {}

    fn warning_dialog(&self, title: &str, message: &str) {}

    fn information_dialog(&self, title: &str, message: &str) {}

    fn question_dialog(&self, title: &str, message: &str) -> StandardButton {
        StandardButton::Yes
    }
}

/// Null implementation used by background sessions and tests.
pub struct HeadlessPresentation;

impl SessionPresentation for HeadlessPresentation {}
