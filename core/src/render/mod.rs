//! Render job assembly and dispatch.

pub mod dispatcher;
pub mod engine;
pub mod process;

use crate::error::CoreError;
use crate::graph::{Node, NodeGraph};

/// A named render request: the writer is resolved to a node later.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub writer_name: String,
    pub first_frame: i64,
    pub last_frame: i64,
    pub frame_step: i64,
}

/// A fully resolved unit of rendering work.
#[derive(Clone, Debug)]
pub struct RenderWork {
    pub writer: Node,
    pub first_frame: i64,
    pub last_frame: i64,
    pub frame_step: i64,
}

/// The one submission shape `start_writers_rendering` accepts: either a
/// named request or work a caller already resolved (e.g. from the command
/// line).
#[derive(Clone, Debug)]
pub enum RenderSubmission {
    Named(RenderRequest),
    Resolved(RenderWork),
}

/// A submission dropped during job building, with the error that dropped it.
#[derive(Debug)]
pub struct BuildFailure {
    pub writer_name: String,
    pub error: CoreError,
}

/// Normalized work list plus the per-item failures that did not stop the
/// siblings from proceeding.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub work: Vec<RenderWork>,
    pub failures: Vec<BuildFailure>,
}

fn validate_range(first: i64, last: i64, step: i64) -> Result<(), CoreError> {
    if step <= 0 {
        return Err(CoreError::InvalidFrameStep(step));
    }
    if last < first {
        return Err(CoreError::InvalidFrameRange { first, last });
    }
    Ok(())
}

/// Turn a heterogeneous submission list into a normalized work list.
///
/// Named writers are resolved by fully-qualified name against the graph;
/// an unresolved name or invalid range drops that single submission with a
/// reported error while sibling submissions still proceed.
pub fn build_work_list(graph: &NodeGraph, submissions: Vec<RenderSubmission>) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();
    for submission in submissions {
        match submission {
            RenderSubmission::Named(request) => {
                if let Err(error) =
                    validate_range(request.first_frame, request.last_frame, request.frame_step)
                {
                    outcome.failures.push(BuildFailure {
                        writer_name: request.writer_name,
                        error,
                    });
                    continue;
                }
                match graph.node_by_fully_qualified_name(&request.writer_name) {
                    Some(node) if node.is_output => outcome.work.push(RenderWork {
                        writer: node.clone(),
                        first_frame: request.first_frame,
                        last_frame: request.last_frame,
                        frame_step: request.frame_step,
                    }),
                    _ => outcome.failures.push(BuildFailure {
                        error: CoreError::WriterNotFound(request.writer_name.clone()),
                        writer_name: request.writer_name,
                    }),
                }
            }
            RenderSubmission::Resolved(work) => {
                match validate_range(work.first_frame, work.last_frame, work.frame_step) {
                    Ok(()) => outcome.work.push(work),
                    Err(error) => outcome.failures.push(BuildFailure {
                        writer_name: work.writer.name.clone(),
                        error,
                    }),
                }
            }
        }
    }
    outcome
}
