//! Executes a normalized render work list, blocking or as background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{error, info};

use crate::error::CoreError;
use crate::render::RenderWork;
use crate::render::engine::RenderEngine;

/// Per-item completion report of a non-blocking batch. Each item reports
/// exactly once; arrival order is unspecified.
#[derive(Debug)]
pub struct RenderOutcome {
    pub writer_name: String,
    pub first_frame: i64,
    pub last_frame: i64,
    pub result: Result<(), CoreError>,
}

/// Handle to an in-flight non-blocking batch.
#[derive(Debug)]
pub struct RenderBatch {
    rx: Receiver<RenderOutcome>,
    cancel: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    expected: usize,
}

impl RenderBatch {
    /// Number of items that will eventually report.
    pub fn expected_items(&self) -> usize {
        self.expected
    }

    /// Request cooperative cancellation; remaining items report `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Block until the next item reports. `None` once all items reported.
    pub fn next_outcome(&self) -> Option<RenderOutcome> {
        self.rx.recv().ok()
    }

    /// Drain all remaining reports and join the worker threads.
    pub fn wait_all(self) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::with_capacity(self.expected);
        while let Ok(outcome) = self.rx.recv() {
            outcomes.push(outcome);
        }
        let mut workers = self.workers.lock().unwrap();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        outcomes
    }
}

/// Dispatches render work against a `RenderEngine`.
pub struct RenderDispatcher {
    engine: Arc<dyn RenderEngine>,
}

impl RenderDispatcher {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self { engine }
    }

    /// Execute `work` in list order.
    ///
    /// Blocking mode suspends the caller until the whole list completes; the
    /// first fatal failure aborts the remainder and is returned as one
    /// aggregate error identifying the failed item (already-completed items
    /// are not rolled back). Non-blocking mode runs each item as an
    /// independent background task and returns a `RenderBatch` that reports
    /// per item.
    pub fn start_writers_rendering(
        &self,
        enable_stats: bool,
        blocking: bool,
        work: Vec<RenderWork>,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Option<RenderBatch>, CoreError> {
        if blocking {
            for item in &work {
                render_one(self.engine.as_ref(), cancel, enable_stats, item)?;
            }
            Ok(None)
        } else {
            let (tx, rx) = channel::<RenderOutcome>();
            let expected = work.len();
            let mut workers = Vec::with_capacity(expected);
            for item in work {
                workers.push(self.spawn_item(enable_stats, item, tx.clone(), cancel));
            }
            drop(tx);
            Ok(Some(RenderBatch {
                rx,
                cancel: Arc::clone(cancel),
                workers: Mutex::new(workers),
                expected,
            }))
        }
    }

    fn spawn_item(
        &self,
        enable_stats: bool,
        item: RenderWork,
        tx: Sender<RenderOutcome>,
        cancel: &Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let cancel = Arc::clone(cancel);
        thread::spawn(move || {
            let result = render_one(engine.as_ref(), &cancel, enable_stats, &item);
            if let Err(e) = &result {
                error!("render of '{}' failed: {}", item.writer.name, e);
            }
            let _ = tx.send(RenderOutcome {
                writer_name: item.writer.name.clone(),
                first_frame: item.first_frame,
                last_frame: item.last_frame,
                result,
            });
        })
    }
}

/// Drive one work item through the engine, checking the cancel signal at
/// frame boundaries.
fn render_one(
    engine: &dyn RenderEngine,
    cancel: &AtomicBool,
    enable_stats: bool,
    work: &RenderWork,
) -> Result<(), CoreError> {
    if work.frame_step <= 0 {
        return Err(CoreError::InvalidFrameStep(work.frame_step));
    }
    if work.last_frame < work.first_frame {
        return Err(CoreError::InvalidFrameRange {
            first: work.first_frame,
            last: work.last_frame,
        });
    }

    info!(
        "rendering writer '{}' frames {}-{} step {}",
        work.writer.name, work.first_frame, work.last_frame, work.frame_step
    );
    engine
        .begin_sequence(
            &work.writer,
            work.first_frame,
            work.last_frame,
            work.frame_step,
            enable_stats,
        )
        .map_err(|e| wrap_frame_error(work, work.first_frame, e))?;

    let mut frame = work.first_frame;
    while frame <= work.last_frame {
        if cancel.load(Ordering::SeqCst) {
            engine.end_sequence(&work.writer);
            return Err(CoreError::Cancelled);
        }
        if let Err(e) = engine.render_frame(&work.writer, frame) {
            engine.end_sequence(&work.writer);
            return Err(wrap_frame_error(work, frame, e));
        }
        frame += work.frame_step;
    }
    engine.end_sequence(&work.writer);
    Ok(())
}

fn wrap_frame_error(work: &RenderWork, frame: i64, error: CoreError) -> CoreError {
    match error {
        CoreError::Cancelled => CoreError::Cancelled,
        other => CoreError::RenderFailed {
            writer: work.writer.name.clone(),
            frame,
            reason: other.to_string(),
        },
    }
}
