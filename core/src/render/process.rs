//! Delegation of a single work item to a spawned external render process.
//!
//! The dispatcher's responsibility narrows here to spawning the process with
//! the saved project path and work descriptor, and surfacing its lifecycle;
//! the pixel rendering happens in the child.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use log::info;

use crate::error::CoreError;
use crate::render::RenderWork;

/// How to launch a background render process. Defaults to re-invoking the
/// current executable in `--background` mode.
#[derive(Clone, Debug)]
pub struct BackgroundRenderConfig {
    pub command: PathBuf,
    pub extra_args: Vec<String>,
}

impl Default for BackgroundRenderConfig {
    fn default() -> Self {
        Self {
            command: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("lattice")),
            extra_args: Vec::new(),
        }
    }
}

/// A spawned background render and the work it was given.
pub struct RenderProcessHandler {
    pub writer_name: String,
    pub first_frame: i64,
    pub last_frame: i64,
    pub frame_step: i64,
    child: Child,
}

impl RenderProcessHandler {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Block until the child exits; a non-zero exit is reported as a render
    /// failure of the whole item.
    pub fn wait(mut self) -> Result<(), CoreError> {
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(CoreError::RenderFailed {
                writer: self.writer_name,
                frame: self.first_frame,
                reason: format!("render process exited with {}", status),
            })
        }
    }

    pub fn kill(&mut self) {
        let _ = self.child.kill();
    }
}

/// Spawn the configured render command for one work item against the
/// project saved at `save_path`.
pub fn spawn_background_render(
    config: &BackgroundRenderConfig,
    save_path: &Path,
    work: &RenderWork,
    enable_stats: bool,
) -> Result<RenderProcessHandler, CoreError> {
    let writer_spec = format!(
        "{}:{}-{}:{}",
        work.writer.name, work.first_frame, work.last_frame, work.frame_step
    );
    let mut command = Command::new(&config.command);
    command
        .arg(save_path)
        .arg("--background")
        .arg("-w")
        .arg(&writer_spec)
        .stdin(Stdio::null());
    if enable_stats {
        command.arg("--stats");
    }
    command.args(&config.extra_args);

    info!(
        "spawning render process {} for writer '{}'",
        config.command.display(),
        work.writer.name
    );
    let child = command.spawn().map_err(|e| {
        CoreError::ProcessSpawnFailed(format!("{}: {}", config.command.display(), e))
    })?;

    Ok(RenderProcessHandler {
        writer_name: work.writer.name.clone(),
        first_frame: work.first_frame,
        last_frame: work.last_frame,
        frame_step: work.frame_step,
        child,
    })
}
