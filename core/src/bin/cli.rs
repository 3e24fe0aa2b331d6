//! Headless render front-end: load a project, render its writers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::error;

use lattice::plugin::builtin::register_builtins;
use lattice::render::{RenderRequest, RenderSubmission};
use lattice::{
    AppInstance, CoreError, HeadlessPresentation, NullRenderEngine, PluginCatalog, SessionRegistry,
};

#[derive(Parser)]
#[command(name = "lattice", about = "Render the writers of a Lattice project.")]
struct Cli {
    /// Project file to load.
    project: PathBuf,

    /// Writer to render, as NAME:FIRST-LAST[:STEP]. Repeatable.
    #[arg(short = 'w', long = "writer", value_name = "NAME:FIRST-LAST[:STEP]")]
    writers: Vec<String>,

    /// Wait for each writer to finish before returning.
    #[arg(long)]
    blocking: bool,

    /// Collect render statistics.
    #[arg(long)]
    stats: bool,

    /// Spawned-process mode; implies --blocking.
    #[arg(long, hide = true)]
    background: bool,
}

fn parse_writer_spec(spec: &str) -> Result<RenderRequest, String> {
    let mut parts = spec.split(':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing writer name in '{}'", spec))?;
    let range = parts
        .next()
        .ok_or_else(|| format!("missing frame range in '{}'", spec))?;
    let (first, last) = range
        .split_once('-')
        .ok_or_else(|| format!("frame range must be FIRST-LAST in '{}'", spec))?;
    let first: i64 = first
        .trim()
        .parse()
        .map_err(|_| format!("bad first frame in '{}'", spec))?;
    let last: i64 = last
        .trim()
        .parse()
        .map_err(|_| format!("bad last frame in '{}'", spec))?;
    let step: i64 = match parts.next() {
        Some(step) => step
            .trim()
            .parse()
            .map_err(|_| format!("bad frame step in '{}'", spec))?,
        None => 1,
    };
    Ok(RenderRequest {
        writer_name: name.to_string(),
        first_frame: first,
        last_frame: last,
        frame_step: step,
    })
}

fn run(cli: Cli) -> Result<usize, CoreError> {
    let mut catalog = PluginCatalog::new();
    register_builtins(&mut catalog);
    if let Ok(dir) = std::env::var("LATTICE_PLUGIN_PATH") {
        catalog.load_plugins_from_directory(&dir)?;
    }

    let sessions = SessionRegistry::new();
    let app = AppInstance::new(
        Arc::new(catalog),
        Arc::new(NullRenderEngine),
        Arc::new(HeadlessPresentation),
        sessions,
    );
    let app = app.load_project(&cli.project)?;

    let submissions: Vec<RenderSubmission> = cli
        .writers
        .iter()
        .map(|spec| {
            parse_writer_spec(spec)
                .map(RenderSubmission::Named)
                .map_err(CoreError::Project)
        })
        .collect::<Result<_, _>>()?;
    if submissions.is_empty() {
        return Err(CoreError::Project(
            "no writers requested, pass at least one -w".to_string(),
        ));
    }

    let blocking = cli.blocking || cli.background;
    let outcome = app.start_writers_rendering(cli.stats, blocking, submissions)?;
    let mut failed = outcome.failures.len();
    if let Some(batch) = outcome.batch {
        for item in batch.wait_all() {
            if let Err(e) = item.result {
                error!("writer '{}' failed: {}", item.writer_name, e);
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!("{} writer(s) failed to render", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_writer_spec;

    #[test]
    fn parses_full_spec() {
        let req = parse_writer_spec("Write1:1-100:2").unwrap();
        assert_eq!(req.writer_name, "Write1");
        assert_eq!((req.first_frame, req.last_frame, req.frame_step), (1, 100, 2));
    }

    #[test]
    fn step_defaults_to_one() {
        let req = parse_writer_spec("Group1.Write1:5-10").unwrap();
        assert_eq!(req.writer_name, "Group1.Write1");
        assert_eq!(req.frame_step, 1);
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(parse_writer_spec("Write1").is_err());
        assert!(parse_writer_spec(":1-10").is_err());
        assert!(parse_writer_spec("Write1:abc-10").is_err());
    }
}
