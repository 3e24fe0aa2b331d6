//! The application-instance layer: one session owning one open project.

pub mod guard;
pub mod presentation;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use log::{debug, error, info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::error::CoreError;
use crate::graph::Node;
use crate::graph::factory::{NodeCreationRequest, NodeFactory};
use crate::plugin::builtin::WRITE_IMAGE_ID;
use crate::plugin::catalog::PluginCatalog;
use crate::project::{Project, ProjectSerialization};
use crate::render::dispatcher::{RenderBatch, RenderDispatcher};
use crate::render::engine::RenderEngine;
use crate::render::process::{
    BackgroundRenderConfig, RenderProcessHandler, spawn_background_render,
};
use crate::render::{BuildFailure, RenderSubmission, RenderWork, build_work_list};
use guard::AppFlags;
use presentation::SessionPresentation;

/// Lifecycle state of the project slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loading,
    Ready,
    Saving,
    Rendering,
    Closing,
    Closed,
}

/// Tracks the live sessions of the process and fires the quit hook when the
/// last one closes.
#[derive(Default)]
pub struct SessionRegistry {
    live: Mutex<HashSet<u32>>,
    next_id: AtomicU32,
    on_quit: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_on_quit(&self, hook: Box<dyn Fn() + Send + Sync>) {
        *self.on_quit.lock().unwrap() = Some(hook);
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    fn register(&self) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().insert(id);
        id
    }

    fn deregister(&self, id: u32) {
        let empty = {
            let mut live = self.live.lock().unwrap();
            live.remove(&id);
            live.is_empty()
        };
        if empty {
            info!("last session closed, signalling quit");
            if let Some(hook) = &*self.on_quit.lock().unwrap() {
                hook();
            }
        }
    }
}

/// Reported outcome of `start_writers_rendering`: per-item build failures
/// (siblings proceeded) and, for non-blocking calls, the batch handle.
pub struct WritersRenderOutcome {
    pub failures: Vec<BuildFailure>,
    pub batch: Option<RenderBatch>,
}

/// Handle to a full-sequence render started in the background.
pub enum RenderSequenceHandle {
    InProcess(RenderBatch),
    Process(RenderProcessHandler),
}

/// One session: owns the open project, composes the plugin catalog, node
/// factory, render dispatcher and presentation callbacks.
///
/// Interactive operations (node creation, lifecycle) run on the owning
/// thread; rendering runs on worker threads or in a separate process.
pub struct AppInstance {
    app_id: u32,
    project: Arc<RwLock<Project>>,
    catalog: Arc<PluginCatalog>,
    factory: NodeFactory,
    dispatcher: RenderDispatcher,
    presentation: Arc<dyn SessionPresentation>,
    engine: Arc<dyn RenderEngine>,
    flags: Arc<AppFlags>,
    sessions: Arc<SessionRegistry>,
    state: Mutex<SessionState>,
    created_callback_ran: AtomicBool,
    on_project_created: Mutex<Option<Box<dyn Fn(&str) + Send + Sync>>>,
    render_cancel: Mutex<Option<Arc<AtomicBool>>>,
    background_render: Mutex<BackgroundRenderConfig>,
}

impl AppInstance {
    pub fn new(
        catalog: Arc<PluginCatalog>,
        engine: Arc<dyn RenderEngine>,
        presentation: Arc<dyn SessionPresentation>,
        sessions: Arc<SessionRegistry>,
    ) -> Arc<Self> {
        let flags = Arc::new(AppFlags::new());
        let app_id = sessions.register();
        debug!("session {} created", app_id);
        Arc::new(Self {
            app_id,
            project: Arc::new(RwLock::new(Project::new("Untitled"))),
            factory: NodeFactory::new(
                Arc::clone(&catalog),
                Arc::clone(&presentation),
                Arc::clone(&flags),
            ),
            dispatcher: RenderDispatcher::new(Arc::clone(&engine)),
            catalog,
            presentation,
            engine,
            flags,
            sessions,
            state: Mutex::new(SessionState::Empty),
            created_callback_ran: AtomicBool::new(false),
            on_project_created: Mutex::new(None),
            render_cancel: Mutex::new(None),
            background_render: Mutex::new(BackgroundRenderConfig::default()),
        })
    }

    pub fn app_id(&self) -> u32 {
        self.app_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        match self.state() {
            SessionState::Closed | SessionState::Closing => {
                Err(CoreError::Project("session is closed".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn project(&self) -> Arc<RwLock<Project>> {
        Arc::clone(&self.project)
    }

    pub fn catalog(&self) -> Arc<PluginCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn get_frame_range(&self) -> (i64, i64) {
        self.project.read().unwrap().timeline.frame_range()
    }

    pub fn set_background_render_config(&self, config: BackgroundRenderConfig) {
        *self.background_render.lock().unwrap() = config;
    }

    /// Install the scripting-host hook run by
    /// `exec_on_project_created_callback`.
    pub fn set_on_project_created(&self, hook: Box<dyn Fn(&str) + Send + Sync>) {
        *self.on_project_created.lock().unwrap() = Some(hook);
    }

    // --- Re-entrancy flags -------------------------------------------------

    pub fn is_creating_node(&self) -> bool {
        self.flags.creating_node.get()
    }

    pub fn is_creating_node_tree(&self) -> bool {
        self.flags.creating_node_tree.get()
    }

    pub fn set_is_creating_node_tree(&self, value: bool) {
        self.flags.creating_node_tree.set(value);
    }

    pub fn is_creating_group(&self) -> bool {
        self.flags.creating_group.get()
    }

    pub fn flags(&self) -> Arc<AppFlags> {
        Arc::clone(&self.flags)
    }

    // --- Legacy compatibility ---------------------------------------------

    pub fn set_project_was_created_with_lower_case_ids(&self, value: bool) {
        self.project.write().unwrap().lower_case_plugin_ids = value;
    }

    pub fn was_project_created_with_lower_case_ids(&self) -> bool {
        self.project.read().unwrap().lower_case_plugin_ids
    }

    // --- Node creation -----------------------------------------------------

    /// Create a new node in the node graph. See `NodeCreationRequest` for
    /// the version and naming rules.
    ///
    /// The presentation hooks fire after the project lock is released, so a
    /// presentation may read the project from its callbacks.
    pub fn create_node(&self, request: NodeCreationRequest) -> Result<Uuid, CoreError> {
        self.ensure_open()?;
        let (id, notice) = {
            let mut project = self.project.write().unwrap();
            self.factory.create_node_deferred(&mut project, request)?
        };
        if self.state() == SessionState::Empty {
            self.set_state(SessionState::Ready);
        }
        let created = self.project.read().unwrap().graph.node(id).cloned();
        if let Some(node) = created {
            self.factory.notify_created(&node, &notice);
        }
        Ok(id)
    }

    /// Same as `create_node` but sourced from a project serialization.
    pub fn load_node(&self, request: NodeCreationRequest) -> Result<Uuid, CoreError> {
        self.ensure_open()?;
        let (id, notice) = {
            let mut project = self.project.write().unwrap();
            self.factory.load_node_deferred(&mut project, request)?
        };
        if self.state() == SessionState::Empty {
            self.set_state(SessionState::Ready);
        }
        let created = self.project.read().unwrap().graph.node(id).cloned();
        if let Some(node) = created {
            self.factory.notify_created(&node, &notice);
        }
        Ok(id)
    }

    pub fn get_node_by_fully_specified_name(&self, name: &str) -> Option<Node> {
        self.project
            .read()
            .unwrap()
            .graph
            .node_by_fully_qualified_name(name)
            .cloned()
    }

    /// Convenience: create a writer node for `filename`, optionally pinned
    /// to a frame range.
    pub fn create_writer(
        &self,
        filename: &str,
        group: Option<Uuid>,
        user_edited: bool,
        frame_range: Option<(i64, i64)>,
    ) -> Result<Uuid, CoreError> {
        let mut request = NodeCreationRequest::new(WRITE_IMAGE_ID)
            .with_group(group)
            .with_param("filename", json!(filename));
        request.user_edited = user_edited;
        if let Some((first, last)) = frame_range {
            request = request
                .with_param("first_frame", json!(first))
                .with_param("last_frame", json!(last));
        }
        self.create_node(request)
    }

    // --- Rendering ---------------------------------------------------------

    /// Assemble and dispatch render work for a list of writer submissions.
    ///
    /// Build failures (unknown writer, invalid range) drop the single
    /// submission, are reported through the presentation layer and returned
    /// in the outcome; sibling submissions still render. In blocking mode the
    /// call suspends until the whole list completes and the first fatal
    /// failure is returned as the call's error.
    pub fn start_writers_rendering(
        &self,
        enable_stats: bool,
        blocking: bool,
        submissions: Vec<RenderSubmission>,
    ) -> Result<WritersRenderOutcome, CoreError> {
        self.ensure_open()?;
        let outcome = {
            let project = self.project.read().unwrap();
            build_work_list(&project.graph, submissions)
        };
        for failure in &outcome.failures {
            warn!(
                "dropping render request '{}': {}",
                failure.writer_name, failure.error
            );
            self.presentation
                .error_dialog("Render", &failure.error.to_string());
        }
        if outcome.work.is_empty() {
            return Ok(WritersRenderOutcome {
                failures: outcome.failures,
                batch: None,
            });
        }

        let cancel = Arc::new(AtomicBool::new(false));
        *self.render_cancel.lock().unwrap() = Some(Arc::clone(&cancel));

        if blocking {
            self.set_state(SessionState::Rendering);
            let result =
                self.dispatcher
                    .start_writers_rendering(enable_stats, true, outcome.work, &cancel);
            self.set_state(SessionState::Ready);
            result?;
            Ok(WritersRenderOutcome {
                failures: outcome.failures,
                batch: None,
            })
        } else {
            let batch = self
                .dispatcher
                .start_writers_rendering(enable_stats, false, outcome.work, &cancel)?;
            Ok(WritersRenderOutcome {
                failures: outcome.failures,
                batch,
            })
        }
    }

    /// Cooperatively cancel the current render batch, if any.
    pub fn abort_rendering(&self) {
        if let Some(cancel) = &*self.render_cancel.lock().unwrap() {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Render one work item to completion, optionally in a separate process
    /// fed by the project saved at `save_path`.
    pub fn start_rendering_blocking_full_sequence(
        &self,
        enable_stats: bool,
        work: RenderWork,
        render_in_separate_process: bool,
        save_path: &Path,
    ) -> Result<(), CoreError> {
        if render_in_separate_process {
            let handler = self.spawn_render_process(enable_stats, &work, save_path)?;
            handler.wait()
        } else {
            self.start_writers_rendering(enable_stats, true, vec![RenderSubmission::Resolved(work)])
                .map(|_| ())
        }
    }

    /// Background variant of `start_rendering_blocking_full_sequence`.
    pub fn start_rendering_full_sequence(
        &self,
        enable_stats: bool,
        work: RenderWork,
        render_in_separate_process: bool,
        save_path: &Path,
    ) -> Result<RenderSequenceHandle, CoreError> {
        if render_in_separate_process {
            let handler = self.spawn_render_process(enable_stats, &work, save_path)?;
            Ok(RenderSequenceHandle::Process(handler))
        } else {
            let outcome = self.start_writers_rendering(
                enable_stats,
                false,
                vec![RenderSubmission::Resolved(work)],
            )?;
            match outcome.batch {
                Some(batch) => Ok(RenderSequenceHandle::InProcess(batch)),
                None => Err(CoreError::Project(
                    "render work was rejected during job building".to_string(),
                )),
            }
        }
    }

    fn spawn_render_process(
        &self,
        enable_stats: bool,
        work: &RenderWork,
        save_path: &Path,
    ) -> Result<RenderProcessHandler, CoreError> {
        self.save_temp(save_path)?;
        let config = self.background_render.lock().unwrap().clone();
        let handler = spawn_background_render(&config, save_path, work, enable_stats)?;
        self.presentation.notify_render_process_handler_started(
            &work.writer.name,
            work.first_frame,
            work.last_frame,
            work.frame_step,
        );
        Ok(handler)
    }

    // --- Project lifecycle -------------------------------------------------

    /// Open a new, empty session. When the current project is itself empty
    /// the existing session is reused instead of opening another one.
    pub fn new_project(self: &Arc<Self>) -> Arc<AppInstance> {
        if self.project.read().unwrap().is_empty() && self.state() == SessionState::Empty {
            return Arc::clone(self);
        }
        AppInstance::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.engine),
            Arc::clone(&self.presentation),
            Arc::clone(&self.sessions),
        )
    }

    /// Load a project file. Loads in place when this session is empty,
    /// otherwise into a fresh session (matching the one-document-per-window
    /// model). Runs the project-created callback once the graph is
    /// populated.
    pub fn load_project(self: &Arc<Self>, path: &Path) -> Result<Arc<AppInstance>, CoreError> {
        self.ensure_open()?;
        let target = if self.project.read().unwrap().is_empty() {
            Arc::clone(self)
        } else {
            self.new_project()
        };
        target.load_project_into(path)?;
        Ok(target)
    }

    fn load_project_into(&self, path: &Path) -> Result<(), CoreError> {
        info!("loading project {}", path.display());
        self.set_state(SessionState::Loading);
        let result = self.load_project_inner(path);
        match &result {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                self.created_callback_ran.store(false, Ordering::SeqCst);
                self.exec_on_project_created_callback();
            }
            Err(e) => {
                error!("failed to load {}: {}", path.display(), e);
                self.set_state(SessionState::Empty);
            }
        }
        result
    }

    fn load_project_inner(&self, path: &Path) -> Result<(), CoreError> {
        let text = std::fs::read_to_string(path)?;
        let payload: ProjectSerialization = serde_json::from_str(&text)?;

        let mut project = Project::new(&payload.name);
        project.path = Some(path.to_path_buf());
        project.timeline = payload.timeline.clone();
        project.lower_case_plugin_ids = payload.created_with_lower_case_ids;
        project.on_created_callback = payload.on_created_callback.clone();

        {
            use guard::FlagGuard;
            let _tree = FlagGuard::acquire(&self.flags.creating_node_tree, true);
            for node_payload in payload.nodes {
                let request = NodeCreationRequest::for_load(node_payload, false);
                self.factory.load_node(&mut project, request)?;
            }
        }

        *self.project.write().unwrap() = project;
        Ok(())
    }

    /// Run the deferred project-created callback, exactly once per
    /// successful project creation or load.
    pub fn exec_on_project_created_callback(&self) {
        if self.created_callback_ran.swap(true, Ordering::SeqCst) {
            return;
        }
        let callback = self.project.read().unwrap().on_created_callback.clone();
        let Some(callback) = callback else {
            return;
        };
        if let Some(hook) = &*self.on_project_created.lock().unwrap() {
            debug!("running project-created callback '{}'", callback);
            hook(&callback);
        }
    }

    /// Save to the project's current path.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = self
            .project
            .read()
            .unwrap()
            .path
            .clone()
            .ok_or_else(|| CoreError::Project("untitled project, use save_as".to_string()))?;
        self.save_internal(&path, true)
    }

    /// Save to `path` and adopt it as the project path. A failed write
    /// leaves the prior path and name in place.
    pub fn save_as(&self, path: &Path) -> Result<(), CoreError> {
        let prior = {
            let mut project = self.project.write().unwrap();
            let prior = (project.path.clone(), project.name.clone());
            project.path = Some(path.to_path_buf());
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                project.name = stem.to_string();
            }
            prior
        };
        let result = self.save_internal(path, true);
        if result.is_err() {
            let mut project = self.project.write().unwrap();
            project.path = prior.0;
            project.name = prior.1;
        }
        result
    }

    /// Write a copy to `path` without touching the project path or state
    /// (auto-save, background-render hand-off).
    pub fn save_temp(&self, path: &Path) -> Result<(), CoreError> {
        self.save_internal(path, false)
    }

    fn save_internal(&self, path: &Path, update_state: bool) -> Result<(), CoreError> {
        if update_state {
            self.set_state(SessionState::Saving);
        }
        let result = (|| -> Result<(), CoreError> {
            let json = {
                let project = self.project.read().unwrap();
                serde_json::to_string_pretty(&project.serialize())?
            };
            std::fs::write(path, json)?;
            Ok(())
        })();
        if update_state {
            self.set_state(SessionState::Ready);
        }
        if result.is_ok() {
            info!("saved project to {}", path.display());
        }
        result
    }

    /// Serialize on the owning thread, write on a worker thread. Failures
    /// are logged, never surfaced as dialogs.
    pub fn trigger_auto_save(&self) -> JoinHandle<()> {
        let (json, path) = {
            let project = self.project.read().unwrap();
            let path = match &project.path {
                Some(p) => autosave_path(p),
                None => std::env::temp_dir().join(format!("{}.autosave.ltx", project.name)),
            };
            (
                serde_json::to_string_pretty(&project.serialize()),
                path,
            )
        };
        std::thread::spawn(move || match json {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    error!("auto-save to {} failed: {}", path.display(), e);
                } else {
                    debug!("auto-saved to {}", path.display());
                }
            }
            Err(e) => error!("auto-save serialization failed: {}", e),
        })
    }

    /// Close the current project's content but keep the session alive.
    pub fn reset_project(&self) {
        self.abort_rendering();
        let name = {
            let mut project = self.project.write().unwrap();
            *project = Project::new("Untitled");
            project.name.clone()
        };
        debug!("session {} reset to '{}'", self.app_id, name);
        self.created_callback_ran.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Empty);
    }

    /// Close content and terminate the session. Closing the last live
    /// session fires the registry's quit hook.
    pub fn close_project(&self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.set_state(SessionState::Closing);
        self.abort_rendering();
        {
            let mut project = self.project.write().unwrap();
            *project = Project::new("Untitled");
        }
        self.set_state(SessionState::Closed);
        self.sessions.deregister(self.app_id);
        info!("session {} closed", self.app_id);
    }

    pub fn quit(&self) {
        self.close_project();
    }
}

fn autosave_path(project_path: &Path) -> PathBuf {
    let mut os = project_path.as_os_str().to_os_string();
    os.push(".autosave");
    PathBuf::from(os)
}
