//! Engine facade.
//!
//! Wires the credential gate, catalog client, project store, persistence
//! scheduler and compile orchestrator together and exposes the editor-facing
//! operations.
//!
//! ```text
//!            ┌──────────────┐  401   ┌─────────────────┐
//!            │ RemoteApi    │ ─────► │ CredentialGate  │──watch──► sign-out
//!            └──────▲───────┘        └─────────────────┘
//!                   │
//!   ┌───────────────┼──────────────────────────┐
//!   │               │                          │
//! Catalog      PersistenceScheduler      CompileOrchestrator
//!   │ hydrate       ▲ schedule                 ▲ (debounced)
//!   ▼               │                          │
//! ┌────────────────────────────────────────────┴──┐
//! │ Session: ProjectState + generation + events   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Store mutations are applied synchronously in call order. Their remote
//! effects run as tokio tasks and may complete in any order; every effect
//! carries the generation it was issued under and is discarded if a project
//! switch or sign-out happened meanwhile.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use texler_core::{ProjectDetails, ProjectId, ProjectState, WorkspaceId, WorkspaceSummary};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::CatalogClient;
use crate::compile::{ArtifactInfo, CompileOrchestrator, CompileOutcome, CompileTrigger};
use crate::config::EngineConfig;
use crate::credentials::{AuthState, CredentialGate};
use crate::error::SyncError;
use crate::persistence::{PendingWrite, PersistenceScheduler};
use crate::preview::PreviewSurface;
use crate::remote::RemoteApi;
use crate::session::{EngineEvent, Session, WriteTarget};

struct EngineInner {
    config: EngineConfig,
    gate: Arc<CredentialGate>,
    session: Arc<Session>,
    catalog: CatalogClient,
    saves: PersistenceScheduler,
    orchestrator: CompileOrchestrator,
    trigger: CompileTrigger,
    /// Credential epoch the last bootstrap ran under
    bootstrapped: Mutex<Option<u64>>,
}

/// The sync engine.
///
/// Must be created inside a tokio runtime: it spawns a task watching the
/// credential gate.
pub struct Engine {
    inner: Arc<EngineInner>,
    event_rx: Option<mpsc::Receiver<EngineEvent>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        remote: Arc<dyn RemoteApi>,
        gate: Arc<CredentialGate>,
        surface: Arc<dyn PreviewSurface>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let session = Arc::new(Session::new(remote.clone(), event_tx));

        let inner = Arc::new(EngineInner {
            catalog: CatalogClient::new(remote.clone()),
            saves: PersistenceScheduler::new(session.clone(), config.save_debounce),
            orchestrator: CompileOrchestrator::new(remote, surface),
            trigger: CompileTrigger::new(config.compile_debounce),
            bootstrapped: Mutex::new(None),
            config,
            gate,
            session,
        });

        let watcher = spawn_auth_watcher(&inner);
        Self {
            inner,
            event_rx: Some(event_rx),
            watcher: Mutex::new(Some(watcher)),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.event_rx.take()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn gate(&self) -> &Arc<CredentialGate> {
        &self.inner.gate
    }

    // ── Catalog & selection ─────────────────────────────────────

    /// Refresh the catalog and, if nothing is selected yet, select the
    /// first workspace and its first project.
    ///
    /// Runs once per credential epoch; later calls in the same epoch are
    /// no-ops.
    pub async fn bootstrap(&self) -> Result<(), SyncError> {
        self.inner.clone().bootstrap().await
    }

    pub async fn refresh_workspaces(&self) -> Vec<WorkspaceSummary> {
        self.inner.catalog.refresh_workspaces().await
    }

    /// The cached catalog.
    pub fn workspaces(&self) -> Vec<WorkspaceSummary> {
        self.inner.catalog.workspaces()
    }

    pub fn find_workspace(&self, workspace_id: WorkspaceId) -> Option<WorkspaceSummary> {
        self.inner.catalog.find_workspace(workspace_id)
    }

    /// Open the workspace's first project, or select it with an empty
    /// project when it has none.
    pub async fn select_workspace(&self, workspace_id: WorkspaceId) -> Result<(), SyncError> {
        let workspace = match self.inner.catalog.find_workspace(workspace_id) {
            Some(workspace) => workspace,
            None => self.inner.catalog.get_workspace(workspace_id).await?,
        };
        self.inner.enter_workspace(workspace).await
    }

    /// Switch to a project.
    ///
    /// Pending saves of the previous project are flushed against the
    /// previous project's ids; their results are not applied to the new
    /// store.
    pub async fn open_project(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<(), SyncError> {
        self.inner.open_project(workspace_id, project_id).await
    }

    pub async fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkspaceSummary, SyncError> {
        Ok(self.inner.catalog.create_workspace(name, description).await?)
    }

    /// Create a project. The store is hydrated from it when no project is
    /// resolved yet.
    pub async fn create_project(
        &self,
        workspace_id: WorkspaceId,
        name: Option<&str>,
    ) -> Result<ProjectDetails, SyncError> {
        let details = self.inner.catalog.create_project(workspace_id, name).await?;
        let unresolved = self
            .inner
            .session
            .with_store(|store| store.project_id().is_none());
        if unresolved {
            let generation = self.inner.begin_switch();
            let workspace_name = self.inner.workspace_name(workspace_id);
            self.inner
                .apply_project(generation, workspace_id, details.clone(), workspace_name);
        }
        Ok(details)
    }

    // ── Files & tabs ────────────────────────────────────────────

    /// Add a file locally and request its remote creation.
    ///
    /// The local insert stands even if the remote creation fails; the
    /// record is then marked `Failed`.
    pub fn add_file(&self, path: &str, content: &str) -> Result<(), SyncError> {
        let target = self.inner.session.write_target().ok_or(SyncError::NotSelected)?;
        self.inner.mutate(|store| store.add_file(path, content))?;
        self.inner
            .spawn_create(target, path.to_string(), content.to_string());
        Ok(())
    }

    /// Replace a file's content and schedule its save. Returns `false` for
    /// unknown paths.
    pub fn update_file(&self, path: &str, content: &str) -> bool {
        let Some(target) = self.inner.session.write_target() else {
            return false;
        };
        if !self.inner.mutate(|store| store.update_file(path, content)) {
            return false;
        }
        self.inner.saves.schedule(target, path, content);
        true
    }

    pub fn open_file(&self, path: &str) -> bool {
        self.inner.mutate(|store| store.open_file(path))
    }

    pub fn close_file(&self, path: &str) {
        self.inner.mutate(|store| store.close_file(path));
    }

    pub fn set_active_path(&self, path: Option<&str>) {
        self.inner
            .mutate(|store| store.set_active_path(path.map(str::to_string)));
    }

    /// Set the main file locally and request remote confirmation. The local
    /// value is not rolled back on failure.
    pub fn set_main_path(&self, path: &str) -> Result<(), SyncError> {
        let target = self.inner.session.write_target().ok_or(SyncError::NotSelected)?;
        self.inner.mutate(|store| store.set_main_path(path))?;
        self.inner.spawn_confirm_main(target, path.to_string());
        Ok(())
    }

    // ── Persistence ─────────────────────────────────────────────

    /// Write `path`'s current content now, cancelling its timer.
    pub async fn flush(&self, path: &str) -> Result<(), SyncError> {
        let target = self.inner.session.write_target().ok_or(SyncError::NotSelected)?;
        let content = self
            .inner
            .session
            .with_store(|store| store.file(path).map(|f| f.content.clone()))
            .ok_or_else(|| texler_core::ValidationError::UnknownPath(path.to_string()))?;
        self.inner.saves.flush(target, path, &content).await
    }

    /// Write every pending or failed path now, concurrently.
    pub async fn flush_all(&self) -> Vec<Result<(), SyncError>> {
        let mut writes = self.inner.saves.drain();
        if let Some(target) = self.inner.session.write_target() {
            let unsaved: Vec<PendingWrite> = self.inner.session.with_store(|store| {
                store
                    .modified_paths()
                    .into_iter()
                    .filter(|path| !writes.iter().any(|w| &w.path == path))
                    .filter_map(|path| {
                        let content = store.file(&path)?.content.clone();
                        Some(PendingWrite {
                            target,
                            path,
                            content,
                        })
                    })
                    .collect()
            });
            writes.extend(unsaved);
        }
        self.inner.saves.write_all(writes).await
    }

    pub fn pending_saves(&self) -> Vec<String> {
        self.inner.saves.pending_paths()
    }

    // ── Compilation ─────────────────────────────────────────────

    /// Compile immediately, cancelling any pending automatic compile.
    pub async fn compile_now(&self) -> CompileOutcome {
        self.inner.trigger.cancel();
        self.inner.clone().run_compile().await
    }

    pub fn compile_pending(&self) -> bool {
        self.inner.trigger.is_pending()
    }

    /// The artifact currently shown, if any.
    pub fn current_artifact(&self) -> Option<ArtifactInfo> {
        self.inner.orchestrator.current()
    }

    // ── State & teardown ────────────────────────────────────────

    /// A copy of the project state.
    pub fn state(&self) -> ProjectState {
        self.inner.session.snapshot_state()
    }

    /// Cancel every timer and background task and release the preview.
    pub fn shutdown(&self) {
        if let Some(watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.abort();
            log::debug!("Engine shut down");
        }
        self.inner.teardown();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_auth_watcher(inner: &Arc<EngineInner>) -> JoinHandle<()> {
    let mut rx = inner.gate.subscribe();
    let weak: Weak<EngineInner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            let Some(inner) = weak.upgrade() else {
                break;
            };
            match state {
                AuthState::Unauthenticated => inner.sign_out(),
                AuthState::Authenticated => {
                    if let Err(e) = inner.bootstrap().await {
                        log::warn!("Bootstrap failed: {e}");
                    }
                }
            }
        }
    })
}

impl EngineInner {
    /// Apply a store mutation and schedule a compile if it bumped the
    /// version or moved the active path.
    fn mutate<R>(self: &Arc<Self>, f: impl FnOnce(&mut ProjectState) -> R) -> R {
        let (result, changed, ready) = self.session.with_store(|store| {
            let version = store.version();
            let active = store.active_path().map(str::to_string);
            let result = f(store);
            let changed =
                store.version() > version || store.active_path() != active.as_deref();
            (result, changed, store.is_ready())
        });
        if changed && ready {
            self.schedule_compile();
        }
        result
    }

    fn schedule_compile(self: &Arc<Self>) {
        if !self.config.auto_compile {
            return;
        }
        let inner = self.clone();
        self.trigger.notify(async move {
            inner.run_compile().await;
        });
    }

    async fn run_compile(self: Arc<Self>) -> CompileOutcome {
        let generation = self.session.generation();
        let snapshot = self.session.with_store(|store| store.snapshot());
        let outcome = match snapshot {
            None => {
                log::debug!("Nothing to compile: no usable main file");
                CompileOutcome::NotCompilable
            }
            Some(snapshot) => {
                let session = self.session.clone();
                self.orchestrator
                    .compile_checked(&snapshot, move || session.is_current(generation))
                    .await
            }
        };
        if outcome != CompileOutcome::Stale {
            self.session.emit(EngineEvent::Compiled(outcome.clone()));
        }
        outcome
    }

    async fn bootstrap(self: Arc<Self>) -> Result<(), SyncError> {
        if !self.gate.is_authenticated() {
            return Err(SyncError::Auth);
        }
        let epoch = self.gate.epoch();
        {
            let mut done = self
                .bootstrapped
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *done == Some(epoch) {
                return Ok(());
            }
            *done = Some(epoch);
        }

        let workspaces = match self.catalog.try_refresh_workspaces().await {
            Ok(workspaces) => workspaces,
            Err(e) => {
                // Let the next bootstrap of this epoch try again.
                let mut done = self
                    .bootstrapped
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if *done == Some(epoch) {
                    *done = None;
                }
                return Err(e.into());
            }
        };
        if self.session.with_store(|store| store.workspace_id().is_some()) {
            return Ok(());
        }
        let Some(first) = workspaces.into_iter().next() else {
            log::info!("No workspaces to select");
            return Ok(());
        };
        log::info!("Selecting workspace {} ({})", first.name, first.id);
        self.enter_workspace(first).await
    }

    async fn enter_workspace(self: &Arc<Self>, workspace: WorkspaceSummary) -> Result<(), SyncError> {
        match workspace.first_project() {
            Some(project) => self.open_project(workspace.id, project.id).await,
            None => {
                self.begin_switch();
                self.mutate(|store| store.select_empty(workspace.id, Some(workspace.name.clone())));
                self.session.emit(EngineEvent::Hydrated {
                    workspace_id: workspace.id,
                    project_id: None,
                });
                Ok(())
            }
        }
    }

    async fn open_project(
        self: &Arc<Self>,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<(), SyncError> {
        let generation = self.begin_switch();
        let workspace_name = self.workspace_name(workspace_id);

        match self.catalog.load_project(workspace_id, project_id).await {
            Ok(details) => {
                self.apply_project(generation, workspace_id, details, workspace_name);
                Ok(())
            }
            Err(e) => {
                if self.session.is_current(generation) {
                    self.session.with_store(|store| store.set_loading(false));
                }
                log::warn!("Failed to load project {project_id}: {e}");
                Err(e.into())
            }
        }
    }

    fn apply_project(
        self: &Arc<Self>,
        generation: u64,
        workspace_id: WorkspaceId,
        details: ProjectDetails,
        workspace_name: Option<String>,
    ) {
        if !self.session.is_current(generation) {
            log::debug!("Discarding stale project load for {}", details.id);
            return;
        }
        let project_id = details.id;
        log::info!("Opened project {} ({project_id})", details.name);
        self.mutate(|store| store.hydrate(workspace_id, details, workspace_name));
        self.session.emit(EngineEvent::Hydrated {
            workspace_id,
            project_id: Some(project_id),
        });
    }

    /// Start a new generation: flush the previous project's pending saves,
    /// drop the pending compile and mark the store as loading.
    fn begin_switch(&self) -> u64 {
        let generation = self.session.advance_generation();
        let writes = self.saves.drain();
        if !writes.is_empty() {
            log::debug!("Flushing {} saves of the previous project", writes.len());
            let saves = self.saves.clone();
            tokio::spawn(async move {
                saves.write_all(writes).await;
            });
        }
        self.trigger.cancel();
        self.session.with_store(|store| store.set_loading(true));
        generation
    }

    fn workspace_name(&self, workspace_id: WorkspaceId) -> Option<String> {
        self.catalog.find_workspace(workspace_id).map(|w| w.name)
    }

    fn spawn_create(&self, target: WriteTarget, path: String, content: String) {
        let session = self.session.clone();
        tokio::spawn(async move {
            let result = session
                .remote()
                .create_file(target.workspace_id, target.project_id, &path, &content)
                .await;
            if !session.is_current(target.generation) {
                log::debug!("Discarding stale create result for {path}");
                return;
            }
            match result {
                Ok(_) => {
                    log::debug!("Created {path}");
                    session.with_store(|store| store.mark_saved(&path, &content));
                    session.emit(EngineEvent::Saved { path });
                }
                Err(e) => {
                    log::warn!("Failed to create {path}: {e}");
                    session.with_store(|store| store.mark_save_failed(&path));
                    let error = SyncError::Persistence {
                        path: path.clone(),
                        message: e.to_string(),
                    };
                    session.emit(EngineEvent::SaveFailed { path, error });
                }
            }
        });
    }

    fn spawn_confirm_main(&self, target: WriteTarget, path: String) {
        let session = self.session.clone();
        tokio::spawn(async move {
            let result = session
                .remote()
                .set_main_file(target.workspace_id, target.project_id, &path)
                .await;
            if !session.is_current(target.generation) {
                return;
            }
            match result {
                Ok(_) => session.with_store(|store| store.mark_main_synced(&path)),
                Err(e) => {
                    log::warn!("Failed to set main file {path}: {e}");
                    session.with_store(|store| store.mark_main_failed(&path));
                }
            }
        });
    }

    /// The credential was invalidated: end the session.
    fn sign_out(&self) {
        log::warn!("Signed out, tearing down session");
        self.teardown();
        self.session.with_store(ProjectState::clear);
        self.catalog.clear();
        *self
            .bootstrapped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.session.emit(EngineEvent::SignedOut);
    }

    fn teardown(&self) {
        self.session.advance_generation();
        self.saves.cancel_all();
        self.trigger.cancel();
        self.orchestrator.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::fake::{FakeRemote, Op};
    use crate::preview::MemorySurface;

    fn engine(remote: Arc<FakeRemote>) -> Engine {
        let gate = Arc::new(CredentialGate::with_token("token"));
        Engine::new(
            EngineConfig::for_testing(),
            remote,
            gate,
            Arc::new(MemorySurface::new()),
        )
    }

    #[tokio::test]
    async fn test_take_event_rx() {
        let mut engine = engine(Arc::new(FakeRemote::new()));
        assert!(engine.take_event_rx().is_some());
        assert!(engine.take_event_rx().is_none());
    }

    #[tokio::test]
    async fn test_mutations_need_a_project() {
        let engine = engine(Arc::new(FakeRemote::new()));
        assert_eq!(engine.add_file("a.tex", ""), Err(SyncError::NotSelected));
        assert!(!engine.update_file("a.tex", "x"));
        assert_eq!(engine.set_main_path("a.tex"), Err(SyncError::NotSelected));
    }

    #[tokio::test]
    async fn test_bootstrap_selects_first_workspace_and_project() {
        let remote = Arc::new(FakeRemote::new());
        let wid = remote.add_workspace("Thesis");
        let pid = remote.add_project(wid, "Draft", &[("main.tex", "X")], Some("main.tex"));
        let engine = engine(remote);

        engine.bootstrap().await.unwrap();

        let state = engine.state();
        assert_eq!(state.workspace_id(), Some(wid));
        assert_eq!(state.project_id(), Some(pid));
        assert_eq!(state.workspace_name(), Some("Thesis"));
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once_per_epoch() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_workspace("Thesis");
        let engine = engine(remote.clone());

        engine.bootstrap().await.unwrap();
        engine.bootstrap().await.unwrap();
        assert_eq!(
            remote.count(|c| matches!(c, crate::fake::Call::ListWorkspaces)),
            1
        );
    }

    #[tokio::test]
    async fn test_bootstrap_retries_after_failed_refresh() {
        let remote = Arc::new(FakeRemote::new());
        let wid = remote.add_workspace("Thesis");
        let pid = remote.add_project(wid, "Draft", &[("main.tex", "X")], Some("main.tex"));
        remote.fail_next(Op::ListWorkspaces, ApiError::Connectivity("down".into()));
        let engine = engine(remote.clone());

        assert_eq!(
            engine.bootstrap().await,
            Err(SyncError::Connectivity("down".into()))
        );
        assert_eq!(engine.state().workspace_id(), None);

        engine.bootstrap().await.unwrap();
        let state = engine.state();
        assert_eq!(state.workspace_id(), Some(wid));
        assert_eq!(state.project_id(), Some(pid));

        engine.bootstrap().await.unwrap();
        assert_eq!(
            remote.count(|c| matches!(c, crate::fake::Call::ListWorkspaces)),
            2
        );
    }

    #[tokio::test]
    async fn test_bootstrap_with_empty_workspace() {
        let remote = Arc::new(FakeRemote::new());
        let wid = remote.add_workspace("Empty");
        let engine = engine(remote.clone());

        engine.bootstrap().await.unwrap();

        let state = engine.state();
        assert_eq!(state.workspace_id(), Some(wid));
        assert_eq!(state.project_id(), None);
        assert!(!state.is_ready());
        assert_eq!(
            remote.count(|c| matches!(c, crate::fake::Call::CreateProject { .. })),
            0
        );
    }

    #[tokio::test]
    async fn test_bootstrap_requires_credential() {
        let gate = Arc::new(CredentialGate::new());
        let engine = Engine::new(
            EngineConfig::for_testing(),
            Arc::new(FakeRemote::new()),
            gate,
            Arc::new(MemorySurface::new()),
        );
        assert_eq!(engine.bootstrap().await, Err(SyncError::Auth));
    }
}
