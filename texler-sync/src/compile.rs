//! Compile orchestrator and its debounced trigger.
//!
//! ```text
//! version bump ─► CompileTrigger ─(quiet window)─► snapshot ─► POST /compile
//!                                                               │
//!            ┌──────────────────────────────────────────────────┤
//!            ▼                    ▼                             ▼
//!      hex ─► Artifact      parsedErrors ─► Failed        no response ─► Unreachable
//!            │
//!            ▼
//!      PreviewHandle (replaces and releases the previous one)
//! ```
//!
//! The orchestrator owns at most one [`PreviewHandle`]. A failed compile
//! leaves it in place; only a new rendered artifact replaces it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use texler_core::{Artifact, CompilationSnapshot};
use tokio::task::JoinHandle;

use crate::error::{ApiError, CompileError};
use crate::preview::{PreviewHandle, PreviewId, PreviewSurface};
use crate::remote::{CompileResponse, RemoteApi};

const INVALID_ENCODING: &str = "invalid artifact encoding";

/// What the current preview shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub preview_id: PreviewId,
    /// Decoded size in bytes
    pub len: usize,
    pub main_file: String,
}

/// Result of one compile request.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Rendered(ArtifactInfo),
    /// The typesetting service answered with a failure
    Failed(CompileError),
    /// No interpretable response
    Unreachable(String),
    /// No main path, or the main path is not a file of the project
    NotCompilable,
    /// 401; the session is ending
    Unauthorized,
    /// Superseded by a newer compile or a project switch
    Stale,
}

impl CompileOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, CompileOutcome::Rendered(_))
    }
}

pub struct CompileOrchestrator {
    remote: Arc<dyn RemoteApi>,
    surface: Arc<dyn PreviewSurface>,
    current: Mutex<Option<(PreviewHandle, ArtifactInfo)>>,
    /// Ticket of the most recently issued request
    latest: AtomicU64,
}

impl CompileOrchestrator {
    pub fn new(remote: Arc<dyn RemoteApi>, surface: Arc<dyn PreviewSurface>) -> Self {
        Self {
            remote,
            surface,
            current: Mutex::new(None),
            latest: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(PreviewHandle, ArtifactInfo)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn compile(&self, snapshot: &CompilationSnapshot) -> CompileOutcome {
        self.compile_checked(snapshot, || true).await
    }

    /// Compile `snapshot`; the response is applied only if `still_current`
    /// holds when it arrives and no newer request was issued meanwhile.
    pub async fn compile_checked(
        &self,
        snapshot: &CompilationSnapshot,
        still_current: impl FnOnce() -> bool,
    ) -> CompileOutcome {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "Compiling {} ({} files, {} bytes)",
            snapshot.main_file,
            snapshot.files.len(),
            snapshot.content_len()
        );

        let result = self.remote.compile(snapshot).await;

        if self.latest.load(Ordering::SeqCst) != ticket || !still_current() {
            log::debug!("Discarding stale compile result for {}", snapshot.main_file);
            return CompileOutcome::Stale;
        }
        let outcome = self.resolve(&snapshot.main_file, result);
        match &outcome {
            CompileOutcome::Rendered(info) => {
                log::info!("Rendered {} ({} bytes)", info.main_file, info.len)
            }
            CompileOutcome::Failed(e) => log::warn!("Compile failed: {e}"),
            CompileOutcome::Unreachable(e) => log::warn!("Compile service unreachable: {e}"),
            _ => {}
        }
        outcome
    }

    fn resolve(
        &self,
        main_file: &str,
        result: Result<CompileResponse, ApiError>,
    ) -> CompileOutcome {
        match result {
            Ok(response) => match response.artifact_hex() {
                Some(encoded) => match Artifact::from_hex(encoded) {
                    Ok(artifact) => self.install(main_file, &artifact),
                    Err(e) => {
                        log::debug!("Undecodable artifact: {e}");
                        CompileOutcome::Failed(CompileError::new(INVALID_ENCODING))
                    }
                },
                None => CompileOutcome::Failed(response.failure()),
            },
            Err(ApiError::Unauthorized) => CompileOutcome::Unauthorized,
            Err(ApiError::Connectivity(message)) => CompileOutcome::Unreachable(message),
            Err(ApiError::Status { message, .. }) => {
                CompileOutcome::Failed(CompileError::new(message))
            }
            Err(ApiError::Decode(message)) => CompileOutcome::Failed(CompileError::new(
                format!("unreadable compile response: {message}"),
            )),
        }
    }

    /// Present `artifact`, then release the handle it replaces.
    fn install(&self, main_file: &str, artifact: &Artifact) -> CompileOutcome {
        let handle = match PreviewHandle::present(self.surface.clone(), artifact) {
            Ok(handle) => handle,
            Err(e) => {
                return CompileOutcome::Failed(CompileError::new(format!(
                    "preview unavailable: {e}"
                )))
            }
        };
        let info = ArtifactInfo {
            preview_id: handle.id(),
            len: handle.len(),
            main_file: main_file.to_string(),
        };
        let previous = self.lock().replace((handle, info.clone()));
        drop(previous);
        CompileOutcome::Rendered(info)
    }

    /// The artifact currently shown, if any.
    pub fn current(&self) -> Option<ArtifactInfo> {
        self.lock().as_ref().map(|(_, info)| info.clone())
    }

    /// Release the current preview and invalidate requests in flight.
    pub fn release(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        let previous = self.lock().take();
        drop(previous);
    }
}

/// Debounced compile trigger.
///
/// Each notification restarts the quiet window; when it elapses the job is
/// started detached, so a later notification cannot cut a request short.
pub struct CompileTrigger {
    window: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl CompileTrigger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timer: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notify<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            tokio::spawn(job);
        });
        if let Some(previous) = self.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Drop the pending notification, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.lock().take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for CompileTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}
