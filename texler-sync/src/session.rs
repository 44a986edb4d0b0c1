//! Shared engine context handed to background tasks.
//!
//! Holds the project store, the generation counter and the event sender.
//! Every async continuation captures the generation it was issued under and
//! checks [`Session::is_current`] before touching the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use texler_core::{ProjectId, ProjectState, WorkspaceId};

use crate::compile::CompileOutcome;
use crate::error::SyncError;
use crate::remote::RemoteApi;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The store was replaced from the remote catalog
    Hydrated {
        workspace_id: WorkspaceId,
        project_id: Option<ProjectId>,
    },
    /// A save landed and matched the local content at the time it was sent
    Saved { path: String },
    /// A save failed; the record stays modified until the next edit or flush
    SaveFailed { path: String, error: SyncError },
    Compiled(CompileOutcome),
    /// The credential was invalidated and the session torn down
    SignedOut,
}

/// Remote identity a write addresses, plus the generation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTarget {
    pub workspace_id: WorkspaceId,
    pub project_id: ProjectId,
    pub generation: u64,
}

pub struct Session {
    remote: Arc<dyn RemoteApi>,
    store: Mutex<ProjectState>,
    /// Incremented on every project switch and sign-out
    generation: AtomicU64,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Session {
    pub fn new(remote: Arc<dyn RemoteApi>, event_tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            remote,
            store: Mutex::new(ProjectState::new()),
            generation: AtomicU64::new(0),
            event_tx,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.remote
    }

    /// Run `f` against the store. Mutations are atomic to every observer.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut ProjectState) -> R) -> R {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    pub fn snapshot_state(&self) -> ProjectState {
        self.with_store(|store| store.clone())
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new generation; results issued under older ones are stale.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Target for writes against the selected project, if any.
    pub fn write_target(&self) -> Option<WriteTarget> {
        let generation = self.generation();
        self.with_store(|store| {
            Some(WriteTarget {
                workspace_id: store.workspace_id()?,
                project_id: store.project_id()?,
                generation,
            })
        })
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            log::debug!("Dropping engine event: {e}");
        }
    }
}
