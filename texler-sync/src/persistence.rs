//! Persistence scheduler: per-path debounced writer.
//!
//! ```text
//! schedule(a, c1) ──┐
//! schedule(a, c2) ──┼─ restart a's timer ──► (quiet window) ──► PUT a = c3
//! schedule(a, c3) ──┘
//! schedule(b, d1) ───── b's own timer ─────► (quiet window) ──► PUT b = d1
//! ```
//!
//! Each path owns at most one pending save and at most one write in
//! flight. A save whose window closes while the previous write of the same
//! path is still running waits for it, so the server never ends up holding
//! older content than the last acknowledged write. Paths are independent:
//! their writes may be in flight together and complete in any order. A failed
//! write marks the record `Failed` and is not retried until the next edit
//! or an explicit flush.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Mutex as WriteLock;
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::session::{EngineEvent, Session, WriteTarget};

struct PendingSave {
    /// Distinguishes this timer from a later reschedule of the same path
    seq: u64,
    target: WriteTarget,
    content: String,
    timer: JoinHandle<()>,
}

/// A write taken out of the timer table, ready to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub target: WriteTarget,
    pub path: String,
    pub content: String,
}

#[derive(Clone)]
pub struct PersistenceScheduler {
    session: Arc<Session>,
    window: Duration,
    pending: Arc<Mutex<HashMap<String, PendingSave>>>,
    /// One lock per path; held for the duration of that path's write
    writing: Arc<Mutex<HashMap<String, Arc<WriteLock<()>>>>>,
    seq: Arc<AtomicU64>,
}

impl PersistenceScheduler {
    pub fn new(session: Arc<Session>, window: Duration) -> Self {
        Self {
            session,
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            writing: Arc::new(Mutex::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingSave>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self, path: &str) -> Arc<WriteLock<()>> {
        self.writing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    /// Write `content` once every earlier write of `path` has completed.
    async fn write(
        &self,
        target: WriteTarget,
        path: String,
        content: String,
    ) -> Result<(), SyncError> {
        let lock = self.write_lock(&path);
        let _turn = lock.lock().await;
        write_file(&self.session, target, path, content).await
    }

    /// Restart `path`'s quiet window with `content` as the value to send.
    pub fn schedule(&self, target: WriteTarget, path: &str, content: &str) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.lock();
        if let Some(previous) = pending.remove(path) {
            previous.timer.abort();
        }

        let scheduler = self.clone();
        let key = path.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(scheduler.window).await;
            scheduler.expire(&key, seq).await;
        });

        pending.insert(
            path.to_string(),
            PendingSave {
                seq,
                target,
                content: content.to_string(),
                timer,
            },
        );
    }

    async fn expire(&self, path: &str, seq: u64) {
        // Leave the table before writing so a reschedule cannot abort the
        // write in flight.
        let save = {
            let mut pending = self.lock();
            match pending.get(path) {
                Some(save) if save.seq == seq => pending.remove(path),
                _ => None,
            }
        };
        if let Some(save) = save {
            let _ = self.write(save.target, path.to_string(), save.content).await;
        }
    }

    /// Cancel `path`'s timer and write `content` now.
    pub async fn flush(
        &self,
        target: WriteTarget,
        path: &str,
        content: &str,
    ) -> Result<(), SyncError> {
        if let Some(previous) = self.lock().remove(path) {
            previous.timer.abort();
        }
        self.write(target, path.to_string(), content.to_string()).await
    }

    /// Take every pending save out of the table, cancelling its timer.
    pub fn drain(&self) -> Vec<PendingWrite> {
        let mut writes: Vec<PendingWrite> = self
            .lock()
            .drain()
            .map(|(path, save)| {
                save.timer.abort();
                PendingWrite {
                    target: save.target,
                    path,
                    content: save.content,
                }
            })
            .collect();
        writes.sort_by(|a, b| a.path.cmp(&b.path));
        writes
    }

    /// Issue `writes` concurrently and wait for all of them.
    pub async fn write_all(&self, writes: Vec<PendingWrite>) -> Vec<Result<(), SyncError>> {
        join_all(
            writes
                .into_iter()
                .map(|w| self.write(w.target, w.path, w.content)),
        )
        .await
    }

    /// Write every pending path now.
    pub async fn flush_all(&self) -> Vec<Result<(), SyncError>> {
        let writes = self.drain();
        self.write_all(writes).await
    }

    /// Drop every pending save without writing.
    pub fn cancel_all(&self) {
        let mut pending = self.lock();
        let count = pending.len();
        for (_, save) in pending.drain() {
            save.timer.abort();
        }
        if count > 0 {
            log::debug!("Cancelled {count} pending saves");
        }
    }

    pub fn pending_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }
}

/// Issue one remote write and apply its result to the store, unless the
/// generation moved on while it was in flight.
async fn write_file(
    session: &Session,
    target: WriteTarget,
    path: String,
    content: String,
) -> Result<(), SyncError> {
    let result = session
        .remote()
        .update_file(target.workspace_id, target.project_id, &path, &content)
        .await;

    let result = result.map(|_| ()).map_err(|e| SyncError::Persistence {
        path: path.clone(),
        message: e.to_string(),
    });

    if !session.is_current(target.generation) {
        log::debug!("Discarding stale save result for {path}");
        return result;
    }

    match &result {
        Ok(()) => {
            log::debug!("Saved {path}");
            session.with_store(|store| store.mark_saved(&path, &content));
            session.emit(EngineEvent::Saved { path });
        }
        Err(error) => {
            log::warn!("{error}");
            session.with_store(|store| store.mark_save_failed(&path));
            session.emit(EngineEvent::SaveFailed {
                path,
                error: error.clone(),
            });
        }
    }
    result
}
