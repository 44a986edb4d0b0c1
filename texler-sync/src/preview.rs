//! Preview surfaces and the scoped display handle.
//!
//! A [`PreviewSurface`] turns a rendered artifact into something a user can
//! look at (a blob URL, a file on disk, a buffer in memory) and frees it
//! again. [`PreviewHandle`] owns one presented artifact and releases it on
//! drop, so replacing or tearing down the handle can never leak the
//! surface's resource.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use texler_core::Artifact;
use thiserror::Error;

/// Identifier a surface assigns to a presented artifact.
pub type PreviewId = u64;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preview rejected: {0}")]
    Rejected(String),
}

pub trait PreviewSurface: Send + Sync {
    /// Make `artifact` viewable and return its id.
    fn present(&self, artifact: &Artifact) -> Result<PreviewId, PreviewError>;

    /// Free whatever `present` allocated for `id`.
    fn release(&self, id: PreviewId);
}

/// Exclusive owner of one presented artifact.
pub struct PreviewHandle {
    id: PreviewId,
    len: usize,
    surface: Arc<dyn PreviewSurface>,
}

impl PreviewHandle {
    pub fn present(
        surface: Arc<dyn PreviewSurface>,
        artifact: &Artifact,
    ) -> Result<Self, PreviewError> {
        let id = surface.present(artifact)?;
        Ok(Self {
            id,
            len: artifact.len(),
            surface,
        })
    }

    pub fn id(&self) -> PreviewId {
        self.id
    }

    /// Size of the presented artifact in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.surface.release(self.id);
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish()
    }
}

/// In-process surface that keeps presented artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySurface {
    next_id: AtomicU64,
    live: Mutex<BTreeMap<PreviewId, Vec<u8>>>,
    released: AtomicU64,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of artifacts presented and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn bytes(&self, id: PreviewId) -> Option<Vec<u8>> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl PreviewSurface for MemorySurface {
    fn present(&self, artifact: &Artifact) -> Result<PreviewId, PreviewError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, artifact.bytes().to_vec());
        Ok(id)
    }

    fn release(&self, id: PreviewId) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> Artifact {
        Artifact::new(b"%PDF-1.7".to_vec())
    }

    #[test]
    fn test_handle_releases_on_drop() {
        let surface = Arc::new(MemorySurface::new());
        let handle = PreviewHandle::present(surface.clone(), &pdf()).unwrap();
        assert_eq!(surface.live_count(), 1);
        assert_eq!(surface.bytes(handle.id()).as_deref(), Some(&b"%PDF-1.7"[..]));

        drop(handle);
        assert_eq!(surface.live_count(), 0);
        assert_eq!(surface.released_count(), 1);
    }

    #[test]
    fn test_replacement_keeps_one_live() {
        let surface = Arc::new(MemorySurface::new());
        let mut current: Option<PreviewHandle> = None;
        for _ in 0..5 {
            let next = PreviewHandle::present(surface.clone(), &pdf()).unwrap();
            current = Some(next);
            assert_eq!(surface.live_count(), 1);
        }
        assert_eq!(surface.released_count(), 4);
        drop(current);
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_rejecting_surface() {
        struct Refuse;
        impl PreviewSurface for Refuse {
            fn present(&self, _: &Artifact) -> Result<PreviewId, PreviewError> {
                Err(PreviewError::Rejected("no display".into()))
            }
            fn release(&self, _: PreviewId) {}
        }

        let err = PreviewHandle::present(Arc::new(Refuse), &pdf()).unwrap_err();
        assert_eq!(err.to_string(), "Preview rejected: no display");
    }
}
