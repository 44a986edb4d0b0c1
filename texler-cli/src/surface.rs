//! Preview surface backed by files in a scratch directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use texler_core::Artifact;
use texler_sync::{PreviewError, PreviewId, PreviewSurface};

pub struct FileSurface {
    dir: PathBuf,
    next_id: AtomicU64,
}

impl FileSurface {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next_id: AtomicU64::new(0),
        })
    }

    /// Scratch directory under the system temp dir, unique to this process.
    pub fn in_temp_dir() -> std::io::Result<Self> {
        Self::new(std::env::temp_dir().join(format!("texler-preview-{}", std::process::id())))
    }

    pub fn path_for(&self, id: PreviewId) -> PathBuf {
        self.dir.join(format!("preview-{id}.pdf"))
    }
}

impl PreviewSurface for FileSurface {
    fn present(&self, artifact: &Artifact) -> Result<PreviewId, PreviewError> {
        if !artifact.is_pdf() {
            log::warn!("Rendered artifact has no PDF signature");
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        std::fs::write(self.path_for(id), artifact.bytes())?;
        Ok(id)
    }

    fn release(&self, id: PreviewId) {
        let path = self.path_for(id);
        if let Err(e) = std::fs::remove_file(&path) {
            log::debug!("Failed to remove {}: {e}", path.display());
        }
    }
}

impl Drop for FileSurface {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir(&self.dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_present_writes_and_release_removes() {
        let dir = tempdir().unwrap();
        let surface = FileSurface::new(dir.path().join("previews")).unwrap();
        let artifact = Artifact::new(b"%PDF-1.5 body".to_vec());

        let id = surface.present(&artifact).unwrap();
        let path = surface.path_for(id);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 body");

        surface.release(id);
        assert!(!path.exists());
    }

    #[test]
    fn test_ids_are_distinct() {
        let dir = tempdir().unwrap();
        let surface = FileSurface::new(dir.path()).unwrap();
        let artifact = Artifact::new(b"%PDF".to_vec());

        let first = surface.present(&artifact).unwrap();
        let second = surface.present(&artifact).unwrap();
        assert_ne!(first, second);
        assert!(surface.path_for(first).exists());
        assert!(surface.path_for(second).exists());
    }
}
