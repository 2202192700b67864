//! Photo storage collaborator.
//!
//! The engine never looks inside a photo; it only needs somewhere to put the
//! bytes and a reference it can store on the complaint.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::BlobRef;

/// Opaque byte store for photos
pub trait BlobStore: Send + Sync {
    /// Store bytes and return a reference to them.
    fn put(&self, bytes: &[u8]) -> Result<BlobRef>;

    /// Fetch previously stored bytes.
    fn get(&self, reference: &BlobRef) -> Result<Vec<u8>>;

    /// Remove stored bytes. Deleting an unknown reference is not an error.
    fn delete(&self, reference: &BlobRef) -> Result<()>;
}

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// True when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        let key = format!("mem:{}", Uuid::new_v4());
        self.blobs
            .write()
            .map_err(|_| CoreError::StorageUnavailable("blob store lock poisoned".into()))?
            .insert(key.clone(), bytes.to_vec());
        Ok(BlobRef(key))
    }

    fn get(&self, reference: &BlobRef) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .map_err(|_| CoreError::StorageUnavailable("blob store lock poisoned".into()))?
            .get(&reference.0)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("photo {reference}")))
    }

    fn delete(&self, reference: &BlobRef) -> Result<()> {
        self.blobs
            .write()
            .map_err(|_| CoreError::StorageUnavailable("blob store lock poisoned".into()))?
            .remove(&reference.0);
        Ok(())
    }
}

/// Blob store backed by files in a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` for blob files, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, reference: &BlobRef) -> Result<PathBuf> {
        let name = reference
            .0
            .strip_prefix("fs:")
            .filter(|name| Uuid::parse_str(name).is_ok())
            .ok_or_else(|| CoreError::NotFound(format!("photo {reference}")))?;
        Ok(self.root.join(format!("{name}.bin")))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        let reference = BlobRef(format!("fs:{}", Uuid::new_v4()));
        let path = self.path_for(&reference)?;
        fs::write(&path, bytes).map_err(|e| {
            CoreError::StorageUnavailable(format!("writing {}: {e}", path.display()))
        })?;
        Ok(reference)
    }

    fn get(&self, reference: &BlobRef) -> Result<Vec<u8>> {
        let path = self.path_for(reference)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::NotFound(format!("photo {reference}")))
            }
            Err(e) => Err(CoreError::StorageUnavailable(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    fn delete(&self, reference: &BlobRef) -> Result<()> {
        let Ok(path) = self.path_for(reference) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(CoreError::StorageUnavailable(
                format!("removing {}: {e}", path.display()),
            )),
            _ => Ok(()),
        }
    }
}
