use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object name: {0}")]
    InvalidName(String),
}

/// Opaque object storage with directory sharding.
///
/// Objects are addressed by their server-assigned stored name (a UUID in
/// simple hex form); file content is never interpreted here.
pub struct DiskStore {
    base_path: PathBuf,
}

impl DiskStore {
    /// Create a new store at the given path
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Get the storage path for an object (sharded by first 2 chars)
    fn object_path(&self, stored_name: &str) -> Result<PathBuf, StoreError> {
        if stored_name.len() < 4 || !stored_name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::InvalidName(stored_name.to_string()));
        }
        let shard = &stored_name[..2];
        Ok(self.base_path.join(shard).join(stored_name))
    }

    /// Check if an object exists
    #[allow(dead_code)]
    pub fn exists(&self, stored_name: &str) -> Result<bool, StoreError> {
        let path = self.object_path(stored_name)?;
        Ok(path.exists())
    }

    /// Write an object to storage
    pub fn write(&self, stored_name: &str, content: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(stored_name)?;

        // Create shard directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
        }

        // Rename to final path (atomic on most filesystems)
        fs::rename(&temp_path, &path)?;

        tracing::debug!("Wrote object {} ({} bytes)", stored_name, content.len());
        Ok(())
    }

    /// Read an object from storage
    pub fn read(&self, stored_name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(stored_name)?;

        if !path.exists() {
            return Err(StoreError::NotFound(stored_name.to_string()));
        }

        let mut file = File::open(&path)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        tracing::debug!("Read object {} ({} bytes)", stored_name, content.len());
        Ok(content)
    }

    /// Delete an object from storage
    pub fn delete(&self, stored_name: &str) -> Result<(), StoreError> {
        let path = self.object_path(stored_name)?;

        if path.exists() {
            fs::remove_file(&path)?;
            tracing::debug!("Deleted object {}", stored_name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disk_store_roundtrip() {
        let temp = tempdir().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();

        let name = "9f86d081884c7d659a2feaa0c55ad015";
        let content = b"hello world";

        // Initially doesn't exist
        assert!(!store.exists(name).unwrap());

        // Write object
        store.write(name, content).unwrap();
        assert!(store.exists(name).unwrap());

        // Read object
        let read_content = store.read(name).unwrap();
        assert_eq!(read_content, content);

        // Delete object
        store.delete(name).unwrap();
        assert!(!store.exists(name).unwrap());
    }

    #[test]
    fn test_rejects_traversal_names() {
        let temp = tempdir().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();

        assert!(matches!(
            store.read("../../etc/passwd"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(store.read("ab"), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let temp = tempdir().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();

        assert!(matches!(
            store.read("feedfacefeedfacefeedfacefeedface"),
            Err(StoreError::NotFound(_))
        ));
    }
}
