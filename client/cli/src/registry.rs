//! In-memory registry of the user's backed-up files.
//!
//! The cache is the single writer of the snapshot; readers get a shared
//! slice. Every refresh is stamped with a generation token and a completion
//! carrying a stale token is discarded, so an old response can never
//! clobber a newer snapshot.

use crate::api::{ApiClient, ApiError};
use crate::filter::{FileRecord, FilterCriteria};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No fetch has completed yet this session.
    NotLoaded,
    /// Last refresh succeeded; the snapshot may legitimately be empty.
    Loaded,
    /// Last refresh failed; the snapshot was cleared and the cache is
    /// retryable.
    Failed(String),
}

pub struct RegistryCache {
    snapshot: Vec<FileRecord>,
    state: LoadState,
    generation: u64,
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryCache {
    pub fn new() -> Self {
        Self {
            snapshot: Vec::new(),
            state: LoadState::NotLoaded,
            generation: 0,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn snapshot(&self) -> &[FileRecord] {
        &self.snapshot
    }

    /// Apply filter criteria over the current snapshot, preserving server
    /// order.
    pub fn query<'a>(&'a self, criteria: &FilterCriteria) -> Vec<&'a FileRecord> {
        criteria.apply(&self.snapshot)
    }

    /// Fetch the file list and replace the snapshot wholesale.
    ///
    /// On failure the snapshot is cleared and the error is returned for
    /// display; the cache stays usable for a retry.
    pub async fn refresh(&mut self, api: &ApiClient) -> Result<(), ApiError> {
        let token = self.begin_refresh();
        match api.list_files().await {
            Ok(files) => {
                self.complete_refresh(token, files);
                Ok(())
            }
            Err(err) => {
                self.fail_refresh(token, &err);
                Err(err)
            }
        }
    }

    /// Start a refresh attempt and get its generation token.
    pub fn begin_refresh(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Install a snapshot fetched under `token`. Returns false if a newer
    /// refresh has started since, in which case the result is discarded.
    pub fn complete_refresh(&mut self, token: u64, files: Vec<FileRecord>) -> bool {
        if token != self.generation {
            tracing::debug!(token, current = self.generation, "discarding stale refresh");
            return false;
        }
        self.snapshot = files;
        self.state = LoadState::Loaded;
        true
    }

    /// Record a failed refresh attempt under `token`.
    pub fn fail_refresh(&mut self, token: u64, err: &ApiError) -> bool {
        if token != self.generation {
            tracing::debug!(token, current = self.generation, "discarding stale failure");
            return false;
        }
        self.snapshot.clear();
        self.state = LoadState::Failed(err.to_string());
        true
    }

    /// Resolve a user-supplied reference: exact id first, then a unique
    /// display-name match.
    pub fn find(&self, reference: &str) -> Result<&FileRecord, ApiError> {
        if let Some(rec) = self.snapshot.iter().find(|f| f.id == reference) {
            return Ok(rec);
        }
        let by_name: Vec<&FileRecord> = self
            .snapshot
            .iter()
            .filter(|f| f.name == reference)
            .collect();
        match by_name.as_slice() {
            [] => Err(ApiError::Validation(format!(
                "no backed-up file matches '{}'",
                reference
            ))),
            [only] => Ok(only),
            _ => Err(ApiError::Validation(format!(
                "'{}' matches {} files; use the file id instead",
                reference,
                by_name.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, name: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            size_bytes: 1,
            mime_type: String::new(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn starts_not_loaded() {
        let cache = RegistryCache::new();
        assert_eq!(*cache.state(), LoadState::NotLoaded);
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut cache = RegistryCache::new();
        let first = cache.begin_refresh();
        let second = cache.begin_refresh();

        // The newer refresh lands first.
        assert!(cache.complete_refresh(second, vec![record("a", "a.txt")]));
        // The older one arrives late and must not replace it.
        assert!(!cache.complete_refresh(first, vec![record("b", "b.txt")]));

        assert_eq!(cache.snapshot().len(), 1);
        assert_eq!(cache.snapshot()[0].id, "a");
    }

    #[test]
    fn failure_clears_snapshot_but_stays_retryable() {
        let mut cache = RegistryCache::new();
        let token = cache.begin_refresh();
        cache.complete_refresh(token, vec![record("a", "a.txt")]);

        let token = cache.begin_refresh();
        let err = ApiError::Server {
            status: 500,
            message: "boom".into(),
        };
        assert!(cache.fail_refresh(token, &err));
        assert!(cache.snapshot().is_empty());
        assert!(matches!(cache.state(), LoadState::Failed(_)));

        // A later successful refresh recovers.
        let token = cache.begin_refresh();
        cache.complete_refresh(token, vec![record("c", "c.txt")]);
        assert_eq!(*cache.state(), LoadState::Loaded);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn stale_failure_does_not_clobber_newer_snapshot() {
        let mut cache = RegistryCache::new();
        let old = cache.begin_refresh();
        let new = cache.begin_refresh();
        cache.complete_refresh(new, vec![record("a", "a.txt")]);

        let err = ApiError::Server {
            status: 502,
            message: "late".into(),
        };
        assert!(!cache.fail_refresh(old, &err));
        assert_eq!(*cache.state(), LoadState::Loaded);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn find_prefers_id_then_unique_name() {
        let mut cache = RegistryCache::new();
        let token = cache.begin_refresh();
        cache.complete_refresh(
            token,
            vec![
                record("id-1", "notes.txt"),
                record("id-2", "dup.txt"),
                record("id-3", "dup.txt"),
            ],
        );

        assert_eq!(cache.find("id-1").unwrap().name, "notes.txt");
        assert_eq!(cache.find("notes.txt").unwrap().id, "id-1");
        assert!(cache.find("dup.txt").is_err());
        assert!(cache.find("missing").is_err());
    }
}
