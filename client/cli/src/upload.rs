//! Batched upload orchestration.
//!
//! Files in a batch are sent strictly sequentially: the next file is not
//! submitted until the previous response has been observed. A per-file
//! network or server failure is counted and the batch continues; an auth
//! failure aborts the batch so the command layer can clear credentials.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::PathBuf;

use crate::api::{ApiClient, ApiError};
use crate::registry::RegistryCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    AllSucceeded,
    AllFailed,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl UploadReport {
    pub fn outcome(&self) -> BatchOutcome {
        if self.failed == 0 {
            BatchOutcome::AllSucceeded
        } else if self.succeeded == 0 {
            BatchOutcome::AllFailed
        } else {
            BatchOutcome::Partial
        }
    }

    pub fn message(&self) -> String {
        match self.outcome() {
            BatchOutcome::AllSucceeded => {
                format!("Successfully uploaded all {} file(s)!", self.succeeded)
            }
            BatchOutcome::AllFailed => "Failed to upload any files.".to_string(),
            BatchOutcome::Partial => format!(
                "Uploaded {} of {} file(s). {} failed.",
                self.succeeded, self.total, self.failed
            ),
        }
    }
}

/// What the batch left behind besides the report.
pub struct BatchResult {
    pub report: UploadReport,
    /// Total storage used after the batch, when the quota fetch succeeded.
    pub storage_used: Option<u64>,
}

/// Drive one batch through `upload_one`, counting per-file outcomes.
///
/// Per-file failures never abort the batch; `ApiError::Auth` does.
pub async fn run_batch<F, Fut>(
    files: &[PathBuf],
    mut upload_one: F,
    mut progress: impl FnMut(usize, usize, &PathBuf),
) -> Result<UploadReport, ApiError>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), ApiError>>,
{
    let total = files.len();
    let mut succeeded = 0;
    let mut failed = 0;

    for (index, path) in files.iter().enumerate() {
        progress(index + 1, total, path);
        match upload_one(path.clone()).await {
            Ok(()) => succeeded += 1,
            Err(ApiError::Auth(msg)) => return Err(ApiError::Auth(msg)),
            Err(err) => {
                failed += 1;
                tracing::warn!("failed to upload {}: {}", path.display(), err);
            }
        }
    }

    Ok(UploadReport {
        total,
        succeeded,
        failed,
    })
}

/// Submit a batch of files, then refresh the registry and the storage
/// quota exactly once, whatever the mix of per-file outcomes was.
pub async fn submit(
    api: &ApiClient,
    registry: &mut RegistryCache,
    files: &[PathBuf],
) -> Result<BatchResult, ApiError> {
    if files.is_empty() {
        return Err(ApiError::Validation(
            "Please select at least one file to upload.".into(),
        ));
    }

    let bar = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("[{pos}/{len}] {msg}") {
        bar.set_style(style);
    }

    let report = run_batch(
        files,
        |path| async move { api.upload_file(&path).await },
        |index, _total, path| {
            bar.set_position(index as u64 - 1);
            bar.set_message(format!("uploading {}", path.display()));
        },
    )
    .await?;
    bar.finish_and_clear();

    // One refresh and one quota fetch per batch, not per file; both run
    // whatever the mix of per-file outcomes was. A non-auth refresh failure
    // is already reflected in the cache state, so the report still reaches
    // the user.
    match registry.refresh(api).await {
        Ok(()) => {}
        Err(ApiError::Auth(msg)) => return Err(ApiError::Auth(msg)),
        Err(err) => {
            tracing::warn!("file list refresh failed after upload: {}", err);
        }
    }
    let storage_used = match api.storage_usage().await {
        Ok(bytes) => Some(bytes),
        Err(ApiError::Auth(msg)) => return Err(ApiError::Auth(msg)),
        Err(err) => {
            tracing::warn!("storage usage fetch failed: {}", err);
            None
        }
    };

    Ok(BatchResult {
        report,
        storage_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn counts_partial_batch_and_keeps_going() {
        let files = paths(&["a.txt", "b.txt", "c.txt"]);
        let attempted = RefCell::new(Vec::new());

        let report = run_batch(
            &files,
            |path| {
                attempted.borrow_mut().push(path.clone());
                async move {
                    if path.ends_with("b.txt") {
                        Err(ApiError::Server {
                            status: 500,
                            message: "disk full".into(),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
            |_, _, _| {},
        )
        .await
        .unwrap();

        // The failure of file 2 must not stop file 3.
        assert_eq!(attempted.borrow().len(), 3);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcome(), BatchOutcome::Partial);
        assert_eq!(report.message(), "Uploaded 2 of 3 file(s). 1 failed.");
    }

    #[tokio::test]
    async fn uploads_are_strictly_sequential() {
        let files = paths(&["a.txt", "b.txt", "c.txt"]);
        let order = RefCell::new(Vec::new());

        run_batch(
            &files,
            |path| {
                order.borrow_mut().push(path.clone());
                async { Ok(()) }
            },
            |_, _, _| {},
        )
        .await
        .unwrap();

        assert_eq!(*order.borrow(), files);
    }

    #[tokio::test]
    async fn auth_failure_short_circuits() {
        let files = paths(&["a.txt", "b.txt", "c.txt"]);
        let attempted = RefCell::new(0usize);

        let result = run_batch(
            &files,
            |path| {
                *attempted.borrow_mut() += 1;
                async move {
                    if path.ends_with("b.txt") {
                        Err(ApiError::Auth("session expired".into()))
                    } else {
                        Ok(())
                    }
                }
            },
            |_, _, _| {},
        )
        .await;

        assert!(matches!(result, Err(ApiError::Auth(_))));
        // c.txt was never attempted.
        assert_eq!(*attempted.borrow(), 2);
    }

    #[tokio::test]
    async fn all_outcomes_have_exact_messages() {
        let ok = UploadReport {
            total: 2,
            succeeded: 2,
            failed: 0,
        };
        assert_eq!(ok.outcome(), BatchOutcome::AllSucceeded);
        assert_eq!(ok.message(), "Successfully uploaded all 2 file(s)!");

        let bad = UploadReport {
            total: 2,
            succeeded: 0,
            failed: 2,
        };
        assert_eq!(bad.outcome(), BatchOutcome::AllFailed);
        assert_eq!(bad.message(), "Failed to upload any files.");
    }

    #[tokio::test]
    async fn empty_batch_is_a_validation_error_without_network() {
        let api = ApiClient::new("http://localhost:1", None).unwrap();
        let mut registry = RegistryCache::new();

        let result = submit(&api, &mut registry, &[]).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        // The registry was never touched: no refresh was triggered.
        assert_eq!(*registry.state(), crate::registry::LoadState::NotLoaded);
    }
}
