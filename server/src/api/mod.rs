pub mod rest;

use crate::config::Config;
use crate::db::DbPool;
use crate::mailer::Mailer;
use crate::storage::DiskStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Opaque object store for uploaded file content
    pub store: Arc<DiskStore>,
    /// Absent when no SMTP relay is configured
    pub mailer: Option<Arc<Mailer>>,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DbPool, store: DiskStore, mailer: Option<Mailer>, config: Config) -> Self {
        Self {
            db,
            store: Arc::new(store),
            mailer: mailer.map(Arc::new),
            config,
        }
    }
}
