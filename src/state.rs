use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::{ServiceCatalog, SqliteServiceCatalog};
use crate::services::catalog::CatalogService;
use crate::services::context::RequestContext;
use crate::services::scheduling::SchedulingService;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub scheduling: SchedulingService,
    pub catalog: CatalogService,
}

impl AppState {
    /// Builds the service graph on top of the SQLite stores.
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let catalog: Arc<dyn ServiceCatalog> = Arc::new(SqliteServiceCatalog::new());
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            scheduling: SchedulingService::sqlite(catalog.clone()),
            catalog: CatalogService::new(catalog),
        }
    }

    /// Locks the shared connection. A panic while the lock was held drops
    /// any open `Transaction`, which rolls it back, so a poisoned guard is
    /// still safe to hand out.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("database lock was poisoned by a panicked request, recovering");
            self.db.clear_poison();
            poisoned.into_inner()
        })
    }

    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(Duration::from_millis(self.config.request_timeout_ms))
    }
}
