use std::sync::Arc;

use rusqlite::Connection;

use crate::db::ServiceCatalog;
use crate::errors::{AppError, AppResult};
use crate::models::{CreateServiceRequest, ServiceInfo};

/// No clinic service runs longer than a day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Thin wrapper over the service catalog for the HTTP surface.
pub struct CatalogService {
    catalog: Arc<dyn ServiceCatalog>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn ServiceCatalog>) -> Self {
        Self { catalog }
    }

    pub fn list(&self, conn: &Connection) -> AppResult<Vec<ServiceInfo>> {
        self.catalog.list(conn)
    }

    pub fn get(&self, conn: &Connection, id: i64) -> AppResult<ServiceInfo> {
        self.catalog
            .find(conn, id)?
            .ok_or(AppError::ServiceNotFound(id))
    }

    pub fn create(&self, conn: &Connection, req: &CreateServiceRequest) -> AppResult<ServiceInfo> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if req.duration_minutes <= 0 || req.duration_minutes > MAX_DURATION_MINUTES {
            return Err(AppError::validation(format!(
                "duration_minutes must be between 1 and {MAX_DURATION_MINUTES}"
            )));
        }
        if !req.price.is_finite() || req.price < 0.0 {
            return Err(AppError::validation("price must not be negative"));
        }

        let created = self.catalog.create(conn, req)?;
        tracing::info!(service_id = created.id, name = %created.name, "service created");
        Ok(created)
    }
}
