use rusqlite::{params, Connection};

use super::read_ts;
use super::store::ServiceCatalog;
use crate::errors::AppResult;
use crate::models::{CreateServiceRequest, ServiceInfo};

const SERVICE_COLUMNS: &str =
    "id, name, description, category, duration_minutes, price, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteServiceCatalog;

impl SqliteServiceCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceCatalog for SqliteServiceCatalog {
    fn find(&self, conn: &Connection, service_id: i64) -> AppResult<Option<ServiceInfo>> {
        let result = conn.query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1"),
            params![service_id],
            parse_service_row,
        );

        match result {
            Ok(service) => Ok(Some(service)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, conn: &Connection) -> AppResult<Vec<ServiceInfo>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services ORDER BY name ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], parse_service_row)?;

        let mut services = vec![];
        for row in rows {
            services.push(row?);
        }
        Ok(services)
    }

    fn create(&self, conn: &Connection, service: &CreateServiceRequest) -> AppResult<ServiceInfo> {
        let created = conn.query_row(
            &format!(
                "INSERT INTO services (name, description, category, duration_minutes, price)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {SERVICE_COLUMNS}"
            ),
            params![
                service.name,
                service.description,
                service.category,
                service.duration_minutes,
                service.price,
            ],
            parse_service_row,
        )?;
        Ok(created)
    }
}

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<ServiceInfo> {
    Ok(ServiceInfo {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        duration_minutes: row.get(4)?,
        price: row.get(5)?,
        created_at: read_ts(row, 6)?,
        updated_at: read_ts(row, 7)?,
    })
}
