use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{CreateServiceRequest, ServiceInfo};
use crate::state::AppState;

// POST /services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateServiceRequest>,
) -> Result<Json<ServiceInfo>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    Ok(Json(state.catalog.create(&db, &req)?))
}

// GET /services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceInfo>>, AppError> {
    let db = state.conn();
    Ok(Json(state.catalog.list(&db)?))
}

// GET /services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ServiceInfo>, AppError> {
    let db = state.conn();
    Ok(Json(state.catalog.get(&db, id)?))
}
