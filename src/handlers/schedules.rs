use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{CreateScheduleRequest, ScheduleSlot, UpdateScheduleRequest};
use crate::state::AppState;

// POST /schedules
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<Json<ScheduleSlot>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut db = state.conn();
    Ok(Json(state.scheduling.create_schedule(&mut db, &req)?))
}

// GET /schedules
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScheduleSlot>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    Ok(Json(state.scheduling.list_schedules(&db)?))
}

// GET /schedules/:id
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ScheduleSlot>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    Ok(Json(state.scheduling.get_schedule(&db, id)?))
}

// PATCH /schedules/:id
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<Json<ScheduleSlot>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut db = state.conn();
    Ok(Json(state.scheduling.update_schedule(&mut db, id, &req)?))
}

// DELETE /schedules/:id
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    state.scheduling.delete_schedule(&db, id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /doctors/:id/schedules
pub async fn list_doctor_schedules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Vec<ScheduleSlot>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    Ok(Json(
        state.scheduling.list_schedules_for_doctor(&db, doctor_id)?,
    ))
}

// DELETE /doctors/:id/schedules
pub async fn delete_doctor_schedules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(doctor_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    let removed = state.scheduling.delete_doctor_schedules(&db, doctor_id)?;
    Ok(Json(serde_json::json!({"ok": true, "removed": removed})))
}

#[derive(Deserialize)]
pub struct AvailableQuery {
    pub week: Option<i64>,
}

// GET /doctors/:id/schedules/available?week=n
pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<i64>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<Vec<ScheduleSlot>>, AppError> {
    let ctx = state.request_context();
    let db = state.conn();
    let slots = state
        .scheduling
        .get_available_slots(&db, &ctx, doctor_id, query.week.unwrap_or(0))?;
    Ok(Json(slots))
}
