use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{Appointment, BookAppointmentRequest, UpdateAppointmentRequest};
use crate::state::AppState;

// POST /appointments
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let ctx = state.request_context();
    let mut db = state.conn();
    let appointment = state.scheduling.book_appointment(&mut db, &ctx, &req)?;
    Ok(Json(appointment))
}

// GET /appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.conn();
    Ok(Json(state.scheduling.list_appointments(&db)?))
}

// GET /appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Appointment>, AppError> {
    let db = state.conn();
    Ok(Json(state.scheduling.get_appointment(&db, id)?))
}

// PATCH /appointments/:id
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let ctx = state.request_context();
    let mut db = state.conn();
    let appointment = state
        .scheduling
        .reschedule_appointment(&mut db, &ctx, id, &req)?;
    Ok(Json(appointment))
}

// DELETE /appointments/:id
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Appointment>, AppError> {
    let ctx = state.request_context();
    let mut db = state.conn();
    Ok(Json(state.scheduling.cancel_appointment(&mut db, &ctx, id)?))
}

// DELETE /appointments/:id/purge
pub async fn purge_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let ctx = state.request_context();
    let mut db = state.conn();
    state.scheduling.purge_appointment(&mut db, &ctx, id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /appointments/patients/:id
pub async fn list_patient_appointments(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let db = state.conn();
    Ok(Json(
        state.scheduling.list_patient_appointments(&db, patient_id)?,
    ))
}
