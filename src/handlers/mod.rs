pub mod appointments;
pub mod health;
pub mod schedules;
pub mod services;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{delete, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::book_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .patch(appointments::reschedule_appointment)
                .delete(appointments::cancel_appointment),
        )
        .route(
            "/appointments/:id/purge",
            delete(appointments::purge_appointment),
        )
        .route(
            "/appointments/patients/:id",
            get(appointments::list_patient_appointments),
        )
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/schedules/:id",
            get(schedules::get_schedule)
                .patch(schedules::update_schedule)
                .delete(schedules::delete_schedule),
        )
        .route(
            "/doctors/:id/schedules",
            get(schedules::list_doctor_schedules).delete(schedules::delete_doctor_schedules),
        )
        .route(
            "/doctors/:id/schedules/available",
            get(schedules::available_slots),
        )
        .route(
            "/services",
            get(services::list_services).post(services::create_service),
        )
        .route("/services/:id", get(services::get_service))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn check_auth(headers: &HeaderMap, expected_token: &str) -> AppResult<()> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
