//! Scheduling facade: request validation, schedule management and the
//! read-side queries. Appointment writes are handed to the
//! [`BookingCoordinator`] once the request is known to be well formed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::{
    self, AppointmentStore, ScheduleStore, ServiceCatalog, SqliteAppointmentStore, SqliteScheduleStore,
    SqliteServiceCatalog,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Appointment, BookAppointmentRequest, CreateScheduleRequest, NewScheduleSlot, ScheduleSlot,
    UpdateAppointmentRequest, UpdateScheduleRequest,
};
use crate::services::booking::BookingCoordinator;
use crate::services::context::RequestContext;

const WINDOW_DAYS: i64 = 7;

pub struct SchedulingService {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
    coordinator: BookingCoordinator,
}

impl SchedulingService {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn ServiceCatalog>,
    ) -> Self {
        let coordinator =
            BookingCoordinator::new(schedules.clone(), appointments.clone(), catalog);
        Self {
            schedules,
            appointments,
            coordinator,
        }
    }

    /// Wires the SQLite stores together.
    pub fn sqlite(catalog: Arc<dyn ServiceCatalog>) -> Self {
        let schedules: Arc<dyn ScheduleStore> = Arc::new(SqliteScheduleStore::new());
        let appointments = Arc::new(SqliteAppointmentStore::new(schedules.clone()));
        Self::new(schedules, appointments, catalog)
    }

    // --- schedules ---

    pub fn create_schedule(
        &self,
        conn: &mut Connection,
        req: &CreateScheduleRequest,
    ) -> AppResult<ScheduleSlot> {
        let slot = NewScheduleSlot {
            doctor_id: req.doctor_id,
            calendar_date: req.calendar_date,
            start_time: req.start_time,
            end_time: req.end_time,
            room_number: req.room_number.trim().to_string(),
            is_available: req.is_available.unwrap_or(true),
        };
        validate_slot(&slot)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.reject_slot_overlap(&tx, &slot, None)?;
        let created = self.schedules.create(&tx, &slot)?;
        tx.commit()?;

        tracing::info!(
            slot_id = created.id,
            doctor_id = created.doctor_id,
            date = %created.calendar_date,
            "schedule slot created"
        );
        Ok(created)
    }

    pub fn get_schedule(&self, conn: &Connection, id: i64) -> AppResult<ScheduleSlot> {
        self.schedules
            .get_by_id(conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))
    }

    pub fn list_schedules(&self, conn: &Connection) -> AppResult<Vec<ScheduleSlot>> {
        self.schedules.list_all(conn)
    }

    pub fn list_schedules_for_doctor(
        &self,
        conn: &Connection,
        doctor_id: i64,
    ) -> AppResult<Vec<ScheduleSlot>> {
        require_positive("doctor_id", doctor_id)?;
        self.schedules.list_by_doctor(conn, doctor_id)
    }

    /// Only the fields present in `req` overwrite the stored slot; the merged
    /// slot is validated as if it were new.
    pub fn update_schedule(
        &self,
        conn: &mut Connection,
        id: i64,
        req: &UpdateScheduleRequest,
    ) -> AppResult<ScheduleSlot> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = self
            .schedules
            .get_by_id(&tx, id)?
            .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))?;

        let mut slot = existing.as_new();
        if let Some(doctor_id) = req.doctor_id {
            slot.doctor_id = doctor_id;
        }
        if let Some(date) = req.calendar_date {
            slot.calendar_date = date;
        }
        if let Some(start) = req.start_time {
            slot.start_time = start;
        }
        if let Some(end) = req.end_time {
            slot.end_time = end;
        }
        if let Some(room) = &req.room_number {
            slot.room_number = room.trim().to_string();
        }
        if let Some(available) = req.is_available {
            slot.is_available = available;
        }
        validate_slot(&slot)?;
        self.reject_slot_overlap(&tx, &slot, Some(id))?;

        let updated = self
            .schedules
            .update(&tx, id, &slot)?
            .ok_or_else(|| AppError::NotFound(format!("schedule {id}")))?;
        tx.commit()?;

        tracing::info!(slot_id = id, doctor_id = updated.doctor_id, "schedule slot updated");
        Ok(updated)
    }

    pub fn delete_schedule(&self, conn: &Connection, id: i64) -> AppResult<()> {
        if !self.schedules.delete(conn, id)? {
            return Err(AppError::NotFound(format!("schedule {id}")));
        }
        tracing::info!(slot_id = id, "schedule slot deleted");
        Ok(())
    }

    pub fn delete_doctor_schedules(&self, conn: &Connection, doctor_id: i64) -> AppResult<usize> {
        require_positive("doctor_id", doctor_id)?;
        let removed = self.schedules.delete_all_for_doctor(conn, doctor_id)?;
        tracing::info!(doctor_id, removed, "doctor schedules deleted");
        Ok(removed)
    }

    /// Available slots in the 7-day window starting at the beginning of the
    /// UTC day `week` weeks after `ctx.now`.
    pub fn get_available_slots(
        &self,
        conn: &Connection,
        ctx: &RequestContext,
        doctor_id: i64,
        week: i64,
    ) -> AppResult<Vec<ScheduleSlot>> {
        require_positive("doctor_id", doctor_id)?;
        if week < 0 {
            return Err(AppError::validation("week must not be negative"));
        }
        let (window_start, window_end) = week_window(ctx.now, week)?;
        self.schedules
            .list_available(conn, doctor_id, window_start, window_end)
    }

    // --- appointments ---

    pub fn book_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        req: &BookAppointmentRequest,
    ) -> AppResult<Appointment> {
        require_positive("patient_id", req.patient_id)?;
        require_positive("doctor_id", req.doctor_id)?;
        require_positive("service_id", req.service_id)?;
        require_not_past(ctx, &req.start_at)?;
        if let Some(price) = req.price {
            require_price(price)?;
        }
        self.coordinator.book_appointment(conn, ctx, req)
    }

    pub fn reschedule_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
        req: &UpdateAppointmentRequest,
    ) -> AppResult<Appointment> {
        if id <= 0 {
            return Err(AppError::InvalidAppointmentId(id));
        }
        if let Some(patient_id) = req.patient_id {
            require_positive("patient_id", patient_id)?;
        }
        if let Some(doctor_id) = req.doctor_id {
            require_positive("doctor_id", doctor_id)?;
        }
        if let Some(service_id) = req.service_id {
            require_positive("service_id", service_id)?;
        }
        if let Some(start_at) = &req.start_at {
            require_not_past(ctx, start_at)?;
        }
        if let Some(price) = req.price {
            require_price(price)?;
        }
        self.coordinator.reschedule_appointment(conn, ctx, id, req)
    }

    pub fn cancel_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
    ) -> AppResult<Appointment> {
        if id <= 0 {
            return Err(AppError::InvalidAppointmentId(id));
        }
        self.coordinator.cancel_appointment(conn, ctx, id)
    }

    pub fn purge_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
    ) -> AppResult<()> {
        if id <= 0 {
            return Err(AppError::InvalidAppointmentId(id));
        }
        self.coordinator.purge_appointment(conn, ctx, id)
    }

    pub fn get_appointment(&self, conn: &Connection, id: i64) -> AppResult<Appointment> {
        self.appointments
            .get_by_id(conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
    }

    pub fn list_appointments(&self, conn: &Connection) -> AppResult<Vec<Appointment>> {
        self.appointments.list(conn)
    }

    pub fn list_patient_appointments(
        &self,
        conn: &Connection,
        patient_id: i64,
    ) -> AppResult<Vec<Appointment>> {
        require_positive("patient_id", patient_id)?;
        self.appointments.list_by_patient(conn, patient_id)
    }

    fn reject_slot_overlap(
        &self,
        conn: &Connection,
        slot: &NewScheduleSlot,
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        let overlapping = self.schedules.count_overlapping(
            conn,
            slot.doctor_id,
            slot.calendar_date,
            slot.start_time,
            slot.end_time,
            exclude_id,
        )?;
        if overlapping > 0 {
            tracing::warn!(
                doctor_id = slot.doctor_id,
                date = %slot.calendar_date,
                "schedule slot overlaps an existing slot"
            );
            return Err(AppError::SlotOverlap);
        }
        Ok(())
    }
}

fn validate_slot(slot: &NewScheduleSlot) -> AppResult<()> {
    require_positive("doctor_id", slot.doctor_id)?;
    db::ensure_storable("start_time", &slot.start_time)?;
    db::ensure_storable("end_time", &slot.end_time)?;
    if slot.end_time <= slot.start_time {
        return Err(AppError::validation("end_time must be after start_time"));
    }
    if slot.room_number.is_empty() {
        return Err(AppError::validation("room_number is required"));
    }
    if slot.start_time.date_naive() != slot.calendar_date {
        return Err(AppError::validation("start_time must fall on calendar_date"));
    }
    Ok(())
}

fn require_positive(field: &str, value: i64) -> AppResult<()> {
    if value <= 0 {
        return Err(AppError::validation(format!("{field} must be positive")));
    }
    Ok(())
}

fn require_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must not be negative"));
    }
    Ok(())
}

fn require_not_past(ctx: &RequestContext, start_at: &DateTime<Utc>) -> AppResult<()> {
    if *start_at < ctx.now {
        return Err(AppError::validation("start_at must not be in the past"));
    }
    db::ensure_storable("start_at", start_at)
}

fn week_window(now: DateTime<Utc>, week: i64) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let offset = week
        .checked_mul(WINDOW_DAYS)
        .and_then(Duration::try_days)
        .ok_or_else(|| AppError::validation("week is out of range"))?;
    let start = now
        .checked_add_signed(offset)
        .ok_or_else(|| AppError::validation("week is out of range"))?
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    let end = Duration::try_days(WINDOW_DAYS)
        .and_then(|length| start.checked_add_signed(length))
        .ok_or_else(|| AppError::validation("week is out of range"))?;
    db::ensure_storable("week", &end)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateServiceRequest;
    use chrono::{NaiveDate, TimeZone};

    fn ts(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, h, m, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    /// Thursday 2025-01-09, 12:00 UTC.
    fn ctx() -> RequestContext {
        RequestContext::at(ts(9, 12, 0))
    }

    fn setup() -> (Connection, SchedulingService, i64) {
        let conn = db::init_db(":memory:").unwrap();
        let catalog = Arc::new(SqliteServiceCatalog::new());
        let service_id = catalog
            .create(
                &conn,
                &CreateServiceRequest {
                    name: "Consultation".to_string(),
                    description: String::new(),
                    category: "general".to_string(),
                    duration_minutes: 30,
                    price: 50.0,
                },
            )
            .unwrap()
            .id;
        (conn, SchedulingService::sqlite(catalog), service_id)
    }

    fn slot_request(doctor_id: i64, day: u32, start_h: u32, end_h: u32) -> CreateScheduleRequest {
        CreateScheduleRequest {
            doctor_id,
            calendar_date: date(day),
            start_time: ts(day, start_h, 0),
            end_time: ts(day, end_h, 0),
            room_number: "A1".to_string(),
            is_available: None,
        }
    }

    fn booking(service_id: i64, start: DateTime<Utc>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: 7,
            doctor_id: 1,
            service_id,
            start_at: start,
            price: None,
        }
    }

    #[test]
    fn test_create_schedule_validation() {
        let (mut conn, svc, _) = setup();

        let mut req = slot_request(1, 10, 9, 12);
        req.doctor_id = 0;
        assert!(matches!(svc.create_schedule(&mut conn, &req), Err(AppError::Validation(_))));

        let req = slot_request(1, 10, 12, 9);
        assert!(matches!(svc.create_schedule(&mut conn, &req), Err(AppError::Validation(_))));

        let mut req = slot_request(1, 10, 9, 12);
        req.room_number = "  ".to_string();
        assert!(matches!(svc.create_schedule(&mut conn, &req), Err(AppError::Validation(_))));

        let mut req = slot_request(1, 10, 9, 12);
        req.calendar_date = date(11);
        assert!(matches!(svc.create_schedule(&mut conn, &req), Err(AppError::Validation(_))));

        assert!(svc.list_schedules(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_create_schedule_rejects_overlap_for_same_doctor() {
        let (mut conn, svc, _) = setup();
        svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();

        let overlapping = svc.create_schedule(&mut conn, &slot_request(1, 10, 11, 13));
        assert!(matches!(overlapping, Err(AppError::SlotOverlap)));

        assert!(svc.create_schedule(&mut conn, &slot_request(1, 10, 12, 14)).is_ok());
        assert!(svc.create_schedule(&mut conn, &slot_request(2, 10, 9, 12)).is_ok());
    }

    #[test]
    fn test_update_schedule_merges_fields() {
        let (mut conn, svc, _) = setup();
        let slot = svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();

        let update = UpdateScheduleRequest {
            room_number: Some("B2".to_string()),
            end_time: Some(ts(10, 13, 0)),
            ..Default::default()
        };
        let updated = svc.update_schedule(&mut conn, slot.id, &update).unwrap();
        assert_eq!(updated.room_number, "B2");
        assert_eq!(updated.end_time, ts(10, 13, 0));
        assert_eq!(updated.start_time, slot.start_time);
        assert_eq!(updated.doctor_id, 1);

        let bad = UpdateScheduleRequest {
            end_time: Some(ts(10, 8, 0)),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_schedule(&mut conn, slot.id, &bad),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            svc.update_schedule(&mut conn, 999, &UpdateScheduleRequest::default()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_schedule_not_found() {
        let (mut conn, svc, _) = setup();
        let slot = svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();
        svc.delete_schedule(&conn, slot.id).unwrap();
        assert!(matches!(svc.delete_schedule(&conn, slot.id), Err(AppError::NotFound(_))));
        assert!(matches!(svc.get_schedule(&conn, slot.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_available_slots_window() {
        let (mut conn, svc, _) = setup();
        // This week: Jan 9 .. Jan 16 (exclusive). Next week: Jan 16 .. Jan 23.
        svc.create_schedule(&mut conn, &slot_request(1, 10, 14, 16)).unwrap();
        svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();
        svc.create_schedule(&mut conn, &slot_request(1, 17, 9, 12)).unwrap();
        let mut closed = slot_request(1, 11, 9, 12);
        closed.is_available = Some(false);
        svc.create_schedule(&mut conn, &closed).unwrap();

        let this_week = svc.get_available_slots(&conn, &ctx(), 1, 0).unwrap();
        let starts: Vec<_> = this_week.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![ts(10, 9, 0), ts(10, 14, 0)]);

        let next_week = svc.get_available_slots(&conn, &ctx(), 1, 1).unwrap();
        assert_eq!(next_week.len(), 1);
        assert_eq!(next_week[0].calendar_date, date(17));

        assert!(matches!(
            svc.get_available_slots(&conn, &ctx(), 1, -1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_booking_marks_slot_unavailable() {
        let (mut conn, svc, service_id) = setup();
        svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();

        svc.book_appointment(&mut conn, &ctx(), &booking(service_id, ts(10, 9, 0)))
            .unwrap();
        assert!(svc.get_available_slots(&conn, &ctx(), 1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_booking_validation() {
        let (mut conn, svc, service_id) = setup();
        svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();

        let past = booking(service_id, ts(8, 9, 0));
        assert!(matches!(
            svc.book_appointment(&mut conn, &ctx(), &past),
            Err(AppError::Validation(_))
        ));

        let mut no_patient = booking(service_id, ts(10, 9, 0));
        no_patient.patient_id = 0;
        assert!(matches!(
            svc.book_appointment(&mut conn, &ctx(), &no_patient),
            Err(AppError::Validation(_))
        ));

        let mut negative = booking(service_id, ts(10, 9, 0));
        negative.price = Some(-1.0);
        assert!(matches!(
            svc.book_appointment(&mut conn, &ctx(), &negative),
            Err(AppError::Validation(_))
        ));

        assert!(svc.list_appointments(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_read_side() {
        let (mut conn, svc, service_id) = setup();
        svc.create_schedule(&mut conn, &slot_request(1, 10, 9, 12)).unwrap();
        let created = svc
            .book_appointment(&mut conn, &ctx(), &booking(service_id, ts(10, 9, 0)))
            .unwrap();

        assert_eq!(svc.get_appointment(&conn, created.id).unwrap().id, created.id);
        assert!(matches!(svc.get_appointment(&conn, 999), Err(AppError::NotFound(_))));
        assert_eq!(svc.list_patient_appointments(&conn, 7).unwrap().len(), 1);
        assert!(matches!(
            svc.list_patient_appointments(&conn, 8),
            Err(AppError::NoAppointmentsFound(8))
        ));
    }

    #[test]
    fn test_reschedule_and_cancel_by_invalid_id() {
        let (mut conn, svc, _) = setup();
        let update = UpdateAppointmentRequest::default();
        assert!(matches!(
            svc.reschedule_appointment(&mut conn, &ctx(), 0, &update),
            Err(AppError::InvalidAppointmentId(0))
        ));
        assert!(matches!(
            svc.cancel_appointment(&mut conn, &ctx(), 5),
            Err(AppError::InvalidAppointmentId(5))
        ));
    }

    #[test]
    fn test_week_window_past_representable_range_is_rejected() {
        let (conn, svc, _) = setup();
        let today = ts(9, 12, 0).date_naive();
        let last_week = NaiveDate::MAX.signed_duration_since(today).num_days() / WINDOW_DAYS;

        for week in [last_week, last_week + 1, i64::MAX] {
            assert!(matches!(
                svc.get_available_slots(&conn, &ctx(), 1, week),
                Err(AppError::Validation(_))
            ));
        }

        // Windows ending after year 9999 would not compare correctly as text.
        let beyond_9999 = (NaiveDate::from_ymd_opt(9999, 12, 31).unwrap() - today).num_days() / WINDOW_DAYS;
        assert!(week_window(ts(9, 12, 0), beyond_9999).is_err());
        assert!(svc.get_available_slots(&conn, &ctx(), 1, 0).is_ok());
    }

    #[test]
    fn test_far_future_times_are_rejected() {
        let (mut conn, svc, service_id) = setup();
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 9, 0, 0).unwrap();

        let result = svc.book_appointment(&mut conn, &ctx(), &booking(service_id, far));
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut req = slot_request(1, 10, 9, 12);
        req.end_time = far;
        assert!(matches!(svc.create_schedule(&mut conn, &req), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_week_window_starts_at_midnight() {
        let (start, end) = week_window(ts(9, 12, 30), 2).unwrap();
        assert_eq!(start, ts(23, 0, 0));
        assert_eq!(end, ts(30, 0, 0));
    }
}
