//! Storage seams for the booking engine.
//!
//! Every method takes the connection explicitly so the same store can run
//! against a plain connection or inside a caller-owned transaction
//! (`rusqlite::Transaction` derefs to `Connection`). Methods that must only
//! ever run inside an atomic unit take `&Transaction` instead.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Transaction};

use crate::errors::AppResult;
use crate::models::{
    Appointment, CreateServiceRequest, NewAppointment, NewScheduleSlot, ScheduleSlot, ServiceInfo,
};

pub trait ScheduleStore: Send + Sync {
    fn create(&self, conn: &Connection, slot: &NewScheduleSlot) -> AppResult<ScheduleSlot>;

    fn get_by_id(&self, conn: &Connection, id: i64) -> AppResult<Option<ScheduleSlot>>;

    fn list_all(&self, conn: &Connection) -> AppResult<Vec<ScheduleSlot>>;

    /// Slots for one doctor, ascending by start time.
    fn list_by_doctor(&self, conn: &Connection, doctor_id: i64) -> AppResult<Vec<ScheduleSlot>>;

    /// The slot of `doctor_id` on `date` whose window contains `[start, end)`.
    /// Availability is not considered here.
    fn find_containing(
        &self,
        conn: &Connection,
        doctor_id: i64,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Option<ScheduleSlot>>;

    /// Available slots intersecting `[window_start, window_end)`, ascending by start time.
    fn list_available(
        &self,
        conn: &Connection,
        doctor_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleSlot>>;

    /// Number of slots of `doctor_id` on `date` overlapping `[start, end)`.
    fn count_overlapping(
        &self,
        conn: &Connection,
        doctor_id: i64,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> AppResult<i64>;

    /// Returns false when no slot has that id.
    fn set_availability(&self, conn: &Connection, slot_id: i64, available: bool) -> AppResult<bool>;

    fn update(&self, conn: &Connection, id: i64, slot: &NewScheduleSlot) -> AppResult<Option<ScheduleSlot>>;

    fn delete(&self, conn: &Connection, id: i64) -> AppResult<bool>;

    fn delete_all_for_doctor(&self, conn: &Connection, doctor_id: i64) -> AppResult<usize>;
}

pub trait AppointmentStore: Send + Sync {
    /// Containment check, doctor overlap, patient overlap, insert. Any failure
    /// leaves the transaction for the caller to roll back.
    fn create_within_transaction(
        &self,
        tx: &Transaction<'_>,
        appointment: &NewAppointment,
    ) -> AppResult<Appointment>;

    /// Same checks as create, excluding the appointment's own row from the
    /// overlap counts. Fails with `InvalidAppointmentId` if the row is gone.
    fn update_within_transaction(
        &self,
        tx: &Transaction<'_>,
        appointment: &Appointment,
    ) -> AppResult<Appointment>;

    fn get_by_id(&self, conn: &Connection, id: i64) -> AppResult<Option<Appointment>>;

    fn list(&self, conn: &Connection) -> AppResult<Vec<Appointment>>;

    /// Fails with `NoAppointmentsFound` when the patient has none.
    fn list_by_patient(&self, conn: &Connection, patient_id: i64) -> AppResult<Vec<Appointment>>;

    /// Non-cancelled appointments linked to a slot.
    fn count_active_in_slot(&self, conn: &Connection, slot_id: i64) -> AppResult<i64>;

    fn cancel(&self, conn: &Connection, id: i64, at: DateTime<Utc>) -> AppResult<bool>;

    /// Hard removal. Administrative purge only.
    fn delete(&self, conn: &Connection, id: i64) -> AppResult<bool>;
}

pub trait ServiceCatalog: Send + Sync {
    fn find(&self, conn: &Connection, service_id: i64) -> AppResult<Option<ServiceInfo>>;

    fn list(&self, conn: &Connection) -> AppResult<Vec<ServiceInfo>>;

    fn create(&self, conn: &Connection, service: &CreateServiceRequest) -> AppResult<ServiceInfo>;
}
