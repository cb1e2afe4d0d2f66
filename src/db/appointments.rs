use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction};

use super::store::{AppointmentStore, ScheduleStore};
use super::{format_ts, read_opt_ts, read_ts};
use crate::errors::{AppError, AppResult};
use crate::models::{Appointment, AppointmentStatus, NewAppointment, ScheduleSlot};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, service_id, schedule_slot_id, start_at, end_at, \
     status, price, paid, cancelled_at, created_at, updated_at";

/// Which party an overlap count is scoped to.
#[derive(Debug, Clone, Copy)]
enum Party {
    Doctor(i64),
    Patient(i64),
}

pub struct SqliteAppointmentStore {
    schedules: Arc<dyn ScheduleStore>,
}

impl SqliteAppointmentStore {
    pub fn new(schedules: Arc<dyn ScheduleStore>) -> Self {
        Self { schedules }
    }

    /// Steps 1-3 shared by create and update: resolve the containing slot,
    /// then reject any live overlap for the doctor or the patient.
    fn check_window(
        &self,
        conn: &Connection,
        doctor_id: i64,
        patient_id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> AppResult<ScheduleSlot> {
        let date = start_at.date_naive();
        let slot = self
            .schedules
            .find_containing(conn, doctor_id, date, start_at, end_at)?
            .ok_or_else(|| {
                tracing::warn!(doctor_id, %start_at, %end_at, "appointment time is outside the doctor's schedule");
                AppError::TimeNotInSchedule
            })?;

        if count_overlapping(conn, Party::Doctor(doctor_id), start_at, end_at, exclude_id)? > 0 {
            tracing::warn!(doctor_id, %start_at, %end_at, "appointment overlaps another appointment of the doctor");
            return Err(AppError::TimeConflict);
        }

        if count_overlapping(conn, Party::Patient(patient_id), start_at, end_at, exclude_id)? > 0 {
            tracing::warn!(patient_id, %start_at, %end_at, "appointment overlaps another appointment of the patient");
            return Err(AppError::TimeConflict);
        }

        Ok(slot)
    }
}

impl AppointmentStore for SqliteAppointmentStore {
    fn create_within_transaction(
        &self,
        tx: &Transaction<'_>,
        appointment: &NewAppointment,
    ) -> AppResult<Appointment> {
        let slot = self.check_window(
            tx,
            appointment.doctor_id,
            appointment.patient_id,
            appointment.start_at,
            appointment.end_at,
            None,
        )?;

        let created = tx
            .query_row(
                &format!(
                    "INSERT INTO appointments (patient_id, doctor_id, service_id, schedule_slot_id, start_at, end_at, status, price)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     RETURNING {APPOINTMENT_COLUMNS}"
                ),
                params![
                    appointment.patient_id,
                    appointment.doctor_id,
                    appointment.service_id,
                    slot.id,
                    format_ts(&appointment.start_at),
                    format_ts(&appointment.end_at),
                    AppointmentStatus::Scheduled.as_str(),
                    appointment.price,
                ],
                parse_appointment_row,
            )
            .map_err(conflict_or_storage)?;

        tracing::info!(appointment_id = created.id, slot_id = slot.id, "appointment inserted");
        Ok(created)
    }

    fn update_within_transaction(
        &self,
        tx: &Transaction<'_>,
        appointment: &Appointment,
    ) -> AppResult<Appointment> {
        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM appointments WHERE id = ?1",
            params![appointment.id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::InvalidAppointmentId(appointment.id));
        }

        let slot = self.check_window(
            tx,
            appointment.doctor_id,
            appointment.patient_id,
            appointment.start_at,
            appointment.end_at,
            Some(appointment.id),
        )?;

        let updated = tx
            .query_row(
                &format!(
                    "UPDATE appointments SET
                       patient_id = ?1,
                       doctor_id = ?2,
                       service_id = ?3,
                       schedule_slot_id = ?4,
                       start_at = ?5,
                       end_at = ?6,
                       price = ?7,
                       updated_at = datetime('now')
                     WHERE id = ?8
                     RETURNING {APPOINTMENT_COLUMNS}"
                ),
                params![
                    appointment.patient_id,
                    appointment.doctor_id,
                    appointment.service_id,
                    slot.id,
                    format_ts(&appointment.start_at),
                    format_ts(&appointment.end_at),
                    appointment.price,
                    appointment.id,
                ],
                parse_appointment_row,
            )
            .map_err(conflict_or_storage)?;

        tracing::info!(appointment_id = updated.id, slot_id = slot.id, "appointment updated");
        Ok(updated)
    }

    fn get_by_id(&self, conn: &Connection, id: i64) -> AppResult<Option<Appointment>> {
        let result = conn.query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            parse_appointment_row,
        );

        match result {
            Ok(appointment) => Ok(Some(appointment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, conn: &Connection) -> AppResult<Vec<Appointment>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY start_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], parse_appointment_row)?;

        let mut appointments = vec![];
        for row in rows {
            appointments.push(row?);
        }
        Ok(appointments)
    }

    fn list_by_patient(&self, conn: &Connection, patient_id: i64) -> AppResult<Vec<Appointment>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE patient_id = ?1 ORDER BY start_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![patient_id], parse_appointment_row)?;

        let mut appointments = vec![];
        for row in rows {
            appointments.push(row?);
        }

        if appointments.is_empty() {
            tracing::info!(patient_id, "no appointments found for patient");
            return Err(AppError::NoAppointmentsFound(patient_id));
        }
        Ok(appointments)
    }

    fn count_active_in_slot(&self, conn: &Connection, slot_id: i64) -> AppResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM appointments
             WHERE schedule_slot_id = ?1 AND cancelled_at IS NULL",
            params![slot_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn cancel(&self, conn: &Connection, id: i64, at: DateTime<Utc>) -> AppResult<bool> {
        let count = conn.execute(
            "UPDATE appointments SET cancelled_at = ?1, status = ?2, updated_at = datetime('now')
             WHERE id = ?3 AND cancelled_at IS NULL",
            params![format_ts(&at), AppointmentStatus::Cancelled.as_str(), id],
        )?;
        Ok(count > 0)
    }

    fn delete(&self, conn: &Connection, id: i64) -> AppResult<bool> {
        let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }
}

/// Half-open overlap: `existing.start < end AND existing.end > start`, so
/// back-to-back appointments never conflict.
fn count_overlapping(
    conn: &Connection,
    party: Party,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    exclude_id: Option<i64>,
) -> AppResult<i64> {
    let (column, party_id) = match party {
        Party::Doctor(id) => ("doctor_id", id),
        Party::Patient(id) => ("patient_id", id),
    };

    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM appointments
             WHERE {column} = ?1 AND cancelled_at IS NULL AND start_at < ?2 AND end_at > ?3
               AND (?4 IS NULL OR id <> ?4)"
        ),
        params![party_id, format_ts(&end_at), format_ts(&start_at), exclude_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The partial unique indexes on live start instants back up the overlap
/// counts; hitting one means another writer won the race.
fn conflict_or_storage(e: rusqlite::Error) -> AppError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            tracing::warn!(error = %e, "unique start constraint rejected appointment");
            AppError::TimeConflict
        }
        _ => AppError::Database(e),
    }
}

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let raw_status: String = row.get(7)?;
    let status = AppointmentStatus::parse(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unknown appointment status: {raw_status}").into(),
        )
    })?;
    Ok(Appointment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        service_id: row.get(3)?,
        schedule_slot_id: row.get(4)?,
        start_at: read_ts(row, 5)?,
        end_at: read_ts(row, 6)?,
        status,
        price: row.get(8)?,
        paid: row.get::<_, i32>(9)? != 0,
        cancelled_at: read_opt_ts(row, 10)?,
        created_at: read_ts(row, 11)?,
        updated_at: read_ts(row, 12)?,
    })
}
