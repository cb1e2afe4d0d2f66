//! Booking transaction coordinator.
//!
//! Slot containment, doctor and patient overlap checks, the appointment
//! write and the slot availability flip all happen inside one
//! `BEGIN IMMEDIATE` transaction. SQLite takes its write lock at `BEGIN`, so
//! two concurrent attempts on the same database are serialized before either
//! one reads the overlap counts. Any error drops the transaction, which rolls
//! it back. Nothing here retries: a blind retry after an ambiguous failure
//! risks a double booking.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::{self, AppointmentStore, ScheduleStore, ServiceCatalog};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Appointment, BookAppointmentRequest, NewAppointment, ServiceInfo, UpdateAppointmentRequest,
};
use crate::services::context::RequestContext;

pub struct BookingCoordinator {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
    catalog: Arc<dyn ServiceCatalog>,
}

impl BookingCoordinator {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn ServiceCatalog>,
    ) -> Self {
        Self {
            schedules,
            appointments,
            catalog,
        }
    }

    pub fn book_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        req: &BookAppointmentRequest,
    ) -> AppResult<Appointment> {
        let tx = begin(conn)?;
        ctx.check_deadline()?;

        let service = self.resolve_service(&tx, req.service_id)?;
        let start_at = req.start_at.trunc_subsecs(0);
        let appointment = NewAppointment {
            patient_id: req.patient_id,
            doctor_id: req.doctor_id,
            service_id: req.service_id,
            start_at,
            end_at: derive_end(start_at, &service)?,
            price: req.price.unwrap_or(service.price),
        };

        let created = self.appointments.create_within_transaction(&tx, &appointment)?;
        if let Some(slot_id) = created.schedule_slot_id {
            self.occupy_slot(&tx, slot_id)?;
        }

        ctx.check_deadline()?;
        tx.commit()?;

        tracing::info!(
            request_id = %ctx.request_id,
            appointment_id = created.id,
            doctor_id = created.doctor_id,
            patient_id = created.patient_id,
            start_at = %created.start_at,
            end_at = %created.end_at,
            "appointment booked"
        );
        Ok(created)
    }

    /// Applies only the fields present in `req`, re-derives `end_at` when the
    /// start or the service changed, then re-runs the booking checks with the
    /// appointment's own row excluded.
    pub fn reschedule_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
        req: &UpdateAppointmentRequest,
    ) -> AppResult<Appointment> {
        let tx = begin(conn)?;
        ctx.check_deadline()?;

        let mut appointment = self
            .appointments
            .get_by_id(&tx, id)?
            .ok_or(AppError::InvalidAppointmentId(id))?;
        if appointment.is_cancelled() {
            return Err(AppError::validation("cannot reschedule a cancelled appointment"));
        }
        let previous_slot = appointment.schedule_slot_id;

        let service_changed = req.service_id.is_some_and(|s| s != appointment.service_id);
        if let Some(patient_id) = req.patient_id {
            appointment.patient_id = patient_id;
        }
        if let Some(doctor_id) = req.doctor_id {
            appointment.doctor_id = doctor_id;
        }
        if let Some(service_id) = req.service_id {
            appointment.service_id = service_id;
        }
        if let Some(start_at) = req.start_at {
            appointment.start_at = start_at.trunc_subsecs(0);
        }
        if req.start_at.is_some() || service_changed {
            let service = self.resolve_service(&tx, appointment.service_id)?;
            appointment.end_at = derive_end(appointment.start_at, &service)?;
            if service_changed && req.price.is_none() {
                appointment.price = service.price;
            }
        }
        if let Some(price) = req.price {
            appointment.price = price;
        }

        let updated = self.appointments.update_within_transaction(&tx, &appointment)?;
        if let Some(slot_id) = updated.schedule_slot_id {
            self.occupy_slot(&tx, slot_id)?;
        }
        if let Some(old_slot) = previous_slot.filter(|old| Some(*old) != updated.schedule_slot_id) {
            self.release_slot_if_empty(&tx, old_slot)?;
        }

        ctx.check_deadline()?;
        tx.commit()?;

        tracing::info!(
            request_id = %ctx.request_id,
            appointment_id = updated.id,
            start_at = %updated.start_at,
            end_at = %updated.end_at,
            "appointment rescheduled"
        );
        Ok(updated)
    }

    /// Soft cancel: the row stays for audit, leaves the overlap checks, and
    /// its slot re-opens once nothing live is booked in it.
    pub fn cancel_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
    ) -> AppResult<Appointment> {
        let tx = begin(conn)?;
        ctx.check_deadline()?;

        let appointment = self
            .appointments
            .get_by_id(&tx, id)?
            .ok_or(AppError::InvalidAppointmentId(id))?;
        if appointment.is_cancelled() {
            return Err(AppError::validation("appointment is already cancelled"));
        }

        self.appointments.cancel(&tx, id, ctx.now)?;
        if let Some(slot_id) = appointment.schedule_slot_id {
            self.release_slot_if_empty(&tx, slot_id)?;
        }

        let cancelled = self
            .appointments
            .get_by_id(&tx, id)?
            .ok_or(AppError::InvalidAppointmentId(id))?;

        ctx.check_deadline()?;
        tx.commit()?;

        tracing::info!(request_id = %ctx.request_id, appointment_id = id, "appointment cancelled");
        Ok(cancelled)
    }

    /// Hard delete for administrative purges.
    pub fn purge_appointment(
        &self,
        conn: &mut Connection,
        ctx: &RequestContext,
        id: i64,
    ) -> AppResult<()> {
        let tx = begin(conn)?;
        ctx.check_deadline()?;

        let appointment = self
            .appointments
            .get_by_id(&tx, id)?
            .ok_or(AppError::InvalidAppointmentId(id))?;

        self.appointments.delete(&tx, id)?;
        if let (Some(slot_id), false) = (appointment.schedule_slot_id, appointment.is_cancelled()) {
            self.release_slot_if_empty(&tx, slot_id)?;
        }

        ctx.check_deadline()?;
        tx.commit()?;

        tracing::info!(request_id = %ctx.request_id, appointment_id = id, "appointment purged");
        Ok(())
    }

    fn resolve_service(&self, conn: &Connection, service_id: i64) -> AppResult<ServiceInfo> {
        let service = self
            .catalog
            .find(conn, service_id)?
            .ok_or(AppError::ServiceNotFound(service_id))?;
        if service.duration_minutes <= 0 {
            return Err(AppError::validation("service duration must be positive"));
        }
        Ok(service)
    }

    fn occupy_slot(&self, tx: &Transaction<'_>, slot_id: i64) -> AppResult<()> {
        if !self.schedules.set_availability(tx, slot_id, false)? {
            return Err(AppError::Internal(format!(
                "schedule slot {slot_id} vanished during booking"
            )));
        }
        Ok(())
    }

    fn release_slot_if_empty(&self, tx: &Transaction<'_>, slot_id: i64) -> AppResult<()> {
        if self.appointments.count_active_in_slot(tx, slot_id)? == 0 {
            // The slot may have been deleted meanwhile; nothing to re-open then.
            self.schedules.set_availability(tx, slot_id, true)?;
        }
        Ok(())
    }
}

fn derive_end(start_at: DateTime<Utc>, service: &ServiceInfo) -> AppResult<DateTime<Utc>> {
    let end_at = TimeDelta::try_minutes(service.duration_minutes)
        .and_then(|duration| start_at.checked_add_signed(duration))
        .ok_or_else(|| AppError::validation("appointment end time is out of range"))?;
    db::ensure_storable("end_at", &end_at)?;
    Ok(end_at)
}

fn begin(conn: &mut Connection) -> AppResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}
