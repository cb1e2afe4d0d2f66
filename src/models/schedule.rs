use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A bounded window of bookable time declared by a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSlot {
    pub id: i64,
    pub doctor_id: i64,
    pub calendar_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub room_number: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleSlot {
    pub fn as_new(&self) -> NewScheduleSlot {
        NewScheduleSlot {
            doctor_id: self.doctor_id,
            calendar_date: self.calendar_date,
            start_time: self.start_time,
            end_time: self.end_time,
            room_number: self.room_number.clone(),
            is_available: self.is_available,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduleSlot {
    pub doctor_id: i64,
    pub calendar_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub room_number: String,
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: i64,
    #[serde(alias = "date")]
    pub calendar_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub room_number: String,
    pub is_available: Option<bool>,
}

/// Partial update: only present fields overwrite the stored slot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    pub doctor_id: Option<i64>,
    #[serde(alias = "date")]
    pub calendar_date: Option<NaiveDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub room_number: Option<String>,
    pub is_available: Option<bool>,
}
