use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use super::store::ScheduleStore;
use super::{format_date, format_ts, read_date, read_ts};
use crate::errors::{AppError, AppResult};
use crate::models::{NewScheduleSlot, ScheduleSlot};

const SLOT_COLUMNS: &str =
    "id, doctor_id, calendar_date, start_time, end_time, room_number, is_available, created_at, updated_at";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteScheduleStore;

impl SqliteScheduleStore {
    pub fn new() -> Self {
        Self
    }

    fn query_slots(
        &self,
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> AppResult<Vec<ScheduleSlot>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, parse_slot_row)?;

        let mut slots = vec![];
        for row in rows {
            slots.push(row?);
        }
        Ok(slots)
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn create(&self, conn: &Connection, slot: &NewScheduleSlot) -> AppResult<ScheduleSlot> {
        check_window(slot)?;
        let created = conn.query_row(
            &format!(
                "INSERT INTO schedule_slots (doctor_id, calendar_date, start_time, end_time, room_number, is_available)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING {SLOT_COLUMNS}"
            ),
            params![
                slot.doctor_id,
                format_date(&slot.calendar_date),
                format_ts(&slot.start_time),
                format_ts(&slot.end_time),
                slot.room_number,
                slot.is_available as i32,
            ],
            parse_slot_row,
        )?;

        tracing::debug!(slot_id = created.id, doctor_id = created.doctor_id, "schedule slot stored");
        Ok(created)
    }

    fn get_by_id(&self, conn: &Connection, id: i64) -> AppResult<Option<ScheduleSlot>> {
        let result = conn.query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM schedule_slots WHERE id = ?1"),
            params![id],
            parse_slot_row,
        );

        match result {
            Ok(slot) => Ok(Some(slot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self, conn: &Connection) -> AppResult<Vec<ScheduleSlot>> {
        self.query_slots(
            conn,
            &format!("SELECT {SLOT_COLUMNS} FROM schedule_slots ORDER BY start_time ASC, id ASC"),
            &[],
        )
    }

    fn list_by_doctor(&self, conn: &Connection, doctor_id: i64) -> AppResult<Vec<ScheduleSlot>> {
        self.query_slots(
            conn,
            &format!(
                "SELECT {SLOT_COLUMNS} FROM schedule_slots
                 WHERE doctor_id = ?1 ORDER BY start_time ASC, id ASC"
            ),
            &[&doctor_id],
        )
    }

    fn find_containing(
        &self,
        conn: &Connection,
        doctor_id: i64,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Option<ScheduleSlot>> {
        let result = conn.query_row(
            &format!(
                "SELECT {SLOT_COLUMNS} FROM schedule_slots
                 WHERE doctor_id = ?1 AND calendar_date = ?2 AND start_time <= ?3 AND end_time >= ?4
                 ORDER BY start_time ASC, id ASC LIMIT 1"
            ),
            params![doctor_id, format_date(&date), format_ts(&start), format_ts(&end)],
            parse_slot_row,
        );

        match result {
            Ok(slot) => Ok(Some(slot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_available(
        &self,
        conn: &Connection,
        doctor_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ScheduleSlot>> {
        let window_start = format_ts(&window_start);
        let window_end = format_ts(&window_end);
        self.query_slots(
            conn,
            &format!(
                "SELECT {SLOT_COLUMNS} FROM schedule_slots
                 WHERE doctor_id = ?1 AND is_available = 1 AND start_time < ?2 AND end_time > ?3
                 ORDER BY start_time ASC, id ASC"
            ),
            &[&doctor_id, &window_end, &window_start],
        )
    }

    fn count_overlapping(
        &self,
        conn: &Connection,
        doctor_id: i64,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<i64>,
    ) -> AppResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM schedule_slots
             WHERE doctor_id = ?1 AND calendar_date = ?2 AND start_time < ?3 AND end_time > ?4
               AND (?5 IS NULL OR id <> ?5)",
            params![doctor_id, format_date(&date), format_ts(&end), format_ts(&start), exclude_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn set_availability(&self, conn: &Connection, slot_id: i64, available: bool) -> AppResult<bool> {
        let count = conn.execute(
            "UPDATE schedule_slots SET is_available = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![available as i32, slot_id],
        )?;
        Ok(count > 0)
    }

    fn update(&self, conn: &Connection, id: i64, slot: &NewScheduleSlot) -> AppResult<Option<ScheduleSlot>> {
        check_window(slot)?;
        let result = conn.query_row(
            &format!(
                "UPDATE schedule_slots SET
                   doctor_id = ?1,
                   calendar_date = ?2,
                   start_time = ?3,
                   end_time = ?4,
                   room_number = ?5,
                   is_available = ?6,
                   updated_at = datetime('now')
                 WHERE id = ?7
                 RETURNING {SLOT_COLUMNS}"
            ),
            params![
                slot.doctor_id,
                format_date(&slot.calendar_date),
                format_ts(&slot.start_time),
                format_ts(&slot.end_time),
                slot.room_number,
                slot.is_available as i32,
                id,
            ],
            parse_slot_row,
        );

        match result {
            Ok(slot) => Ok(Some(slot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, conn: &Connection, id: i64) -> AppResult<bool> {
        let count = conn.execute("DELETE FROM schedule_slots WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    fn delete_all_for_doctor(&self, conn: &Connection, doctor_id: i64) -> AppResult<usize> {
        let count = conn.execute(
            "DELETE FROM schedule_slots WHERE doctor_id = ?1",
            params![doctor_id],
        )?;
        Ok(count)
    }
}

fn check_window(slot: &NewScheduleSlot) -> AppResult<()> {
    if slot.end_time <= slot.start_time {
        return Err(AppError::validation("end_time must be after start_time"));
    }
    Ok(())
}

fn parse_slot_row(row: &rusqlite::Row) -> rusqlite::Result<ScheduleSlot> {
    Ok(ScheduleSlot {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        calendar_date: read_date(row, 2)?,
        start_time: read_ts(row, 3)?,
        end_time: read_ts(row, 4)?,
        room_number: row.get(5)?,
        is_available: row.get::<_, i32>(6)? != 0,
        created_at: read_ts(row, 7)?,
        updated_at: read_ts(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, h, m, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn slot(doctor_id: i64, day: u32, start_h: u32, end_h: u32) -> NewScheduleSlot {
        NewScheduleSlot {
            doctor_id,
            calendar_date: date(day),
            start_time: at(day, start_h, 0),
            end_time: at(day, end_h, 0),
            room_number: "101".to_string(),
            is_available: true,
        }
    }

    #[test]
    fn test_create_and_get() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();

        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        assert!(created.id > 0);
        assert!(created.is_available);

        let loaded = store.get_by_id(&conn, created.id).unwrap().unwrap();
        assert_eq!(loaded.calendar_date, date(10));
        assert_eq!(loaded.start_time, at(10, 9, 0));
        assert_eq!(loaded.room_number, "101");

        assert!(store.get_by_id(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn test_end_not_after_start_is_invalid_input() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let result = store.create(&conn, &slot(1, 10, 12, 9));
        assert!(matches!(result, Err(AppError::Validation(_))));
        let result = store.create(&conn, &slot(1, 10, 9, 9));
        assert!(matches!(result, Err(AppError::Validation(_))));

        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        let result = store.update(&conn, created.id, &slot(1, 10, 12, 9));
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_list_by_doctor_sorted_by_start() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        store.create(&conn, &slot(1, 11, 9, 12)).unwrap();
        store.create(&conn, &slot(1, 10, 14, 16)).unwrap();
        store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        store.create(&conn, &slot(2, 10, 8, 9)).unwrap();

        let slots = store.list_by_doctor(&conn, 1).unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![at(10, 9, 0), at(10, 14, 0), at(11, 9, 0)]);
    }

    #[test]
    fn test_find_containing_bounds_are_inclusive() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();

        let whole = store
            .find_containing(&conn, 1, date(10), at(10, 9, 0), at(10, 12, 0))
            .unwrap();
        assert_eq!(whole.map(|s| s.id), Some(created.id));

        let spill = store
            .find_containing(&conn, 1, date(10), at(10, 11, 45), at(10, 12, 15))
            .unwrap();
        assert!(spill.is_none());

        let other_doctor = store
            .find_containing(&conn, 2, date(10), at(10, 9, 0), at(10, 9, 30))
            .unwrap();
        assert!(other_doctor.is_none());
    }

    #[test]
    fn test_find_containing_ignores_availability() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        store.set_availability(&conn, created.id, false).unwrap();

        let found = store
            .find_containing(&conn, 1, date(10), at(10, 10, 0), at(10, 10, 30))
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_list_available_filters_flag_and_window() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let taken = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        store.create(&conn, &slot(1, 12, 9, 12)).unwrap();
        store.create(&conn, &slot(1, 20, 9, 12)).unwrap();
        store.set_availability(&conn, taken.id, false).unwrap();

        let slots = store
            .list_available(&conn, 1, at(10, 0, 0), at(17, 0, 0))
            .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].calendar_date, date(12));
    }

    #[test]
    fn test_count_overlapping_excludes_self_and_touching() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();

        let overlapping = store
            .count_overlapping(&conn, 1, date(10), at(10, 11, 0), at(10, 13, 0), None)
            .unwrap();
        assert_eq!(overlapping, 1);

        let touching = store
            .count_overlapping(&conn, 1, date(10), at(10, 12, 0), at(10, 13, 0), None)
            .unwrap();
        assert_eq!(touching, 0);

        let itself = store
            .count_overlapping(&conn, 1, date(10), at(10, 9, 0), at(10, 12, 0), Some(created.id))
            .unwrap();
        assert_eq!(itself, 0);
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        let created = store.create(&conn, &slot(1, 10, 9, 12)).unwrap();

        let mut changed = created.as_new();
        changed.room_number = "202".to_string();
        let updated = store.update(&conn, created.id, &changed).unwrap().unwrap();
        assert_eq!(updated.room_number, "202");
        assert!(store.update(&conn, 999, &changed).unwrap().is_none());

        assert!(store.delete(&conn, created.id).unwrap());
        assert!(!store.delete(&conn, created.id).unwrap());
    }

    #[test]
    fn test_delete_all_for_doctor() {
        let conn = setup_db();
        let store = SqliteScheduleStore::new();
        store.create(&conn, &slot(1, 10, 9, 12)).unwrap();
        store.create(&conn, &slot(1, 11, 9, 12)).unwrap();
        store.create(&conn, &slot(2, 10, 9, 12)).unwrap();

        assert_eq!(store.delete_all_for_doctor(&conn, 1).unwrap(), 2);
        assert!(store.list_by_doctor(&conn, 1).unwrap().is_empty());
        assert_eq!(store.list_by_doctor(&conn, 2).unwrap().len(), 1);
    }
}
