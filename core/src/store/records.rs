//! Store methods for raw input rows.

use super::{date_column, RecordStore};
use crate::{
    error::PipelineResult,
    record::{BookingEvent, SubscriptionRecord},
    types::SubscriberId,
};
use rusqlite::params;

impl RecordStore {
    // ── Subscriptions ──────────────────────────────────────────

    /// Append subscription rows after any already stored for the run.
    pub fn insert_subscription_records(
        &self,
        run_id:  &str,
        records: &[SubscriptionRecord],
    ) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let start: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM subscription_record WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO subscription_record (run_id, seq, sub_id, status, record_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (i, r) in records.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    start + i as i64,
                    r.subscriber_id.as_str(),
                    r.status,
                    r.date.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Subscription rows in ingestion order.
    pub fn subscription_records(&self, run_id: &str) -> PipelineResult<Vec<SubscriptionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT sub_id, status, record_date FROM subscription_record
             WHERE run_id = ?1 ORDER BY seq ASC",
        )?;
        let records = stmt
            .query_map(params![run_id], |row| {
                Ok(SubscriptionRecord {
                    subscriber_id: SubscriberId::new(row.get::<_, String>(0)?),
                    status:        row.get(1)?,
                    date:          date_column(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ── Bookings ───────────────────────────────────────────────

    pub fn insert_booking_events(&self, run_id: &str, events: &[BookingEvent]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let start: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM booking_event WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO booking_event (run_id, seq, subscriber_id, booked_on, booking_status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (i, b) in events.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    start + i as i64,
                    b.subscriber_id.as_str(),
                    b.booked_on.to_string(),
                    b.booking_status,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn booking_events(&self, run_id: &str) -> PipelineResult<Vec<BookingEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT subscriber_id, booked_on, booking_status FROM booking_event
             WHERE run_id = ?1 ORDER BY seq ASC",
        )?;
        let events = stmt
            .query_map(params![run_id], |row| {
                Ok(BookingEvent {
                    subscriber_id:  SubscriberId::new(row.get::<_, String>(0)?),
                    booked_on:      date_column(row, 1)?,
                    booking_status: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn subscription_record_count(&self, run_id: &str) -> PipelineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM subscription_record WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn booking_event_count(&self, run_id: &str) -> PipelineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM booking_event WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
