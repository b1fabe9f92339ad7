//! Store methods for the enriched output timeline.

use super::{date_column, RecordStore};
use crate::{
    error::PipelineResult,
    month::Month,
    record::OutputRow,
    types::{Status, SubscriberId},
};
use rusqlite::{params, types::Type};

fn opt_u32(value: Option<u32>) -> Option<i64> {
    value.map(i64::from)
}

impl RecordStore {
    /// Replace the stored output of a run.
    pub fn save_output_rows(&self, run_id: &str, rows: &[OutputRow]) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM enriched_period WHERE run_id = ?1", params![run_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO enriched_period (
                    run_id, sub_id, month, status,
                    months_since_first_subscription, active_months, canceled_months,
                    months_since_status_change, confirmed_bookings
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            )?;
            for r in rows {
                stmt.execute(params![
                    run_id,
                    r.sub_id.as_str(),
                    r.dates.to_string(),
                    r.status.as_str(),
                    opt_u32(r.months_since_first_subscription),
                    r.active_months as i64,
                    r.canceled_months as i64,
                    opt_u32(r.months_since_status_change),
                    r.confirmed_bookings as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Output rows of a run, ordered by (subscriber, month).
    /// SQL orders sub_id as text, so the rows are re-sorted on `SubscriberId`.
    pub fn output_rows(&self, run_id: &str) -> PipelineResult<Vec<OutputRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT sub_id, month, status,
                    months_since_first_subscription, active_months, canceled_months,
                    months_since_status_change, confirmed_bookings
             FROM enriched_period WHERE run_id = ?1
             ORDER BY sub_id ASC, month ASC",
        )?;
        let mut rows = stmt
            .query_map(params![run_id], |row| {
                let raw_status: String = row.get(2)?;
                let status = Status::parse(&raw_status).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        Type::Text,
                        format!("unknown status '{raw_status}'").into(),
                    )
                })?;
                Ok(OutputRow {
                    sub_id:                          SubscriberId::new(row.get::<_, String>(0)?),
                    dates:                           Month::from_date(date_column(row, 1)?),
                    status,
                    months_since_first_subscription: row.get::<_, Option<i64>>(3)?.map(|v| v as u32),
                    active_months:                   row.get::<_, i64>(4)? as u32,
                    canceled_months:                 row.get::<_, i64>(5)? as u32,
                    months_since_status_change:      row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
                    confirmed_bookings:              row.get::<_, i64>(7)? as u32,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by(|a, b| a.sub_id.cmp(&b.sub_id).then(a.dates.cmp(&b.dates)));
        Ok(rows)
    }

    pub fn output_row_count(&self, run_id: &str) -> PipelineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM enriched_period WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
