//! CSV export of the enriched timeline.

use crate::{error::PipelineResult, record::OutputRow};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const OUTPUT_HEADER: &str = "sub_id,status,dates,months_since_first_subscription,\
active_months,canceled_months,months_since_status_change,confirmed_bookings";

fn csv_field(raw: &str) -> String {
    if raw.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the header and one line per row. Nulls are empty fields.
pub fn write_rows<W: Write>(writer: &mut W, rows: &[OutputRow]) -> PipelineResult<()> {
    writeln!(writer, "{OUTPUT_HEADER}")?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            csv_field(row.sub_id.as_str()),
            row.status,
            row.dates,
            optional(row.months_since_first_subscription),
            row.active_months,
            row.canceled_months,
            optional(row.months_since_status_change),
            row.confirmed_bookings,
        )?;
    }
    Ok(())
}

pub fn write_csv(path: &Path, rows: &[OutputRow]) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_rows(&mut writer, rows)?;
    writer.flush()?;
    log::info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
