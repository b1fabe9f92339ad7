//! CSV ingestion for the subscriptions and bookings sources.
//!
//! Columns are looked up by header name; extra columns (such as an unnamed
//! leading index) are ignored. A quoted field may span lines; the record is
//! reported at the line where it starts. Any unreadable row, including one
//! that is not valid UTF-8, aborts ingestion before processing starts.

use crate::{
    error::{PipelineError, PipelineResult},
    month::parse_date,
    record::{BookingEvent, SubscriptionRecord},
    types::SubscriberId,
};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const SUBSCRIPTIONS_SOURCE: &str = "subscriptions";
pub const BOOKINGS_SOURCE: &str = "bookings";

/// Split one CSV line. Double-quoted fields may contain commas, and a
/// doubled quote inside a quoted field is a literal quote.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// True when `record` ends inside a quoted field, using the same quote rules
/// as [`split_csv_line`].
fn has_open_quote(record: &str) -> bool {
    let mut in_quotes = false;
    let mut field_empty = true;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field_empty = false;
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field_empty => in_quotes = true,
            (',', false) => field_empty = true,
            _ => field_empty = false,
        }
    }
    in_quotes
}

struct CsvTable {
    source_name: String,
    header:      Vec<String>,
    /// (1-based line number, fields)
    rows:        Vec<(usize, Vec<String>)>,
}

impl CsvTable {
    fn read<R: BufRead>(reader: R, source_name: &str) -> PipelineResult<Self> {
        let mut header: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        // Record still inside an open quote: (starting line, text so far).
        let mut pending: Option<(usize, String)> = None;

        for (idx, line_res) in reader.lines().enumerate() {
            let line = match line_res {
                Ok(line) => line,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    return Err(PipelineError::MalformedInput {
                        source_name: source_name.to_string(),
                        line:        idx + 1,
                        reason:      "invalid UTF-8".into(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            let (line_no, record) = match pending.take() {
                Some((start, mut text)) => {
                    text.push('\n');
                    text.push_str(&line);
                    (start, text)
                }
                None if line.trim().is_empty() => continue,
                None => (idx + 1, line),
            };
            if has_open_quote(&record) {
                pending = Some((line_no, record));
                continue;
            }
            let fields = split_csv_line(&record);
            if header.is_none() {
                header = Some(
                    fields
                        .iter()
                        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
                        .collect(),
                );
            } else {
                rows.push((line_no, fields));
            }
        }
        if let Some((start, _)) = pending {
            return Err(PipelineError::MalformedInput {
                source_name: source_name.to_string(),
                line:        start,
                reason:      "unterminated quoted field".into(),
            });
        }

        let header = header.ok_or_else(|| PipelineError::MalformedInput {
            source_name: source_name.to_string(),
            line:        0,
            reason:      "empty input, no header row".into(),
        })?;

        Ok(Self { source_name: source_name.to_string(), header, rows })
    }

    fn column(&self, name: &str) -> PipelineResult<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                source_name: self.source_name.clone(),
                column:      name.to_string(),
            })
    }

    fn malformed(&self, line: usize, reason: String) -> PipelineError {
        PipelineError::MalformedInput {
            source_name: self.source_name.clone(),
            line,
            reason,
        }
    }

    /// Fetch the named columns of one row, trimmed.
    fn fields<'a>(
        &self,
        line: usize,
        fields: &'a [String],
        columns: &[(usize, &str)],
    ) -> PipelineResult<Vec<&'a str>> {
        columns
            .iter()
            .map(|&(i, name)| {
                fields
                    .get(i)
                    .map(|f| f.trim())
                    .ok_or_else(|| self.malformed(line, format!("missing value for '{name}'")))
            })
            .collect()
    }

    fn subscriber_id(&self, line: usize, raw: &str) -> PipelineResult<SubscriberId> {
        if raw.is_empty() {
            return Err(self.malformed(line, "empty subscriber id".into()));
        }
        Ok(SubscriberId::new(raw))
    }

    fn date(&self, line: usize, raw: &str) -> PipelineResult<chrono::NaiveDate> {
        parse_date(raw).ok_or_else(|| self.malformed(line, format!("unparseable date '{raw}'")))
    }
}

/// Read subscription rows (`sub_id`, `status`, `dates`).
pub fn parse_subscriptions<R: BufRead>(reader: R, source_name: &str) -> PipelineResult<Vec<SubscriptionRecord>> {
    let table = CsvTable::read(reader, source_name)?;
    let columns = [
        (table.column("sub_id")?, "sub_id"),
        (table.column("status")?, "status"),
        (table.column("dates")?, "dates"),
    ];

    let mut records = Vec::with_capacity(table.rows.len());
    for (line, fields) in &table.rows {
        let values = table.fields(*line, fields, &columns)?;
        records.push(SubscriptionRecord {
            subscriber_id: table.subscriber_id(*line, values[0])?,
            status:        values[1].to_string(),
            date:          table.date(*line, values[2])?,
        });
    }
    Ok(records)
}

/// Read booking rows (`subscriber_id`, `booking_date`, `booking_status`).
pub fn parse_bookings<R: BufRead>(reader: R, source_name: &str) -> PipelineResult<Vec<BookingEvent>> {
    let table = CsvTable::read(reader, source_name)?;
    let columns = [
        (table.column("subscriber_id")?, "subscriber_id"),
        (table.column("booking_date")?, "booking_date"),
        (table.column("booking_status")?, "booking_status"),
    ];

    let mut events = Vec::with_capacity(table.rows.len());
    for (line, fields) in &table.rows {
        let values = table.fields(*line, fields, &columns)?;
        events.push(BookingEvent {
            subscriber_id:  table.subscriber_id(*line, values[0])?,
            booked_on:      table.date(*line, values[1])?,
            booking_status: values[2].to_string(),
        });
    }
    Ok(events)
}

pub fn read_subscriptions(path: &Path) -> PipelineResult<Vec<SubscriptionRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let records = parse_subscriptions(reader, SUBSCRIPTIONS_SOURCE)?;
    log::info!("read {} subscription rows from {}", records.len(), path.display());
    Ok(records)
}

pub fn read_bookings(path: &Path) -> PipelineResult<Vec<BookingEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let events = parse_bookings(reader, BOOKINGS_SOURCE)?;
    log::info!("read {} booking events from {}", events.len(), path.display());
    Ok(events)
}
