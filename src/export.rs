use crate::aggregator::CalendarEvent;
use crate::error::ExportError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Serialize)]
struct EventCsvRecord<'a> {
    id: &'a str,
    title: &'a str,
    date: String,
}

impl<'a> From<&'a CalendarEvent> for EventCsvRecord<'a> {
    fn from(event: &'a CalendarEvent) -> Self {
        Self {
            id: &event.id,
            title: &event.title,
            date: event.date.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Deserialize)]
struct DateCsvRecord {
    date: String,
}

pub fn write_events_csv<W: Write>(events: &[CalendarEvent], writer: W) -> ExportResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for event in events {
        writer.serialize(EventCsvRecord::from(event))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_events_to_csv<P: AsRef<Path>>(events: &[CalendarEvent], path: P) -> ExportResult<()> {
    let file = File::create(path)?;
    write_events_csv(events, file)
}

/// Reads a CSV with a `date` column (`YYYY-MM-DD`); blank cells are skipped.
pub fn read_dates_csv<R: Read>(reader: R) -> ExportResult<Vec<NaiveDate>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut dates = Vec::new();
    for record in reader.deserialize::<DateCsvRecord>() {
        let record = record?;
        if let Some(date) = parse_date(&record.date)? {
            dates.push(date);
        }
    }
    Ok(dates)
}

pub fn load_dates_from_csv<P: AsRef<Path>>(path: P) -> ExportResult<Vec<NaiveDate>> {
    let file = File::open(path)?;
    read_dates_csv(file)
}

fn parse_date(input: &str) -> ExportResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| ExportError::InvalidData(format!("invalid date '{input}': {e}")))
}
