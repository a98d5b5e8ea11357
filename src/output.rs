//! Report rendering and CSV persistence for readings.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::stats::{Reading, TripExtreme};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

const RULE: &str = "------------------------------------------------------------";

/// Formats a duration in seconds as `HH:MM:SS`, truncating fractions.
/// Negative or non-finite input renders as zero.
pub fn secs_to_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Renders a reading as a human-readable console report.
///
/// Times print as `HH:MM:SS`, distances in kilometers.
pub fn render_report(location_name: &str, reading: &Reading) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "{location_name}: {} trips sampled at {}\n",
        reading.trips,
        reading.time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "{:<18}{}\n",
        "average time",
        secs_to_clock(reading.average_time)
    ));
    out.push_str(&format!(
        "{:<18}{}\n",
        "total time",
        secs_to_clock(reading.total_time)
    ));
    out.push_str(&format!(
        "{:<18}{:.2} km\n",
        "average distance",
        reading.average_distance / 1000.0
    ));
    out.push_str(&format!(
        "{:<18}{:.2} km\n",
        "total distance",
        reading.total_distance / 1000.0
    ));
    out.push('\n');
    out.push_str(&time_extreme_line("fastest trip", &reading.min_time));
    out.push_str(&time_extreme_line("slowest trip", &reading.max_time));
    out.push_str(&distance_extreme_line("shortest trip", &reading.min_distance));
    out.push_str(&distance_extreme_line("longest trip", &reading.max_distance));
    out.push_str(RULE);
    out.push('\n');
    out
}

fn time_extreme_line(label: &str, extreme: &TripExtreme) -> String {
    format!(
        "{:<18}{}  ({:.2} km)\n  {} -> {}\n",
        label,
        secs_to_clock(extreme.value),
        extreme.paired / 1000.0,
        extreme.from,
        extreme.to
    )
}

fn distance_extreme_line(label: &str, extreme: &TripExtreme) -> String {
    format!(
        "{:<18}{:.2} km  ({})\n  {} -> {}\n",
        label,
        extreme.value / 1000.0,
        secs_to_clock(extreme.paired),
        extreme.from,
        extreme.to
    )
}

/// Prints a reading's report to stdout.
pub fn print_report(location_name: &str, reading: &Reading) {
    println!("{}", render_report(location_name, reading));
}

/// Flat CSV row for one reading. Extremes are reduced to their values.
#[derive(Debug, Serialize)]
pub struct ReadingRow {
    pub location: String,
    pub time: DateTime<Utc>,
    pub trips: usize,
    pub average_time: f64,
    pub average_distance: f64,
    pub total_time: f64,
    pub total_distance: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl ReadingRow {
    pub fn new(location: &str, reading: &Reading) -> Self {
        Self {
            location: location.to_string(),
            time: reading.time,
            trips: reading.trips,
            average_time: reading.average_time,
            average_distance: reading.average_distance,
            total_time: reading.total_time,
            total_distance: reading.total_distance,
            min_time: reading.min_time.value,
            max_time: reading.max_time.value,
            min_distance: reading.min_distance.value,
            max_distance: reading.max_distance.value,
        }
    }
}

/// Appends a [`ReadingRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, row: &ReadingRow) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}
