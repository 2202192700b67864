//! Complaint listings as CSV or JSON.
//!
//! The CSV layout is one row per complaint with a fixed header; duplicate
//! reports are summarised as a count. JSON output is the full complaint record.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use csv::Writer;

use crate::error::{CoreError, Result};
use crate::models::Complaint;

/// Header row of the CSV export
pub const CSV_HEADER: [&str; 12] = [
    "Complaint ID",
    "Status",
    "Urgency",
    "Reports",
    "Latitude",
    "Longitude",
    "Address",
    "Assigned Worker",
    "Resolved By",
    "Rejection Reason",
    "Created",
    "Last Status Change",
];

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Json => "json",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(CoreError::Validation(format!("unknown export format: {other}"))),
        }
    }
}

fn write_failed(e: impl fmt::Display) -> CoreError {
    CoreError::StorageUnavailable(format!("export failed: {e}"))
}

/// Write complaints to `file_path`, creating parent directories as needed.
pub fn write_complaints_to_file(complaints: &[Complaint], format: ExportFormat, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let file = File::create(file_path)?;
    let mut writer = BufWriter::new(file);
    write_complaints(complaints, format, &mut writer)?;
    writer.flush()?;
    tracing::info!(
        path = %file_path.display(),
        format = %format,
        complaints = complaints.len(),
        "Complaints exported"
    );
    Ok(())
}

/// Write complaints to any writer.
pub fn write_complaints<W: Write>(complaints: &[Complaint], format: ExportFormat, writer: W) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(complaints, writer),
        ExportFormat::Json => serde_json::to_writer_pretty(writer, complaints).map_err(write_failed),
    }
}

fn write_csv<W: Write>(complaints: &[Complaint], writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(CSV_HEADER).map_err(write_failed)?;

    let optional = |value: Option<String>| value.unwrap_or_default();
    for c in complaints {
        writer
            .write_record([
                c.complaint_id.clone(),
                c.status.to_string(),
                c.urgency_level.to_string(),
                c.report_count().to_string(),
                c.coordinates.lat.to_string(),
                c.coordinates.lon.to_string(),
                optional(c.location_address.clone()),
                optional(c.assigned_worker.map(|w| w.to_string())),
                optional(c.resolved_by.map(|w| w.to_string())),
                optional(c.rejection_reason.clone()),
                c.created_at.to_rfc3339(),
                c.last_status_change_at.to_rfc3339(),
            ])
            .map_err(write_failed)?;
    }

    writer.flush()?;
    Ok(())
}
