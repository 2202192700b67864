//! Export of complaint listings

mod common;

use citycare::export::{write_complaints, write_complaints_to_file, ExportFormat, CSV_HEADER};
use citycare::models::UserId;
use citycare::{Complaint, ComplaintFilter};
use common::*;
use tempfile::tempdir;

fn sample() -> Vec<Complaint> {
    let h = harness();
    let a = h.service.submit(&citizen(11), submission(11.0168, 76.9558)).unwrap().complaint;
    h.service.submit(&citizen(12), submission(11.0168, 76.9559)).unwrap();
    h.service.assign(&officer(), &a.complaint_id, UserId(WORKER_NEAR)).unwrap();
    h.service.submit(&citizen(13), submission(11.0045, 76.9616)).unwrap();
    h.service.list_complaints(&ComplaintFilter::default()).unwrap()
}

#[test]
fn test_csv_has_header_and_one_row_per_complaint() {
    let complaints = sample();
    let mut out = Vec::new();
    write_complaints(&complaints, ExportFormat::Csv, &mut out).unwrap();

    let mut reader = csv::Reader::from_reader(out.as_slice());
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, CSV_HEADER.to_vec());

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], complaints[0].complaint_id.as_str());
    assert_eq!(&rows[0][1], "ASSIGNED");
    assert_eq!(&rows[0][3], "2");
    assert_eq!(&rows[0][7], "7");
    assert_eq!(&rows[1][7], "");
}

#[test]
fn test_json_lists_full_records() {
    let complaints = sample();
    let mut out = Vec::new();
    write_complaints(&complaints, ExportFormat::Json, &mut out).unwrap();

    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["status"], "ASSIGNED");
    assert_eq!(items[0]["duplicate_links"].as_array().unwrap().len(), 1);
}

#[test]
fn test_file_export_creates_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports/2026/complaints.csv");
    write_complaints_to_file(&sample(), ExportFormat::Csv, &path).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().starts_with("Complaint ID,Status"));
}

#[test]
fn test_format_parsing() {
    assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    assert!("txt".parse::<ExportFormat>().is_err());
}
