// Session Log Tests
// File naming, directory creation and row accounting

use proberelay::record::Record;
use proberelay::storage::{SessionLog, StorageError, CSV_HEADER};
use tempfile::TempDir;

#[test]
fn test_create_makes_directory_and_named_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("nested").join("macs_csv");

    let log = SessionLog::create(&dir).unwrap();

    assert!(dir.is_dir());
    let name = log.path().file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("macs_"));
    assert!(name.ends_with(".csv"));
    // macs_YYYY-mm-dd_HH-MM-SS.csv
    assert_eq!(name.len(), "macs_2025-09-15_16-35-10.csv".len());

    let content = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(content, format!("{}\n", CSV_HEADER));
}

#[test]
fn test_n_records_n_rows() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::create(temp_dir.path()).unwrap();

    for i in 0..25 {
        log.append(&Record::wifi(&format!("mac{}", i), -50, 5, "t")).unwrap();
    }

    assert_eq!(log.rows_written(), 25);
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(content.lines().count(), 26);
}

#[test]
fn test_rows_are_flushed_immediately() {
    let temp_dir = TempDir::new().unwrap();
    let log = SessionLog::open(temp_dir.path().join("live.csv")).unwrap();

    log.append(&Record::ble("11:22:33:44:55:66", -81, "2025-09-15 16:35:12")).unwrap();

    // Still open; the row must already be on disk
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(content.ends_with("BLE-11:22:33:44:55:66,-81,,2025-09-15 16:35:12\n"));
}

#[test]
fn test_create_fails_on_file_in_the_way() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("macs_csv");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let result = SessionLog::create(&blocker);
    assert!(matches!(result, Err(StorageError::CreateDirFailed { .. })));
}
