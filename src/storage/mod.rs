// Storage module - PERSISTENCE
// Per-session CSV log of every record, independent of delivery

mod session_log;

pub use session_log::{SessionLog, StorageConfig, StorageError, CSV_HEADER};
