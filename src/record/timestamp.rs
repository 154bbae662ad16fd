// Wall-clock stamps for records and session files

use chrono::Local;

/// Format of the timestamp carried by every record
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used in session file names
pub const SESSION_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Current local time as a record timestamp
pub fn wall_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time formatted for a session file name
pub fn session_stamp() -> String {
    Local::now().format(SESSION_STAMP_FORMAT).to_string()
}
