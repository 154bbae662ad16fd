// Privilege Check
// Capture and interface provisioning need root

use thiserror::Error;

const PROC_STATUS: &str = "/proc/self/status";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeError {
    #[error("Root privileges required (effective uid {0})")]
    NotRoot(u32),

    #[error("Cannot determine effective uid: {0}")]
    Unknown(String),
}

/// Effective uid from a `/proc/<pid>/status` body.
///
/// The `Uid:` line lists real, effective, saved and filesystem ids; the
/// second field is the effective one.
pub fn parse_effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|euid| euid.parse().ok())
}

/// Effective uid of this process
pub fn effective_uid() -> Result<u32, PrivilegeError> {
    let status = std::fs::read_to_string(PROC_STATUS)
        .map_err(|e| PrivilegeError::Unknown(format!("{}: {}", PROC_STATUS, e)))?;
    parse_effective_uid(&status)
        .ok_or_else(|| PrivilegeError::Unknown(format!("{}: no Uid line", PROC_STATUS)))
}

/// Fail unless running as root; a no-op when `required` is false
pub fn ensure_root(required: bool) -> Result<(), PrivilegeError> {
    if !required {
        return Ok(());
    }
    match effective_uid()? {
        0 => Ok(()),
        uid => Err(PrivilegeError::NotRoot(uid)),
    }
}
