//! Keeps upload locations out of span attributes and progress events.

use std::path::Path;

/// Returns only the file name component of a path.
///
/// Upload directories can reveal user names or mount points; file names are
/// enough to correlate a task with its log lines.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
