//! Helpers for file names coming from mail sources and for log output.
//!
//! Attachment names are untrusted: they may carry directory parts from the
//! sender's machine. Log events only ever show the last path component.

use std::path::Path;

/// Fallback used when an attachment name has no usable file name.
pub const UNNAMED_ATTACHMENT: &str = "unnamed";

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips any directory part from an attachment name.
///
/// Both `/` and `\` count as separators, whatever the platform.
pub fn attachment_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "" | "." | ".." => UNNAMED_ATTACHMENT.to_string(),
        other => other.to_string(),
    }
}

/// Splits `name` into stem and extension (dot included).
///
/// A leading dot does not start an extension, so `.env` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&name[..dot_pos], &name[dot_pos..]),
        _ => (name, ""),
    }
}
