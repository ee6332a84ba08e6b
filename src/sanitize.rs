//! Filesystem-safe path segments
//!
//! Remote names are arbitrary strings. Each one becomes exactly one path
//! segment on disk, so sanitization always works on a single segment and never
//! on a joined path.

/// Longest segment produced, in bytes
pub const MAX_SEGMENT_BYTES: usize = 255;

/// Replacement for names that sanitize to nothing
pub const PLACEHOLDER_NAME: &str = "unnamed_file";

/// Characters rejected by at least one common filesystem
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a single remote name safe to use as one path segment
///
/// - Replaces `< > : " / \ | ? *` and control characters with `_`
/// - Trims leading and trailing dots and spaces
/// - Truncates to [`MAX_SEGMENT_BYTES`] bytes, keeping the extension
/// - Falls back to [`PLACEHOLDER_NAME`] if nothing is left
///
/// # Examples
///
/// ```
/// use pdm_backup::sanitize::sanitize_name;
///
/// assert_eq!(sanitize_name("bracket<v2>.step"), "bracket_v2_.step");
/// assert_eq!(sanitize_name("notes. . "), "notes");
/// assert_eq!(sanitize_name(".."), "unnamed_file");
/// ```
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let mut sanitized = trim_dots_and_spaces(&replaced).to_string();

    if sanitized.len() > MAX_SEGMENT_BYTES {
        sanitized = truncate_keeping_extension(&sanitized);
    }

    if sanitized.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        sanitized
    }
}

fn trim_dots_and_spaces(s: &str) -> &str {
    s.trim_matches(['.', ' '])
}

/// Shorten `name` to the byte limit, cutting the stem rather than the extension
fn truncate_keeping_extension(name: &str) -> String {
    let (stem, ext) = split_extension(name);

    if ext.len() >= MAX_SEGMENT_BYTES {
        return trim_dots_and_spaces(floor_to_char_boundary(name, MAX_SEGMENT_BYTES)).to_string();
    }

    let stem = floor_to_char_boundary(stem, MAX_SEGMENT_BYTES - ext.len());
    format!("{stem}{ext}")
}

/// Split at the last dot, ignoring a dot in first position (`.bashrc` has no extension)
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character
fn floor_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
