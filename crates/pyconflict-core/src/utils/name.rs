//! Distribution name handling.
//!
//! Names are compared in their PEP 503 normalized form: lowercase, with every
//! run of `-`, `_` and `.` collapsed to a single `-`.

/// Normalize a distribution name (`Foo.Bar__baz` -> `foo-bar-baz`)
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push('-');
        }
        pending_separator = false;
        normalized.push(c.to_ascii_lowercase());
    }

    normalized
}

/// Check if this is a valid distribution name
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        },
        _ => false,
    }
}
