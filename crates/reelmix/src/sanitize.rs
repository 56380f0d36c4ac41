//! Helpers for sanitizing names before they reach the filesystem or
//! tracing span attributes.

use std::path::{Component, Path};

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name, not the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Maps a client-supplied name onto `[A-Za-z0-9_-]`, replacing every other
/// character with `_`. Returns `None` if the name has no character from
/// that set.
pub fn file_component(name: &str) -> Option<String> {
    let name = name.trim();
    if !name.chars().any(is_component_char) {
        return None;
    }
    let cleaned: String = name
        .chars()
        .map(|c| if is_component_char(c) { c } else { '_' })
        .collect();
    Some(cleaned)
}

fn is_component_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// True when `name` is a single normal path component: no separators,
/// no `.`/`..`, not absolute.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
