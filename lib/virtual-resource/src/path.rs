//! Absolute resource path helpers.
//!
//! Resource paths are `/`-separated strings. A normalized path is absolute,
//! contains no empty, `.` or `..` segments and carries no trailing slash
//! except for the root path `/` itself.

use smallvec::SmallVec;

pub const ROOT: &str = "/";

#[inline]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Normalize an absolute path, returning `None` for relative paths and for
/// paths whose `..` segments would escape the root.
pub fn normalize(path: &str) -> Option<String> {
    if !is_absolute(path) {
        return None;
    }

    let mut stack: SmallVec<[&str; 8]> = SmallVec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        return Some(ROOT.to_string());
    }

    let mut normalized = String::with_capacity(path.len());
    for segment in stack {
        normalized.push('/');
        normalized.push_str(segment);
    }
    Some(normalized)
}

/// Iterate over the non-empty segments of `path`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Logical parent of `path`; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Last segment of `path`; empty for the root.
pub fn name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

pub fn join(parent: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    let mut joined = String::with_capacity(parent.len() + name.len() + 1);
    joined.push_str(parent.trim_end_matches('/'));
    joined.push('/');
    joined.push_str(name);
    joined
}

/// Whether `path` lies strictly beneath `ancestor`.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    if ancestor == ROOT {
        return path.len() > 1 && is_absolute(path);
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}
