//! Time and logging leaves (spec.md §4.1).
//!
//! These are the bottom of the dependency graph: nothing else in this
//! crate calls into anything but the standard library and `tracing` from
//! here, so it is safe to call from inside any other lock in the crate
//! (spec.md §5 lock inventory item 6: "Logger lock is a leaf").

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock time, second granularity. Used throughout the pool
/// and cache for `lastUseTime`/`lastActTime`/TTL bookkeeping.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Seconds elapsed since `since`, saturating at zero if the clock moved
/// backwards (so callers never see a negative duration).
pub fn elapsed_secs(since: u64) -> u64 {
    now_secs().saturating_sub(since)
}

/// Splits an absolute path into (dirname, basename). The root's dirname
/// is `"/"`; a trailing slash on the input is stripped first.
pub fn split_path(path: &str) -> (String, String) {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

/// Joins a directory and a child name into a normalized absolute path.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" || dir.is_empty() {
        format!("/{name}")
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// The final path component, with no trailing slash.
pub fn basename(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rsplit_once('/') {
        Some((_, name)) => name,
        None => trimmed,
    }
}

/// Logs a debug-level message. Thin wrapper so call sites read like the
/// spec's "guarded formatted writer" without actually taking a lock —
/// `tracing`'s global dispatcher already serializes writers, and every
/// call site in this crate is required to make this call with no other
/// lock in this crate held (see module docs).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

/// Logs an error-level message carrying a status code, mirroring the
/// spec's "error variant carries a status code".
#[macro_export]
macro_rules! log_error {
    ($status:expr, $($arg:tt)*) => {
        tracing::error!(status = $status, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_root_child() {
        assert_eq!(split_path("/a"), ("/".to_string(), "a".to_string()));
    }

    #[test]
    fn split_path_nested() {
        assert_eq!(
            split_path("/zone/home/u/a"),
            ("/zone/home/u".to_string(), "a".to_string())
        );
    }

    #[test]
    fn split_path_trailing_slash() {
        assert_eq!(
            split_path("/zone/home/u/"),
            ("/zone/home".to_string(), "u".to_string())
        );
    }

    #[test]
    fn join_path_root() {
        assert_eq!(join_path("/", "a"), "/a");
    }

    #[test]
    fn join_path_nested() {
        assert_eq!(join_path("/zone/home", "u"), "/zone/home/u");
    }

    #[test]
    fn basename_simple() {
        assert_eq!(basename("/zone/home/u/a"), "a");
    }

    #[test]
    fn elapsed_never_negative() {
        let future = now_secs() + 100;
        assert_eq!(elapsed_secs(future), 0);
    }
}
