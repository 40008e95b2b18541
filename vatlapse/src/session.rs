//! Session naming and output directory allocation.
//!
//! Each run writes into its own directory under the configured output root.
//! The operator-supplied name is sanitized to a filesystem-safe form, and
//! collisions with earlier runs get a numeric `-NNN` suffix instead of
//! clobbering existing frames.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

/// Reduce an operator-supplied session name to `[A-Za-z0-9_-]`.
///
/// Spaces become underscores, anything else outside the set is dropped, and a
/// name with nothing left falls back to `"session"`.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}

/// Create and return `<root>/<name>`, or the first free `<root>/<name>-NNN`
/// when the plain name is taken.
///
/// # Errors
/// Directory creation failures, or more than 999 suffixed directories already
/// existing for this name.
pub fn allocate_session_dir(root: &Path, name: &str) -> Result<PathBuf> {
    let base = root.join(name);
    if !base.exists() {
        std::fs::create_dir_all(&base)
            .with_context(|| format!("failed to create session directory '{}'", base.display()))?;
        info!(dir = %base.display(), "Session directory created");
        return Ok(base);
    }

    for i in 1..=999u32 {
        let candidate = root.join(format!("{name}-{i:03}"));
        if !candidate.exists() {
            std::fs::create_dir_all(&candidate).with_context(|| {
                format!("failed to create session directory '{}'", candidate.display())
            })?;
            info!(dir = %candidate.display(), "Session directory created");
            return Ok(candidate);
        }
    }
    bail!("no free session directory under '{}' for name '{name}'", root.display());
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── sanitize_name ─────────────────────────────────────────────────────────

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(sanitize_name("My Print 01"), "My_Print_01");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(sanitize_name("  padded \t"), "padded");
    }

    #[test]
    fn disallowed_characters_are_dropped() {
        assert_eq!(sanitize_name("weird!@#name"), "weirdname");
        assert_eq!(sanitize_name("übung"), "bung");
        assert_eq!(sanitize_name("print-01_final"), "print-01_final");
    }

    #[test]
    fn empty_results_fall_back_to_session() {
        assert_eq!(sanitize_name(""), "session");
        assert_eq!(sanitize_name("   "), "session");
        assert_eq!(sanitize_name("!!!"), "session");
    }

    // ── allocate_session_dir ──────────────────────────────────────────────────

    #[test]
    fn first_allocation_uses_the_plain_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = allocate_session_dir(root.path(), "print").unwrap();
        assert_eq!(dir, root.path().join("print"));
        assert!(dir.is_dir());
    }

    #[test]
    fn collisions_get_ascending_numeric_suffixes() {
        let root = tempfile::tempdir().unwrap();
        let a = allocate_session_dir(root.path(), "print").unwrap();
        let b = allocate_session_dir(root.path(), "print").unwrap();
        let c = allocate_session_dir(root.path(), "print").unwrap();
        assert_eq!(a, root.path().join("print"));
        assert_eq!(b, root.path().join("print-001"));
        assert_eq!(c, root.path().join("print-002"));
        assert!(b.is_dir() && c.is_dir());
    }

    #[test]
    fn missing_root_is_created_on_demand() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("captures");
        let dir = allocate_session_dir(&nested, "print").unwrap();
        assert_eq!(dir, nested.join("print"));
        assert!(dir.is_dir());
    }
}
