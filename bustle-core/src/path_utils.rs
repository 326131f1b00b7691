//! Cross-platform path utilities
//!
//! Windows paths use backslashes (`\`) while Godot resource paths always use
//! forward slashes (`/`). These helpers keep mod-relative paths normalized so
//! the same class map produces the same `res://` paths on every platform.

use std::path::{Component, Path, PathBuf};

/// Normalize path to forward slashes
#[inline]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Convert a path to a normalized string
#[inline]
pub fn path_to_string(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Append suffix to path, return normalized string
#[inline]
pub fn path_with_suffix(path: &Path, suffix: &str) -> String {
    format!("{}{}", path_to_string(path), suffix)
}

/// Create PathBuf from path + suffix
#[inline]
pub fn pathbuf_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(path_with_suffix(path, suffix))
}

/// Path of `full_path` relative to `base_dir`, with forward slashes
///
/// Falls back to the whole (normalized) path when `full_path` is not under
/// `base_dir`.
pub fn make_relative_path(full_path: &Path, base_dir: &Path) -> String {
    match full_path.strip_prefix(base_dir) {
        Ok(relative) => path_to_string(relative),
        Err(_) => path_to_string(full_path),
    }
}

/// Godot resource path of a mod file: `res://<mod>/<relative>`
pub fn resource_path(mod_name: &str, relative_path: &str) -> String {
    format!("res://{}/{}", mod_name, normalize_path(relative_path).trim_start_matches('/'))
}

/// Whether `test_path` may be written to without touching `base_path`
///
/// A destination is unsafe if it is the base directory itself or lies inside
/// it.
pub fn dest_is_safe(base_path: &Path, test_path: &Path) -> bool {
    let base = resolve(base_path);
    let test = resolve(test_path);
    !(base == test || test.starts_with(&base))
}

/// Absolute, lexically normalized form of `path` (no filesystem access)
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}
