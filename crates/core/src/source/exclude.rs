//! Exclusion rules shared by local and repository sources.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directory names never descended into during a local walk.
pub const LOCAL_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".vscode",
    "node_modules",
    ".idea",
    ".semantic-explorer",
];

pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    "lock", "log", "env", "so", "o", "a", "dll", "exe", "ipynb", "svg", "png", "jpg", "jpeg",
    "gif", "webp", "ico", "woff", "woff2", "ttf", "eot", "otf",
];

/// Compared case-insensitively.
pub const EXCLUDED_FILENAMES: &[&str] = &[".gitignore", ".ds_store", ".gitattributes", ".env"];

/// Directory patterns matched on segment boundaries of `path + "/"`.
pub const EXCLUDED_PATTERNS: &[&str] = &[
    "__pycache__/",
    ".git/",
    "node_modules/",
    "dist/",
    "build/",
    ".vscode/",
    ".idea/",
];

/// Filename and extension denylist only.
pub fn is_excluded_file_name(path: &str) -> bool {
    let p = Path::new(path);
    let name = p
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if EXCLUDED_FILENAMES.contains(&name.as_str()) {
        return true;
    }
    p.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|ext| EXCLUDED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Full repository rule: filename, extension, and directory patterns.
pub fn is_excluded(path: &str) -> bool {
    if is_excluded_file_name(path) {
        return true;
    }
    let normalized = format!("/{}/", path.replace('\\', "/").trim_matches('/'));
    EXCLUDED_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(&format!("/{pattern}")))
}

pub fn is_local_excluded_dir(name: &str) -> bool {
    LOCAL_EXCLUDED_DIRS.contains(&name)
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
