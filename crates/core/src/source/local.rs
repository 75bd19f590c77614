//! Walks a local directory tree and turns its entries into indexable items.

use super::exclude::{is_excluded_file_name, is_local_excluded_dir};
use super::{LoadedItem, SourceError};
use crate::cancel::CancelFlag;
use crate::models::{IndexedItem, SourceType};
use globset::GlobSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::{DirEntry, WalkDir};

const BINARY_PROBE_BYTES: u64 = 1024;

#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    excludes: GlobSet,
    snippet_chars: usize,
}

/// Result of a walk: `None` entries means the walk observed cancellation.
pub type WalkResult = Option<Vec<PathBuf>>;

impl LocalSource {
    pub fn open(root: &str, excludes: GlobSet, snippet_chars: usize) -> Result<Self, SourceError> {
        let path = Path::new(root);
        if !path.is_dir() {
            return Err(SourceError::InvalidLocalPath);
        }
        let root = fs::canonicalize(path).map_err(|_| SourceError::InvalidLocalPath)?;
        Ok(Self {
            root,
            excludes,
            snippet_chars,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collects every non-excluded directory and file below the root, sorted by name per level.
    pub fn walk(&self, cancel: &CancelFlag) -> WalkResult {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep(e));

        let mut paths = Vec::new();
        for entry in walker {
            if cancel.is_cancelled() {
                return None;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            paths.push(entry.into_path());
        }
        Some(paths)
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            if is_local_excluded_dir(&name) {
                return false;
            }
        } else if is_excluded_file_name(&name) {
            return false;
        }
        match entry.path().strip_prefix(&self.root) {
            Ok(rel) if !self.excludes.is_empty() => !self.excludes.is_match(rel),
            _ => true,
        }
    }

    pub fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Stats `path` and reads a snippet for files. `None` when the entry vanished or is unreadable.
    pub fn load(&self, path: &Path) -> Option<LoadedItem> {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "stat failed, skipping");
                return None;
            }
        };
        let modified_time = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let is_dir = meta.is_dir();
        let item = IndexedItem {
            relative_path: self.relative_path(path),
            full_path: path.to_string_lossy().to_string(),
            is_dir,
            size_bytes: if is_dir { None } else { Some(meta.len()) },
            modified_time,
            source_type: SourceType::Local,
            repo_url: None,
        };
        let content = if is_dir {
            None
        } else {
            Some(read_snippet(path, self.snippet_chars))
        };
        Some(LoadedItem { item, content })
    }

    pub fn load_batch(&self, paths: &[PathBuf]) -> Vec<LoadedItem> {
        paths.iter().filter_map(|p| self.load(p)).collect()
    }
}

/// First `max_chars` characters of a text file. Empty for binaries or unreadable files.
pub fn read_snippet(path: &Path, max_chars: usize) -> String {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return String::new(),
    };
    let budget = (max_chars as u64).saturating_mul(4).max(BINARY_PROBE_BYTES);
    let mut buf = Vec::new();
    if file.take(budget).read_to_end(&mut buf).is_err() {
        return String::new();
    }
    let probe = buf.len().min(BINARY_PROBE_BYTES as usize);
    if buf[..probe].contains(&0) {
        return String::new();
    }
    String::from_utf8_lossy(&buf).chars().take(max_chars).collect()
}
