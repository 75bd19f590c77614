use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Origin of an indexed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Repository,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Local => "local",
            SourceType::Repository => "repository",
        }
    }
}

/// One file or directory as stored alongside its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedItem {
    pub relative_path: String,
    pub full_path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Seconds since the Unix epoch.
    pub modified_time: f64,
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

impl IndexedItem {
    /// Deterministic store id: the source-type prefix keeps local and remote ids apart.
    pub fn id(&self) -> String {
        match (&self.source_type, &self.repo_url) {
            (SourceType::Repository, Some(repo)) => {
                format!("repo::{}::{}", repo, self.relative_path)
            }
            _ => format!("local::{}", self.full_path),
        }
    }

    pub fn to_metadata(&self) -> HashMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }

    pub fn from_metadata(meta: &HashMap<String, serde_json::Value>) -> Option<Self> {
        let map: serde_json::Map<String, serde_json::Value> =
            meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::from_value(serde_json::Value::Object(map)).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::File => "📄 File",
            ItemKind::Folder => "📁 Folder",
        }
    }
}

/// A ranked hit returned by the query engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// `1 - cosine distance`, not clamped.
    pub similarity: f32,
    pub path: String,
    pub full_path: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub size: Option<u64>,
    pub modified: DateTime<Local>,
}

impl SearchResult {
    pub fn type_label(&self) -> &'static str {
        self.kind.label()
    }
}

/// Converts a stored epoch value to local time; out-of-range values fall back to the epoch.
pub fn timestamp_to_local(epoch_secs: f64) -> DateTime<Local> {
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    Local
        .timestamp_opt(secs as i64, nanos)
        .single()
        .unwrap_or_else(|| DateTime::<Local>::from(std::time::UNIX_EPOCH))
}
