#![allow(dead_code)]

use explorer_core::config::{RemoteConfig, ScanConfig};
use explorer_core::vectorstore::{InMemoryVectorStore, VectorStore};
use explorer_core::{ExplorerSettings, ProgressReporter, SemanticExplorer};
use futures::StreamExt;
use providers::hashing::HashingProvider;
use std::path::Path;
use std::sync::Arc;

pub fn explorer_with(scan: ScanConfig, remote: RemoteConfig) -> (SemanticExplorer, Arc<InMemoryVectorStore>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let explorer = SemanticExplorer::new(
        store.clone() as Arc<dyn VectorStore>,
        Arc::new(HashingProvider::new(128)),
        ExplorerSettings { scan, remote },
    )
    .unwrap();
    (explorer, store)
}

pub fn explorer() -> (SemanticExplorer, Arc<InMemoryVectorStore>) {
    explorer_with(ScanConfig::default(), RemoteConfig::default())
}

pub async fn run_index(
    explorer: &SemanticExplorer,
    target: &str,
    progress: Option<Box<dyn ProgressReporter>>,
) -> Vec<String> {
    let stream = explorer.index_directory(target, progress);
    futures::pin_mut!(stream);
    let mut out = Vec::new();
    while let Some(msg) = stream.next().await {
        out.push(msg);
    }
    out
}

pub fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// src/ and docs/ with three files, plus entries that must never be indexed.
pub fn sample_tree(root: &Path) {
    write(root, "src/main.rs", "fn main() { println!(\"hello\"); }");
    write(root, "src/lib.rs", "pub mod config;");
    write(root, "docs/readme.md", "# Project readme");
    write(root, ".env", "SECRET=1");
    write(root, "logo.png", "not really a png");
    write(root, "node_modules/left-pad/index.js", "module.exports = 1;");
}
