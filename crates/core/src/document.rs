//! Turns an indexed item into the text that gets embedded, plus its metadata record.

use crate::models::IndexedItem;
use crate::source::LoadedItem;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Path segments from the root to the item, joined by ` > `.
pub fn breadcrumb(relative_path: &str) -> String {
    relative_path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" > ")
}

/// `Type: .. Path: .. Tree: ..` with a `Content Snippet:` clause for files.
pub fn document_text(item: &IndexedItem, snippet: Option<&str>, snippet_chars: usize) -> String {
    let kind = if item.is_dir { "Folder" } else { "File" };
    let mut text = format!(
        "Type: {kind}. Path: {}. Tree: {}.",
        item.relative_path.replace('/', " "),
        breadcrumb(&item.relative_path)
    );
    if !item.is_dir {
        let snippet: String = snippet.unwrap_or("").chars().take(snippet_chars).collect();
        text.push_str(" Content Snippet: ");
        text.push_str(&snippet);
    }
    text
}

pub fn build_document(loaded: &LoadedItem, snippet_chars: usize) -> BuiltDocument {
    BuiltDocument {
        id: loaded.item.id(),
        text: document_text(&loaded.item, loaded.content.as_deref(), snippet_chars),
        metadata: loaded.item.to_metadata(),
    }
}
