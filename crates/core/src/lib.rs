//! Semantic filesystem explorer: index local trees or hosted repositories into a vector store
//! and search them in natural language.

pub mod cancel;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod explorer;
pub mod filter;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod source;
pub mod vectorstore;

pub use cancel::CancelFlag;
pub use explorer::{ExplorerSettings, IndexStatus, SemanticExplorer};
pub use filter::Filter;
pub use indexer::ProgressReporter;
pub use models::SearchResult;
