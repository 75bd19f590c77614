use anyhow::Result;
use clap::{Parser, Subcommand};
use explorer_core::config;
use explorer_core::pipeline;
use explorer_core::search::DEFAULT_RESULTS;
use explorer_core::{Filter, SearchResult, SemanticExplorer};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let explorer = pipeline::build_explorer(&cfg).await?;

    match cli.command {
        Commands::Index { target, quiet } => run_index(&explorer, &target, quiet).await,
        Commands::Search {
            query,
            limit,
            filter,
            json,
        } => run_search(&explorer, &query, limit, filter.as_deref(), json).await,
        Commands::Status => {
            println!("{}", explorer.get_status().await?);
            Ok(())
        }
        Commands::Clear => {
            let removed = explorer.clear_index().await?;
            if removed == 0 {
                println!("Index is already empty.");
            } else {
                println!("Removed {removed} items from the index.");
            }
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "semantic-explorer", about = "Semantic search over local folders and code repositories")]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a local directory or a GitHub / Hugging Face Spaces URL
    Index {
        target: String,
        /// Do not print progress fractions to stderr
        #[arg(long)]
        quiet: bool,
    },
    /// Query the index
    Search {
        query: String,
        /// Number of results
        #[arg(short = 'n', long, default_value_t = DEFAULT_RESULTS)]
        limit: usize,
        /// Metadata filter as JSON, e.g. '{"is_dir": false}'
        #[arg(long)]
        filter: Option<String>,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how many items are indexed
    Status,
    /// Remove every indexed item
    Clear,
}

async fn run_index(explorer: &SemanticExplorer, target: &str, quiet: bool) -> Result<()> {
    let progress: Option<Box<dyn explorer_core::ProgressReporter>> = if quiet {
        None
    } else {
        Some(Box::new(|fraction: f64, description: &str| {
            eprintln!("[{:>5.1}%] {description}", fraction * 100.0);
        }))
    };
    let mut statuses = Box::pin(explorer.index_directory(target, progress));

    let cancel = explorer.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current batch");
            cancel.cancel();
        }
    });

    let mut last = String::new();
    while let Some(status) = statuses.next().await {
        println!("{status}");
        last = status;
    }
    watcher.abort();

    if last.starts_with("Error:") {
        anyhow::bail!("indexing failed");
    }
    Ok(())
}

async fn run_search(
    explorer: &SemanticExplorer,
    query: &str,
    limit: usize,
    filter: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = filter.map(Filter::parse).transpose()?;
    let results = explorer.search(query, limit, filter).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for line in render_table(&results) {
        println!("{line}");
    }
    Ok(())
}

fn render_table(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| {
            let size = r.size.map(human_size).unwrap_or_else(|| "-".to_string());
            format!(
                "{:.3}  {}  {:>9}  {}  {}",
                r.similarity,
                r.type_label(),
                size,
                r.modified.format("%Y-%m-%d %H:%M"),
                r.path
            )
        })
        .collect()
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use explorer_core::models::{timestamp_to_local, ItemKind};

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(human_size(12), "12 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn folders_render_without_size() {
        let rows = render_table(&[SearchResult {
            similarity: 0.5,
            path: "src".into(),
            full_path: "/r/src".into(),
            kind: ItemKind::Folder,
            size: None,
            modified: timestamp_to_local(0.0),
        }]);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].starts_with("0.500"));
        assert!(rows[0].contains("📁 Folder"));
        assert!(rows[0].ends_with("src"));
    }

    #[test]
    fn cli_parses_search_flags() {
        let cli = Cli::parse_from([
            "semantic-explorer",
            "search",
            "config loader",
            "-n",
            "5",
            "--filter",
            r#"{"is_dir": false}"#,
        ]);
        match cli.command {
            Commands::Search { query, limit, filter, json } => {
                assert_eq!(query, "config loader");
                assert_eq!(limit, 5);
                assert!(filter.is_some());
                assert!(!json);
            }
            _ => panic!("expected search"),
        }
    }
}
