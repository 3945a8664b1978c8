mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use knowledge_rag::core::paths::DataPaths;

#[derive(Parser)]
#[command(name = "kb")]
#[command(about = "Knowledge base with hybrid semantic retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Data directory (default: $KB_DATA_DIR or ./.knowledge)")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Debug logging on stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, default config and store
    Init {
        #[arg(long, help = "Overwrite an existing config.yaml")]
        force: bool,
    },
    /// Ingest extracted document text (.txt/.md file or directory)
    Ingest {
        path: PathBuf,
        #[arg(long = "type", value_name = "pdf|txt", help = "Declared document type")]
        kind: Option<String>,
        #[arg(long, help = "Skip automatic topic tags")]
        no_tags: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Store a question/answer pair or a context passage
    Learn {
        #[arg(short, long)]
        question: Option<String>,
        #[arg(short, long)]
        answer: Option<String>,
        #[arg(short, long)]
        context: Option<String>,
        #[arg(long, help = "Mark as document-origin knowledge")]
        document: bool,
        #[arg(long = "tag", help = "Explicit tag (repeatable)")]
        tags: Vec<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Retrieve the most relevant knowledge for a query
    Search {
        query: String,
        #[arg(long, short = 'k', help = "Maximum results")]
        top_k: Option<usize>,
        #[arg(long, help = "Primary score threshold")]
        threshold: Option<f32>,
        #[arg(long, help = "Fallback score threshold")]
        fallback_threshold: Option<f32>,
        #[arg(long, help = "JSON output")]
        json: bool,
        #[arg(long, help = "Print the assembled prompt context")]
        context: bool,
    },
    /// Evict stale, rarely used entries
    Optimize {
        #[arg(long)]
        min_usage: Option<i64>,
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show knowledge base statistics
    Stats {
        #[arg(long, default_value_t = 5, help = "Recently used entries to list")]
        recent: usize,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server for assistant integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "knowledge_rag=debug,kb=debug"
    } else {
        "knowledge_rag=info,kb=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = DataPaths::resolve(cli.data_dir.as_deref());

    match cli.command {
        Commands::Init { force } => commands::init::run(&paths, force),
        Commands::Ingest {
            path,
            kind,
            no_tags,
            json,
        } => commands::ingest::run(&paths, &path, kind.as_deref(), no_tags, json),
        Commands::Learn {
            question,
            answer,
            context,
            document,
            tags,
            json,
        } => commands::learn::run(
            &paths,
            commands::learn::LearnArgs {
                question,
                answer,
                context,
                document,
                tags,
                json,
            },
        ),
        Commands::Search {
            query,
            top_k,
            threshold,
            fallback_threshold,
            json,
            context,
        } => commands::search::run(
            &paths,
            &query,
            commands::search::SearchArgs {
                top_k,
                threshold,
                fallback_threshold,
                json,
                context,
            },
        ),
        Commands::Optimize {
            min_usage,
            max_items,
            json,
        } => commands::optimize::run(&paths, min_usage, max_items, json),
        Commands::Stats { recent, json } => commands::stats::run(&paths, recent, json),

        // MCP Server
        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&paths);
                Ok(())
            } else {
                run_mcp_server(&paths)
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(paths: &DataPaths) -> anyhow::Result<()> {
    let kb = knowledge_rag::KnowledgeBase::open(paths)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(kb))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(paths: &DataPaths) {
    use colored::Colorize;

    let data_dir = paths.root.to_string_lossy().to_string();
    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "kb".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "knowledge-base": {{
      "command": "{}",
      "args": ["mcp", "--data-dir", "{}"]
    }}
  }}
}}"#, binary_path, data_dir);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Hybrid semantic search with threshold fallback", "knowledge_search".green());
    println!("  • {} - Store an answer for a question", "knowledge_remember".green());
    println!("  • {} - Ingest extracted document text", "knowledge_ingest".green());
    println!("  • {} - Entry and document statistics", "knowledge_stats".green());
}
