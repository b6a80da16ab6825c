//! # ze-cookbook CLI (`zec`)
//!
//! ## Usage
//!
//! ```bash
//! zec --config ./config/zec.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `zec watch` | Watch a folder, index changes, alert on relevant content |
//! | `zec index <dir>` | Index every file in a directory |
//! | `zec query "<text>"` | Query the collection |
//! | `zec serve mcp` | Start the deep-research MCP server |
//! | `zec rerank "<query>" --doc ...` | Rerank documents against a query |
//! | `zec seed companies` | Load the YC company list into the collection |
//! | `zec tools list` | List agent tools |
//! | `zec tools call <name> --param k=v` | Call an agent tool |
//!
//! The API key is read from `ZEROENTROPY_API_KEY` (or `[service].api_key_env`);
//! the alert webhook from `SLACK_WEBHOOK_URL` (or `[alert]`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ze_cookbook::progress::ProgressMode;
use ze_cookbook::{config, ingest, monitor, query, rerank, seed, server, tools};

/// ze-cookbook: document-search integration pipelines.
///
/// All commands accept `--config` pointing to a TOML file. When the file is
/// absent, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "zec",
    about = "Index, query, monitor and serve documents through a hosted search API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/zec.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a folder; index new and modified files and alert on matches.
    ///
    /// Runs until Ctrl-C. A first Ctrl-C stops watching and lets queued
    /// events finish; a second one abandons them.
    Watch {
        /// Folder to watch. Defaults to `[monitor].dir`.
        dir: Option<PathBuf>,
    },

    /// Index every file directly inside a directory.
    Index {
        dir: PathBuf,

        /// Progress output on stderr. Defaults to `human` on a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Query the collection: top CSV rows, then top snippets.
    Query {
        text: String,

        #[arg(long)]
        top_k_docs: Option<u32>,

        #[arg(long)]
        top_k_snippets: Option<u32>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Rerank documents against a query. Without arguments, runs a sample.
    Rerank {
        query: Option<String>,

        /// A document to rank; repeat for more.
        #[arg(long = "doc")]
        docs: Vec<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        top_n: Option<u32>,
    },

    /// Load sample data into the collection.
    Seed {
        #[command(subcommand)]
        dataset: SeedDataset,
    },

    /// Agent tools.
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// MCP server with deep-research search/fetch and the agent tools.
    Mcp,
}

#[derive(Subcommand)]
enum SeedDataset {
    /// Public YC company list.
    Companies {
        #[arg(long, default_value = seed::COMPANIES_URL)]
        url: String,
    },
}

#[derive(Subcommand)]
enum ToolsAction {
    List,
    /// Call a tool against `[collection].name`.
    Call {
        name: String,

        /// Tool parameter as KEY=VALUE; JSON values are parsed.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Tools {
        action: ToolsAction::List,
    } = cli.command
    {
        tools::run_tools_list();
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Watch { dir } => {
            monitor::run_watch(&cfg, dir).await?;
        }
        Commands::Index { dir, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_index(&cfg, &dir, mode).await?;
        }
        Commands::Query {
            text,
            top_k_docs,
            top_k_snippets,
            json,
        } => {
            query::run_query(&cfg, &text, top_k_docs, top_k_snippets, json).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => {
                server::run_server(&cfg).await?;
            }
        },
        Commands::Rerank {
            query,
            docs,
            model,
            top_n,
        } => {
            rerank::run_rerank(&cfg, query, docs, model, top_n).await?;
        }
        Commands::Seed { dataset } => match dataset {
            SeedDataset::Companies { url } => {
                seed::run_seed_companies(&cfg, &url).await?;
            }
        },
        Commands::Tools { action } => match action {
            ToolsAction::Call { name, params } => {
                tools::run_tool_call(&cfg, &name, &params).await?;
            }
            ToolsAction::List => tools::run_tools_list(),
        },
    }

    Ok(())
}
