//! depmap CLI - dependency maps of Java sources in a graph database.
//!
//! Usage:
//!   depmap generate [root]             # Extract and write the graph
//!   depmap generate --embedded         # Write to the local store instead
//!   depmap check <name>...             # Show what the filter admits
//!   depmap stats                       # Counts in the embedded store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depmap::config::{config_dir, split_list, DEFAULT_CONFIG_FILE};
use depmap::{store_stats, DepmapConfig, Generator};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "depmap")]
#[command(about = "depmap - Java dependency maps in a graph database", long_about = None)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the sources under root and write the dependency graph
    Generate {
        /// Source root (default: current directory)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Use the embedded store
        #[arg(long)]
        embedded: bool,

        /// Embedded store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Root URL of the networked backend
        #[arg(long, conflicts_with = "embedded")]
        url: Option<String>,

        /// Allow rules, `;`-separated (replaces the config's)
        #[arg(long)]
        allow: Option<String>,

        /// Block rules, `;`-separated (replaces the config's)
        #[arg(long)]
        block: Option<String>,

        /// Let allow rules win when both lists match
        #[arg(long)]
        prefer_allow: bool,

        /// Statements to run before any fact, `;`-separated
        #[arg(long)]
        pre_exec: Option<String>,

        /// Print run counters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show whether qualified names pass the configured filter
    Check {
        /// Qualified names to test
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show node and relationship counts of the embedded store
    Stats {
        /// Embedded store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = DepmapConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    // Relative store paths hang off the config file's directory.
    let store_base = config_dir(&cli.config);

    match cli.command {
        Commands::Generate {
            root,
            embedded,
            store,
            url,
            allow,
            block,
            prefer_allow,
            pre_exec,
            json,
        } => {
            if embedded || store.is_some() {
                config.use_embedded_backend = true;
            }
            if let Some(store) = store {
                // A path typed on the command line means the working directory.
                config.embedded_store_path = std::env::current_dir()?.join(store);
            }
            if let Some(url) = url {
                config.use_embedded_backend = false;
                config.networked_root_url = url;
            }
            if let Some(allow) = allow {
                config.allow_rules = split_list(&allow);
                config.use_allow_rules = None;
            }
            if let Some(block) = block {
                config.block_rules = split_list(&block);
                config.use_block_rules = None;
            }
            if prefer_allow {
                config.prefer_allow_over_block = true;
            }
            if let Some(pre_exec) = pre_exec {
                config.enable_pre_execution = true;
                config.pre_execution_statements = split_list(&pre_exec);
            }

            let root = root.canonicalize().unwrap_or(root);
            let generator = Generator::new(config)?.with_store_base(store_base);
            for rejected in generator.rejected_rules() {
                eprintln!("warning: {}", rejected);
            }
            let stats = generator.generate(&root)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("✓ Graph generated");
                println!("  Files:      {} ({} failed)", stats.files_parsed, stats.files_failed);
                println!("  Nodes:      {} ({} blocked)", stats.nodes_written, stats.nodes_blocked);
                println!("  Edges:      {} ({} dropped)", stats.edges_written, stats.edges_dropped);
                println!("  Statements: {} in {} batches", stats.statements, stats.batches);
                if stats.visitor_faults > 0 {
                    println!("  Faults:     {}", stats.visitor_faults);
                }
            }
        }

        Commands::Check { names } => {
            let generator = Generator::new(config)?;
            for rejected in generator.rejected_rules() {
                eprintln!("warning: {}", rejected);
            }
            let filter = generator.filter();
            for name in &names {
                let verdict = if filter.admits(name) { "admitted" } else { "blocked" };
                println!("{:<9} {}", verdict, name);
            }
        }

        Commands::Stats { store } => {
            config.use_embedded_backend = true;
            if let Some(store) = store {
                // A path typed on the command line means the working directory.
                config.embedded_store_path = std::env::current_dir()?.join(store);
            }
            match store_stats(&config, &store_base)? {
                Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
                None => println!(
                    "no store at {}",
                    config.resolve_store_path(&store_base).display()
                ),
            }
        }
    }

    Ok(())
}
