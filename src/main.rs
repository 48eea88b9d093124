//! kuckmal CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use kuckmal::{
    commands::{
        cmd_channels, cmd_clear, cmd_history, cmd_import, cmd_init, cmd_recent, cmd_search,
        cmd_show, cmd_status, cmd_themes, cmd_update, print_history, print_import_summary,
        print_init_stats, print_media_details, print_names, print_search_results, print_status,
        print_update_stats, ImportOptions, SearchOptions, SearchResult, ThemeOptions,
        UpdateOptions,
    },
    config::Config,
    error::{Error, Result},
    ingest::IngestMode,
    media::NaturalKey,
    progress::LogWriterFactory,
    store::{MediaPage, MediaStore},
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kuckmal")]
#[command(version, about = "Local catalog of public broadcaster media lists", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize kuckmal configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Check the remote list and download a full or differential update
    Update {
        /// Check now even if the last check is recent
        #[arg(long)]
        force: bool,
    },

    /// Import a local list file (plain JSON or xz)
    Import {
        /// Path to the list file
        file: PathBuf,

        /// Merge into the catalog instead of replacing it
        #[arg(long)]
        diff: bool,
    },

    /// Search the catalog
    Search {
        /// Text matched against title, theme and description
        text: Option<String>,

        /// Only this channel
        #[arg(long)]
        channel: Option<String>,

        /// Only this theme
        #[arg(long)]
        theme: Option<String>,

        /// Broadcast on or after this date (YYYY-MM-DD or Unix timestamp)
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show a single entry with its expanded URLs
    Show {
        channel: String,
        theme: String,
        title: String,
    },

    /// Entries broadcast in the last hours
    Recent {
        /// Look back this many hours
        #[arg(long, default_value = "24")]
        hours: u32,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List channels
    Channels,

    /// List themes
    Themes {
        /// Only themes of this channel
        #[arg(long)]
        channel: Option<String>,

        /// Only themes broadcast on or after this date (YYYY-MM-DD or Unix timestamp)
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of themes
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of themes to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show catalog status
    Status,

    /// Show recent imports
    History {
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Remove all catalog entries
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force, cli.json).await;
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "kuckmal", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let store = MediaStore::connect(&config).await?;
    let json = cli.json;
    let show_progress = !json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Update { force } => {
            let stats = cmd_update(
                &config,
                &store,
                UpdateOptions {
                    force,
                    show_progress,
                },
            )
            .await?;
            output(json, &stats, print_update_stats)?;
        }

        Commands::Import { file, diff } => {
            let mode = if diff { IngestMode::Diff } else { IngestMode::Full };
            let summary = cmd_import(
                &config,
                &store,
                ImportOptions {
                    path: file,
                    mode,
                    show_progress,
                },
            )
            .await?;
            output(json, &summary, print_import_summary)?;
        }

        Commands::Search {
            text,
            channel,
            theme,
            since,
            limit,
            offset,
        } => {
            let result = cmd_search(
                &config,
                &store,
                SearchOptions {
                    text,
                    channel,
                    theme,
                    since,
                    limit,
                    offset,
                },
            )
            .await?;
            output(json, &result, print_search_results)?;
        }

        Commands::Show {
            channel,
            theme,
            title,
        } => {
            let details = cmd_show(&store, &NaturalKey::new(channel, theme, title)).await?;
            output(json, &details, print_media_details)?;
        }

        Commands::Recent { hours, limit } => {
            let records = cmd_recent(&config, &store, hours, limit).await?;
            let result = SearchResult {
                page: MediaPage {
                    total: records.len() as u64,
                    records,
                },
                offset: 0,
            };
            output(json, &result, print_search_results)?;
        }

        Commands::Channels => {
            let channels = cmd_channels(&store).await?;
            output(json, &channels, |names| print_names(names))?;
        }

        Commands::Themes {
            channel,
            since,
            limit,
            offset,
        } => {
            let themes = cmd_themes(
                &config,
                &store,
                ThemeOptions {
                    channel,
                    since,
                    limit,
                    offset,
                },
            )
            .await?;
            output(json, &themes, |page| print_names(&page.names))?;
        }

        Commands::Status => {
            let status = cmd_status(&config, &store).await?;
            output(json, &status, print_status)?;
        }

        Commands::History { limit } => {
            let runs = cmd_history(&store, limit).await?;
            output(json, &runs, |runs| print_history(runs))?;
        }

        Commands::Clear { yes } => {
            if !yes {
                eprintln!("⚠️  This will delete ALL catalog entries!");
                eprintln!("Run with --yes to confirm.");
                std::process::exit(1);
            }
            let removed = cmd_clear(&store).await?;
            if json {
                println!(r#"{{"status": "ok", "removed": {}}}"#, removed);
            } else {
                println!("✓ Removed {} entries", removed);
            }
        }
    }

    store.close().await;
    Ok(())
}

/// Print `value` as JSON or through the human-readable printer
fn output<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

async fn handle_init(config: Option<PathBuf>, force: bool, json: bool) -> Result<()> {
    // A config path names the file; its directory becomes the base
    let base_dir = config.map(|path| {
        if path.extension().is_some_and(|ext| ext == "toml") {
            path.parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            path
        }
    });

    let stats = cmd_init(base_dir, force).await?;
    output(json, &stats, print_init_stats)
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
