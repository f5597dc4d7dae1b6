mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skills_index::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "skills-server",
    about = "Live skill index with metadata and full-text search",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/skills-server/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the skills root directory
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Override the poll interval in seconds
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the index live and answer tool calls from stdin (default)
    Serve,

    /// List all skills
    List,

    /// Load a skill, or one of its sub-skills
    Get {
        name: String,
        /// Sub-skill to load instead of the primary document
        #[arg(short, long)]
        sub: Option<String>,
    },

    /// Load several skills at once from a JSON array of requests
    Batch { requests: String },

    /// Search skill metadata
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Full-text search across skill documents
    SearchContent {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Rebuild the index and print a summary
    Reload,

    /// Show usage statistics
    Stats,

    /// Validate every skill directory
    Validate,

    /// List callable tools
    Tools,

    /// Call a tool by name with JSON arguments
    Call {
        tool: String,
        /// JSON object of arguments
        args: Option<String>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "skills_server=info,skills_index=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    if let Some(root) = cli.root {
        config.index.root = root;
    }
    if let Some(interval) = cli.interval {
        config.refresh.interval_secs = interval;
    }

    let service = || commands::open(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve(&config).await?,
        Commands::List => commands::list(&service())?,
        Commands::Get { name, sub } => commands::get(&service(), &name, sub.as_deref())?,
        Commands::Batch { requests } => commands::batch(&service(), &requests)?,
        Commands::Search { query, limit } => commands::search(&service(), &query, limit)?,
        Commands::SearchContent { query, limit } => {
            commands::search_content(&service(), &query, limit)?
        }
        Commands::Reload => commands::reload(&service())?,
        Commands::Stats => commands::stats(&service())?,
        Commands::Validate => commands::validate(&service())?,
        Commands::Tools => commands::list_tools()?,
        Commands::Call { tool, args } => commands::call(&service(), &tool, args.as_deref())?,
        Commands::Config { action } => handle_config_command(action, &config)?,
    }

    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}
