//! CLI commands implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::analyst::{fallback_report, DocumentAnalyzer, FinancialAnalyst, DEFAULT_QUERY};
use crate::config::{load_settings, AnalyzeMode, Config, Settings, DEFAULT_BIND};

#[derive(Parser)]
#[command(name = "finlens")]
#[command(about = "Financial document analysis service")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, env = "FINLENS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and default configuration
    Init,

    /// Start the analysis web server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3030)
        #[arg(default_value = DEFAULT_BIND)]
        bind: String,

        /// Acknowledge uploads immediately and analyze in the background
        #[arg(long)]
        queued: bool,
    },

    /// Analyze a financial document without starting the server
    Analyze {
        /// Path to the PDF to analyze
        file: PathBuf,

        /// Analysis query
        #[arg(short, long, default_value = DEFAULT_QUERY)]
        query: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => cmd_init(&settings),
        Commands::Serve { bind, queued } => cmd_serve(&settings, &bind, queued).await,
        Commands::Analyze { file, query } => cmd_analyze(&settings, &file, &query).await,
    }
}

/// Initialize the data directory and write a default config.
fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(settings.storage_dir())?;

    let config_path = settings.config_path();
    if config_path.exists() {
        println!(
            "{} Config already exists at {}",
            style("→").cyan(),
            config_path.display()
        );
    } else {
        std::fs::write(&config_path, toml::to_string_pretty(&Config::default())?)?;
        println!(
            "{} Wrote default config to {}",
            style("✓").green(),
            config_path.display()
        );
    }

    println!(
        "{} Upload storage at {}",
        style("✓").green(),
        settings.storage_dir().display()
    );
    Ok(())
}

/// Start the analysis web server.
async fn cmd_serve(settings: &Settings, bind: &str, queued: bool) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;

    let mode = if queued {
        AnalyzeMode::Queued
    } else {
        settings.server.analyze_mode
    };
    let mode_label = match mode {
        AnalyzeMode::Sync => "synchronous",
        AnalyzeMode::Queued => "queued (results in server logs)",
    };

    println!(
        "{} Starting FinLens server at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Analyze contract: {}", mode_label);
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port, mode).await
}

/// Analyze a local document without going through the HTTP surface.
async fn cmd_analyze(settings: &Settings, file: &Path, query: &str) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let analyst = FinancialAnalyst::new(settings.llm.clone());
    let query = query.trim();

    if !analyst.is_available().await {
        println!(
            "{} Model backend not reachable at {}; a fallback report will be produced",
            style("!").yellow(),
            settings.llm.endpoint
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("Analyzing document...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    // Same fail-open policy as the server: a model failure becomes the
    // fallback report, never an error.
    let analysis = match analyst.analyze(query, file).await {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!("Analysis failed, switching to fallback mode: {}", e);
            fallback_report(query)
        }
    };

    spinner.finish_and_clear();
    println!(
        "{} Analysis for {}",
        style("✓").green(),
        file.display()
    );
    println!();
    println!("{}", analysis);
    Ok(())
}

/// Parse a bind address that can be:
/// - A bare port (`8080`)
/// - A bare host (`0.0.0.0`)
/// - A host:port pair (`0.0.0.0:8080`)
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    // Try parsing as host:port
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), 3030))
}
