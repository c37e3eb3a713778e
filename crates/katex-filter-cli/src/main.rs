#![deny(unsafe_code)]

//! katex-filter — Pandoc filter that pre-renders TeX math to HTML through a
//! KaTeX render server.
//!
//! Pandoc runs it as `pandoc --filter katex-filter ...`, passing the target
//! format as the only argument and the document as JSON on stdin.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use katex_filter_config::{AppConfig, DEFAULT_CONFIG_FILE};
use katex_filter_core::{MathMode, RenderClient, run_filter};

/// Pre-render TeX math in Pandoc documents.
#[derive(Parser)]
#[command(name = "katex-filter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Render server host (overrides the config file).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Render server port (overrides the config file).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Target format passed by Pandoc; not used.
    #[arg(hide = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter a Pandoc JSON document from stdin to stdout (default).
    Filter,

    /// Render one expression and print the HTML.
    Render {
        /// TeX source; read from stdin when omitted.
        tex: Option<String>,

        /// Render as display (block) math.
        #[arg(long)]
        display: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(&config, cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();
    report_config_source(&cli.config);

    debug!(
        host = %config.server.host,
        port = config.server.port,
        policy = ?config.render.on_connect_failure,
        format = ?cli.format,
        "Configuration resolved"
    );

    match cli.command {
        None | Some(Commands::Filter) => cmd_filter(&config).await,
        Some(Commands::Render { tex, display }) => cmd_render(&config, tex, display).await,
        Some(Commands::Config { show }) => cmd_config(&cli.config, &config, show),
    }
}

async fn cmd_filter(config: &AppConfig) -> Result<ExitCode> {
    let client = RenderClient::from_config(config);
    run_filter(
        tokio::io::stdin(),
        tokio::io::stdout(),
        Arc::new(client),
        config.render.concurrency,
    )
    .await
    .context("failed to filter document")?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_render(config: &AppConfig, tex: Option<String>, display: bool) -> Result<ExitCode> {
    let tex = match tex {
        Some(tex) => tex,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read TeX from stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    match render_one(config, &tex, display).await? {
        Some(html) => {
            println!("{html}");
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

async fn render_one(config: &AppConfig, tex: &str, display: bool) -> Result<Option<String>> {
    let client = RenderClient::from_config(config);
    Ok(client.render(tex, MathMode::from_display(display)).await?)
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<ExitCode> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else if config_path.exists() {
        println!("Configuration at '{}' is valid.", config_path.display());
    } else {
        println!(
            "No configuration at '{}'; defaults are in use.",
            config_path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Load the config file (or defaults) and apply command-line overrides.
async fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(&cli.config)
        .await
        .with_context(|| format!("failed to load config from '{}'", cli.config.display()))?;

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

/// Say where the configuration came from, once logging is up.
fn report_config_source(path: &Path) {
    if path.exists() {
        debug!(path = %path.display(), "Loaded config file");
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
    }
}

fn log_filter(config: &AppConfig, verbose: u8) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
