//! Image Reproduce daemon - HTTP backend for the image reproduce UI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use image_reproduce::ReproduceError;
use image_reproduce::api::ReproduceServer;
use image_reproduce::config::{Config, UpstreamSettings};
use image_reproduce::error::Result;
use image_reproduce::upstream;

/// Image Reproduce - analyze an image with a multimodal model, then regenerate it
#[derive(Parser)]
#[command(name = "image-reproduce")]
#[command(about = "HTTP backend relaying image analysis and generation to a multimodal LLM API")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Override the listen address (e.g. 0.0.0.0:8000)
    #[arg(long, short = 'l', global = true)]
    pub listen: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config, cli.listen).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,image_reproduce=debug,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn read_config(path: &PathBuf) -> Result<Config> {
    tracing::info!("Loading config from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        ReproduceError::Configuration(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    Config::from_toml(&content)
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        return read_config(&path);
    }

    let default_paths = [
        Some(PathBuf::from("image-reproduce.toml")),
        dirs::config_dir().map(|c| c.join("image-reproduce").join("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting image reproduce server");

    let mut config = load_config(config_path)?;
    if let Some(listen) = listen {
        config.server.listen_addr = listen;
    }
    tracing::debug!("Config loaded: {:?}", config);

    let settings = UpstreamSettings::from_config(&config.upstream)?;
    let http = upstream::build_http_client()?;
    let chat = upstream::connect(settings, http.clone())?;

    let server = ReproduceServer::new(config, chat, http);
    server.serve().await?;

    tracing::info!("Image reproduce server stopped");
    Ok(())
}
