use std::sync::Arc;

use clap::Parser;
use colored::*;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use obs_scene_bridge::bridge::{BridgeEngine, ConnectTarget};
use obs_scene_bridge::cli::{print_completions, Args};
use obs_scene_bridge::config::{base_dir, Config};
use obs_scene_bridge::obs::ObsConnector;
use obs_scene_bridge::web::{self, AppState};

const DEFAULT_LOG_FILTER: &str = "info,tungstenite=error,tokio_tungstenite=error";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        print_completions(shell);
        return Ok(());
    }

    init_tracing();

    let base = base_dir();
    let config_path = args.config_path(&base);
    let config = match Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("\n{} {e}", "[CRITICAL]".bright_red().bold());
            eprintln!("Create or fix the configuration file and restart.\n");
            std::process::exit(1);
        }
    };

    let engine = Arc::new(
        BridgeEngine::builder(ConnectTarget::from(&config.obs_settings), Arc::new(ObsConnector))
            .sources(config.source_names())
            .config(args.bridge_config())
            .build(),
    );
    let poll_task = engine.spawn();

    let listener = TcpListener::bind((args.bind.as_str(), args.port)).await?;
    let app = AppState::new(Arc::clone(&engine), &config, args.assets_dir(&base));

    let rule = "=".repeat(60);
    eprintln!("\n{rule}");
    eprintln!("{}", " STREAM CONTROLLER - ACTIVE".bright_green().bold());
    eprintln!("{rule}");
    eprintln!(
        "\n{} Open this URL on your mobile device:",
        "[GUIDE] ".bright_blue()
    );
    eprintln!("         http://{}:{}\n", web::local_ip(), args.port);
    eprintln!(
        "{} Keep this window open while streaming. Press Ctrl+C to stop.\n",
        "[NOTE]  ".bright_blue()
    );
    info!(
        config = %config_path.display(),
        obs = %ConnectTarget::from(&config.obs_settings).url(),
        sources = config.audio_sources.len(),
        "bridge starting"
    );

    tokio::select! {
        res = web::serve(listener, app) => {
            if let Err(e) = res {
                error!(error = %e, "web server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    poll_task.abort();
    Ok(())
}
