use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::bridge::BridgeConfig;

#[derive(Parser, Debug)]
#[command(name = "obs-scene-bridge")]
#[command(version)]
#[command(about = "Remote scene switching and volume control for OBS from any browser on the LAN")]
pub struct Args {
    /// Configuration file (JSON, or TOML when it ends in .toml).
    /// Defaults to config.json next to the executable.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Directory served under /custom_icons/. Defaults to assets/ next to the executable.
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Address the web server binds to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the web server
    #[arg(long, short, default_value = "5000")]
    pub port: u16,

    /// Milliseconds between poll cycles
    #[arg(long, default_value = "500")]
    pub poll_interval_ms: u64,

    /// Milliseconds to wait after each connect attempt
    #[arg(long, default_value = "2000")]
    pub reconnect_cooldown_ms: u64,

    /// Upper bound in milliseconds on any single call to OBS
    #[arg(long, default_value = "3000")]
    pub call_timeout_ms: u64,

    /// Print shell completions for the given shell and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reconnect_cooldown: Duration::from_millis(self.reconnect_cooldown_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn config_path(&self, base: &std::path::Path) -> PathBuf {
        self.config.clone().unwrap_or_else(|| base.join("config.json"))
    }

    pub fn assets_dir(&self, base: &std::path::Path) -> PathBuf {
        self.assets.clone().unwrap_or_else(|| base.join("assets"))
    }
}

/// Write completions for `shell` to stdout.
pub fn print_completions(shell: Shell) {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
