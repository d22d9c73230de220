//! Configuration (§6 environment variables + a `serde_json5` config file,
//! layered under `clap` CLI overrides).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "pva-server", about = "Process-variable access runtime")]
pub struct Cli {
    /// Path to a `serde_json5` config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Overrides `net.broadcast_port`.
    #[arg(long)]
    pub broadcast_port: Option<u16>,

    /// Overrides `log.level`.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetConfig {
    /// `ADDR_LIST`: unicast/broadcast peers the client searches against.
    pub addr_list: Vec<SocketAddr>,
    /// `AUTO_ADDR_LIST`: auto-discover interface broadcast addresses.
    pub auto_addr_list: bool,
    /// `CONN_TIMEOUT`, seconds: liveness probe threshold.
    pub conn_timeout_secs: u64,
    /// `BEACON_PERIOD`, seconds: server beacon emission period.
    pub beacon_period_secs: u64,
    /// `BROADCAST_PORT`: UDP port for search/beacon.
    pub broadcast_port: u16,
    /// `MAX_ARRAY_BYTES`: receive buffer sizing.
    pub max_array_bytes: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            addr_list: Vec::new(),
            auto_addr_list: true,
            conn_timeout_secs: 30,
            beacon_period_secs: 15,
            broadcast_port: 5076,
            max_array_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub net: NetConfig,
    /// `DEBUG`: enables verbose logging beyond `log.level`.
    pub debug: bool,
}

impl Config {
    /// File (if given) < environment < CLI, matching the precedence the
    /// rest of this codebase's config loading uses.
    pub fn load() -> anyhow::Result<Self> {
        let cli = Cli::parse();
        let mut config = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json5::from_str(&text)?
            }
            None => Config::default(),
        };

        config.apply_env_overrides();

        if let Some(port) = cli.broadcast_port {
            config.net.broadcast_port = port;
        }
        if let Some(level) = cli.log_level {
            config.log.level = level;
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("ADDR_LIST") {
            self.net.addr_list = value
                .split_whitespace()
                .filter_map(|addr| addr.parse().ok())
                .collect();
        }
        if let Ok(value) = std::env::var("AUTO_ADDR_LIST") {
            if let Ok(parsed) = parse_bool(&value) {
                self.net.auto_addr_list = parsed;
            }
        }
        if let Ok(value) = std::env::var("CONN_TIMEOUT") {
            if let Ok(parsed) = value.parse() {
                self.net.conn_timeout_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("BEACON_PERIOD") {
            if let Ok(parsed) = value.parse() {
                self.net.beacon_period_secs = parsed;
            }
        }
        if let Ok(value) = std::env::var("BROADCAST_PORT") {
            if let Ok(parsed) = value.parse() {
                self.net.broadcast_port = parsed;
            }
        }
        if let Ok(value) = std::env::var("MAX_ARRAY_BYTES") {
            if let Ok(parsed) = value.parse() {
                self.net.max_array_bytes = parsed;
            }
        }
        if let Ok(value) = std::env::var("DEBUG") {
            if let Ok(parsed) = value.parse::<i32>() {
                self.debug = parsed != 0;
            }
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(()),
    }
}
