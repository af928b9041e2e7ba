//! # Service Configuration
//!
//! All runtime settings come from environment variables; `--host`/`--port`
//! CLI flags may override the bind address after loading.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::cot::{TakTarget, MULTICAST_ADDR};

/// Default TAK server input port
const DEFAULT_TAK_PORT: u16 = 8088;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A variable is set but does not parse
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Pre-shared ingestion credential; `None` rejects every ingest request
    pub api_key: Option<String>,

    /// Postgres connection string
    pub database_url: String,

    /// CORS allowed origins; empty list means permissive (development)
    pub cors_origins: Vec<String>,

    /// Trailing window in which a node heartbeat counts as online
    pub node_online_window_sec: u64,

    /// Configured fleet size for the dashboard card
    pub nodes_total: u32,

    /// Toggle for the store notification listener loop
    pub enable_listen: bool,

    /// Optional TAK endpoint for CoT push; `None` disables the publisher
    pub tak: Option<TakTarget>,

    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl ServiceConfig {
    /// Load configuration from the environment.
    ///
    /// `DATABASE_URL` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        Ok(Self {
            api_key: env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            database_url,
            cors_origins: env::var("CORS_ALLOW_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_else(|_| default_cors_origins()),
            node_online_window_sec: parse_var("NODE_ONLINE_WINDOW_SEC", 60)?,
            nodes_total: parse_var("NODES_TOTAL", 3)?,
            enable_listen: env::var("ENABLE_LISTEN")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            tak: parse_tak_target(
                env::var("TAK_MODE").ok(),
                env::var("TAK_SERVER_IP").ok(),
                env::var("TAK_SERVER_PORT").ok(),
            )?,
            host: env::var("BIND_HOST").unwrap_or_else(|_| default_host()),
            port: parse_var("BIND_PORT", 8000)?,
        })
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Resolve the TAK endpoint from `TAK_MODE`/`TAK_SERVER_IP`/`TAK_SERVER_PORT`.
///
/// `multicast` needs no address (the mesh endpoint is fixed); `tcp` and
/// `udp` require a server IP and default the port.
fn parse_tak_target(
    mode: Option<String>,
    ip: Option<String>,
    port: Option<String>,
) -> Result<Option<TakTarget>, ConfigError> {
    let mode = mode.unwrap_or_default().trim().to_ascii_lowercase();
    match mode.as_str() {
        "" | "off" => Ok(None),
        "multicast" => Ok(Some(TakTarget::Udp(MULTICAST_ADDR.to_string()))),
        "tcp" | "udp" => {
            let ip = ip
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar("TAK_SERVER_IP"))?;
            let port: u16 = match port {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidVar("TAK_SERVER_PORT", raw))?,
                None => DEFAULT_TAK_PORT,
            };
            let addr = format!("{}:{}", ip, port);
            Ok(Some(if mode == "tcp" {
                TakTarget::Tcp(addr)
            } else {
                TakTarget::Udp(addr)
            }))
        }
        _ => Err(ConfigError::InvalidVar("TAK_MODE", mode)),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
