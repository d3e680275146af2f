//! Server configuration, parsed from command-line flags.

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use clap::Parser;

/// rodgate server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "rodgate")]
#[command(about = "Hot Rod compatible binary cache endpoint")]
#[command(version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Cache name to serve (repeatable). When none are given every name is
    /// accepted; the default cache "" is always accepted.
    #[arg(long = "cache", value_name = "NAME")]
    pub caches: Vec<String>,

    /// Largest request frame accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            caches: Vec::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            log_level: "info".to_string(),
        }
    }
}
