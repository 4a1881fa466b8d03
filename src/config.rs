//! Command-line configuration.

use crate::commands::DEFAULT_QUEUE_DEPTH;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "nimbuskv", version, about = "NimbusKV - in-memory key-value store speaking RESP")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Batches that may wait for the executor before sessions back off
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
}

impl Config {
    /// Returns the bind address as `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}
