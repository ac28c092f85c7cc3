//! Node Configuration
//!
//! Every setting can be given as a flag or through the environment, which is
//! how containerised deployments configure nodes.

use crate::lookup::FetchFailurePolicy;
use crate::overlay::OverlayConfig;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "dht-kv")]
#[command(author, version, about = "Write-once key/value namespace on a DHT overlay", long_about = None)]
pub struct Config {
    /// UDP port of the overlay node.
    #[arg(long, env = "DHT_PORT", default_value_t = 6881)]
    pub dht_port: u16,

    /// TCP port of the HTTP API.
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub server_port: u16,

    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    /// Overlay node to join through, as `host:port`. Repeatable.
    #[arg(long = "starting-node", env = "STARTING_NODE", value_delimiter = ',')]
    pub starting_nodes: Vec<String>,

    #[arg(long, env = "REANNOUNCE_INTERVAL_SECS", default_value_t = 10)]
    pub reannounce_interval_secs: u64,

    #[arg(long, env = "REPLICATE_INTERVAL_SECS", default_value_t = 60)]
    pub replicate_interval_secs: u64,

    /// Upper bound on how long a put waits for its announce.
    #[arg(long, env = "ANNOUNCE_TIMEOUT_SECS", default_value_t = 30)]
    pub announce_timeout_secs: u64,

    /// Timeout of a single overlay request.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = "FETCH_FAILURE_POLICY", value_enum, default_value_t = FetchFailurePolicy::Lenient)]
    pub fetch_failure_policy: FetchFailurePolicy,

    /// Peer fetches a prefix query runs at once.
    #[arg(long, env = "LOOKUP_CONCURRENCY", default_value_t = 8)]
    pub lookup_concurrency: usize,

    /// Default log filter when RUST_LOG is not set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn dht_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.dht_port)
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.server_port)
    }

    pub fn reannounce_interval(&self) -> Duration {
        Duration::from_secs(self.reannounce_interval_secs.max(1))
    }

    pub fn replicate_interval(&self) -> Duration {
        Duration::from_secs(self.replicate_interval_secs.max(1))
    }

    pub fn announce_timeout(&self) -> Duration {
        Duration::from_secs(self.announce_timeout_secs.max(1))
    }

    /// Overlay settings with starting nodes resolved through DNS.
    pub async fn overlay(&self) -> Result<OverlayConfig> {
        let mut bootstrap_nodes = Vec::new();
        for node in &self.starting_nodes {
            let addr = tokio::net::lookup_host(node.as_str())
                .await
                .with_context(|| format!("cannot resolve starting node {}", node))?
                .next()
                .with_context(|| format!("starting node {} has no address", node))?;
            bootstrap_nodes.push(addr);
        }

        Ok(OverlayConfig {
            bootstrap_nodes,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..OverlayConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["dht-kv"]).unwrap();

        assert_eq!(config.dht_port, 6881);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.reannounce_interval(), Duration::from_secs(10));
        assert_eq!(config.replicate_interval(), Duration::from_secs(60));
        assert_eq!(config.announce_timeout(), Duration::from_secs(30));
        assert_eq!(config.fetch_failure_policy, FetchFailurePolicy::Lenient);
        assert_eq!(config.lookup_concurrency, 8);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "dht-kv",
            "--dht-port",
            "7000",
            "--bind-host",
            "127.0.0.1",
            "--starting-node",
            "127.0.0.1:6881",
            "--starting-node",
            "127.0.0.1:6882",
            "--fetch-failure-policy",
            "strict",
        ])
        .unwrap();

        assert_eq!(config.dht_addr(), "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.starting_nodes.len(), 2);
        assert_eq!(config.fetch_failure_policy, FetchFailurePolicy::Strict);
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config = Config::try_parse_from([
            "dht-kv",
            "--announce-timeout-secs",
            "0",
            "--reannounce-interval-secs",
            "0",
        ])
        .unwrap();

        assert_eq!(config.announce_timeout(), Duration::from_secs(1));
        assert_eq!(config.reannounce_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_overlay_resolves_starting_nodes() {
        let config =
            Config::try_parse_from(["dht-kv", "--starting-node", "127.0.0.1:6881"]).unwrap();

        let overlay = config.overlay().await.unwrap();

        assert_eq!(overlay.bootstrap_nodes, vec!["127.0.0.1:6881".parse::<SocketAddr>().unwrap()]);
        assert_eq!(overlay.request_timeout, Duration::from_millis(5000));
    }
}
