//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL other nodes use to reach this one
    pub self_host: String,
    /// Base URL of the coordinating node that owns ring membership
    pub main_host: String,
    /// Virtual points per physical peer on the hash ring
    pub hash_replicas: usize,
    /// Deadline for a single peer fetch in milliseconds
    pub peer_timeout_ms: u64,
    /// Default TTL in seconds for entries filled by a loader or a peer
    pub default_ttl: u64,
    /// TTL in seconds for the optimistic remaining-capacity value written by bookings
    pub booking_cap_ttl: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SELF_HOST` - This node's base URL (default: `http://127.0.0.1:<port>`)
    /// - `MAIN_HOST` - Coordinator base URL (default: `SELF_HOST`)
    /// - `HASH_REPLICAS` - Virtual nodes per peer (default: 50)
    /// - `PEER_TIMEOUT_MS` - Peer fetch deadline (default: 3000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `BOOKING_CAP_TTL` - Remaining-capacity TTL after a booking (default: 60)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `DATABASE_URL` - Postgres URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let server_port = parse_var("SERVER_PORT", defaults.server_port);
        let self_host = env::var("SELF_HOST")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", server_port));
        let main_host = env::var("MAIN_HOST")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self_host.clone());

        Self {
            server_port,
            self_host: normalize_host(&self_host),
            main_host: normalize_host(&main_host),
            hash_replicas: parse_var("HASH_REPLICAS", defaults.hash_replicas),
            peer_timeout_ms: parse_var("PEER_TIMEOUT_MS", defaults.peer_timeout_ms),
            default_ttl: parse_var("DEFAULT_TTL", defaults.default_ttl),
            booking_cap_ttl: parse_var("BOOKING_CAP_TTL", defaults.booking_cap_ttl),
            cleanup_interval: parse_var("CLEANUP_INTERVAL", defaults.cleanup_interval),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Whether this node is allowed to change ring membership.
    pub fn is_coordinator(&self) -> bool {
        self.self_host == self.main_host
    }

    /// Peer fetch deadline as a Duration.
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            self_host: "http://127.0.0.1:3000".to_string(),
            main_host: "http://127.0.0.1:3000".to_string(),
            hash_replicas: 50,
            peer_timeout_ms: 3000,
            default_ttl: 300,
            booking_cap_ttl: 60,
            cleanup_interval: 1,
            database_url: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Strips trailing slashes so host strings compare and concatenate consistently.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}
