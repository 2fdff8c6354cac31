//! Server configuration loaded from environment variables

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// JSON file with the candidate roster (None = built-in roster)
    pub roster_path: Option<PathBuf>,
    /// Ledger snapshot file (None = in-memory only)
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    /// Directory holding the built frontend
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            roster_path: None,
            snapshot_path: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = match non_empty_var("BALLOT_HOST") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BALLOT_HOST {:?}: {}, using default", raw, e);
                defaults.host
            }),
            None => defaults.host,
        };

        let port = match non_empty_var("BALLOT_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BALLOT_PORT {:?}: {}, using default", raw, e);
                defaults.port
            }),
            None => defaults.port,
        };

        let snapshot_interval = non_empty_var("SNAPSHOT_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.snapshot_interval);

        let config = Self {
            host,
            port,
            roster_path: non_empty_var("ROSTER_PATH").map(PathBuf::from),
            snapshot_path: non_empty_var("SNAPSHOT_PATH").map(PathBuf::from),
            snapshot_interval,
            static_dir: non_empty_var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        };

        tracing::info!(
            addr = %config.addr(),
            roster = ?config.roster_path,
            snapshot = ?config.snapshot_path,
            "Server config loaded"
        );

        config
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Read an env var, treating blank values as unset
pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BALLOT_HOST",
            "BALLOT_PORT",
            "ROSTER_PATH",
            "SNAPSHOT_PATH",
            "SNAPSHOT_INTERVAL_SECS",
            "STATIC_DIR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.roster_path.is_none());
        assert!(config.snapshot_path.is_none());
        assert_eq!(config.snapshot_interval, DEFAULT_SNAPSHOT_INTERVAL);
    }

    #[test]
    #[serial]
    fn test_reads_env_overrides() {
        clear_env();
        std::env::set_var("BALLOT_PORT", "9090");
        std::env::set_var("SNAPSHOT_PATH", "/tmp/ledger.json");
        std::env::set_var("SNAPSHOT_INTERVAL_SECS", "30");
        std::env::set_var("ROSTER_PATH", "   ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 9090);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/ledger.json")));
        assert_eq!(config.snapshot_interval, Duration::from_secs(30));
        assert!(config.roster_path.is_none(), "blank values count as unset");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_falls_back() {
        clear_env();
        std::env::set_var("BALLOT_PORT", "not-a-port");
        let config = ServerConfig::from_env();
        assert_eq!(config.port, DEFAULT_PORT);
        clear_env();
    }
}
