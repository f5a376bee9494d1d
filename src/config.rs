//! Environment-driven configuration

use std::env;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub room: RoomConfig,
    pub ice: IceConfig,
    pub session: SessionConfig,
    pub log_level: String,
}

/// Room housekeeping.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Interval of the empty-room sweep, in milliseconds.
    pub sweep_interval_ms: u64,
}

/// ICE server list handed to negotiation objects.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub stun_servers: Vec<String>,
}

/// Client-side session engine tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a link may sit in the disconnected state before teardown.
    pub disconnect_grace_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5800".to_string())
                .parse()
                .unwrap_or(5800),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            room: RoomConfig {
                sweep_interval_ms: env::var("ROOM_SWEEP_MS")
                    .unwrap_or_else(|_| "300000".to_string())
                    .parse()
                    .unwrap_or(300_000),
            },
            ice: IceConfig {
                stun_servers: env::var("STUN_SERVERS")
                    .unwrap_or_else(|_| "stun:stun.l.google.com:19302".to_string())
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            session: SessionConfig {
                disconnect_grace_ms: env::var("DISCONNECT_GRACE_MS")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disconnect_grace_ms: 3000,
        }
    }
}
