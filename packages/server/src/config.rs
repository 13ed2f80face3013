use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin, which SSE clients on
    /// arbitrary frontends need.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Tunables of the room/event hubs.
#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    /// Capacity of each room's event queue. Default: 10.
    #[serde(default = "default_room_queue_capacity")]
    pub room_queue_capacity: usize,
    /// Capacity of the cross-room guild update channel. Default: 100.
    #[serde(default = "default_guild_update_capacity")]
    pub guild_update_capacity: usize,
    /// Buffer of each listener's delivery channel. Default: 16.
    #[serde(default = "default_listener_buffer")]
    pub listener_buffer: usize,
    /// Wall-clock bound on store operations issued by the hubs. Default: 10s.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_room_queue_capacity() -> usize {
    10
}
fn default_guild_update_capacity() -> usize {
    100
}
fn default_listener_buffer() -> usize {
    16
}
fn default_query_timeout_secs() -> u64 {
    10
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            room_queue_capacity: default_room_queue_capacity(),
            guild_update_capacity: default_guild_update_capacity(),
            listener_buffer: default_listener_buffer(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl HubConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., ARENA__DATABASE__URL)
            .add_source(Environment::with_prefix("ARENA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
