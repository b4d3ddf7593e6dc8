//! Configuration: TOML file with per-section defaults and validation on load.
//!
//! Sections:
//! - `[game]` — lobby limits, turn timing, starting money
//! - `[storage]` — data directory for the persistence adapter
//! - `[logging]` — level and optional log file

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Turn duration used when a room does not specify one.
    #[serde(default = "default_turn_time")]
    pub default_turn_time_secs: u64,
    /// Lower clamp for per-room turn duration.
    #[serde(default = "default_min_turn_time")]
    pub min_turn_time_secs: u64,
    /// Starting savings credited through the ledger at game start.
    #[serde(default = "default_initial_deposit")]
    pub initial_deposit: i64,
    /// Cash a player carries while the room is still waiting.
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    /// Minimum (ready) players required to start a game.
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    /// Upper bound on a room's `max_players`.
    #[serde(default = "default_max_players_limit")]
    pub max_players_limit: usize,
}

fn default_turn_time() -> u64 {
    120
}
fn default_min_turn_time() -> u64 {
    5
}
fn default_initial_deposit() -> i64 {
    3_000
}
fn default_starting_cash() -> i64 {
    10_000
}
fn default_min_players() -> usize {
    2
}
fn default_max_players_limit() -> usize {
    8
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_turn_time_secs: default_turn_time(),
            min_turn_time_secs: default_min_turn_time(),
            initial_deposit: default_initial_deposit(),
            starting_cash: default_starting_cash(),
            min_players: default_min_players(),
            max_players_limit: default_max_players_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stdout is used as well when it is a TTY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.game.min_players < 2 {
            return Err(anyhow!("game.min_players must be at least 2"));
        }
        if self.game.max_players_limit < self.game.min_players {
            return Err(anyhow!(
                "game.max_players_limit must be >= game.min_players"
            ));
        }
        if self.game.min_turn_time_secs == 0 {
            return Err(anyhow!("game.min_turn_time_secs must be positive"));
        }
        if self.game.default_turn_time_secs < self.game.min_turn_time_secs {
            return Err(anyhow!(
                "game.default_turn_time_secs must be >= game.min_turn_time_secs"
            ));
        }
        if self.game.initial_deposit < 0 || self.game.starting_cash < 0 {
            return Err(anyhow!("starting money must not be negative"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.game.default_turn_time_secs, 120);
        assert_eq!(config.game.initial_deposit, 3_000);
        assert_eq!(config.game.max_players_limit, 8);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [game]
            default_turn_time_secs = 60

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.game.default_turn_time_secs, 60);
        assert_eq!(config.game.min_players, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.storage.data_dir, "./data");
    }

    #[test]
    fn validation_rejects_inverted_turn_times() {
        let mut config = Config::default();
        config.game.default_turn_time_secs = 2;
        assert!(config.validate().is_err());
    }
}
