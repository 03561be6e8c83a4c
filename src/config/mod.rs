//! Configuration management.
//!
//! All tunables live in a TOML file with three sections:
//!
//! - [`GameConfig`] - progression and economy constants
//! - [`StorageConfig`] - data persistence settings
//! - [`LoggingConfig`] - logging settings
//!
//! Values are validated on load; `pixelrpg init` writes a default file.
//!
//! ```toml
//! [game]
//! base_xp = 100
//! xp_multiplier = 1.5
//! level_coin_reward = 50
//! max_stamina = 5
//! stamina_regen_minutes = 30
//!
//! [storage]
//! data_dir = "data"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Progression and economy constants. Defaults mirror the classic curve:
/// 100 XP base with a 1.5x multiplier per level, 5 stamina regenerating one
/// point per half hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// XP threshold at which level 1 ends.
    pub base_xp: u64,
    /// Per-level threshold growth factor. Must be above 1.0.
    pub xp_multiplier: f64,
    /// Coins credited per level gained.
    pub level_coin_reward: u64,
    /// Stamina cap for new players.
    pub max_stamina: u32,
    /// Minutes of wall-clock time per regenerated stamina point.
    pub stamina_regen_minutes: i64,
    /// Chance in [0, 1] that a chat message earns XP.
    pub message_xp_chance: f64,
    pub message_xp_min: u64,
    pub message_xp_max: u64,
    /// Chance in [0, 1] of an item drop riding along with message XP.
    pub item_drop_chance: f64,
    /// Minutes between global shop restocks.
    pub restock_interval_minutes: i64,
    /// Currency glyph for adapters to render next to coin amounts.
    pub currency_icon: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_xp: 100,
            xp_multiplier: 1.5,
            level_coin_reward: 50,
            max_stamina: 5,
            stamina_regen_minutes: 30,
            message_xp_chance: 0.25,
            message_xp_min: 5,
            message_xp_max: 15,
            item_drop_chance: 0.1,
            restock_interval_minutes: 1440,
            currency_icon: "🪙".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Validate configuration values, naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        if game.base_xp == 0 {
            return Err(anyhow!("game.base_xp must be positive"));
        }
        if game.xp_multiplier <= 1.0 {
            return Err(anyhow!("game.xp_multiplier must be greater than 1.0"));
        }
        if game.max_stamina == 0 {
            return Err(anyhow!("game.max_stamina must be positive"));
        }
        if game.stamina_regen_minutes <= 0 {
            return Err(anyhow!("game.stamina_regen_minutes must be positive"));
        }
        if !(0.0..=1.0).contains(&game.message_xp_chance) {
            return Err(anyhow!("game.message_xp_chance must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&game.item_drop_chance) {
            return Err(anyhow!("game.item_drop_chance must be in [0, 1]"));
        }
        if game.message_xp_min > game.message_xp_max {
            return Err(anyhow!(
                "game.message_xp_min must not exceed game.message_xp_max"
            ));
        }
        if game.restock_interval_minutes <= 0 {
            return Err(anyhow!("game.restock_interval_minutes must be positive"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(anyhow!(
                "logging.level must be one of off, error, warn, info, debug, trace"
            ));
        }
        Ok(())
    }
}
