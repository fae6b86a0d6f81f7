use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::error::Error;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sizing and sweep settings applied to repositories built with `with_config`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub initial_capacity: usize,
    /// 0 keeps the concurrent map's default shard count.
    pub shard_amount: usize,
    /// Weak repositories sweep dead slots after this many insertions; 0 disables.
    pub auto_purge_threshold: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub debug_log: bool,
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.shard_amount != 0 && (self.shard_amount < 2 || !self.shard_amount.is_power_of_two())
        {
            return Err(Error::Config(format!(
                "shard_amount must be 0 or a power of two greater than 1, got {}",
                self.shard_amount
            )));
        }
        Ok(())
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".flyweight.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.repository.validate()?;

        Ok(Some(config))
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("Created default configuration file.");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("Current configuration:");
            println!("   Initial Capacity: {}", config.repository.initial_capacity);
            println!("   Shard Amount: {}", config.repository.shard_amount);
            println!("   Auto Purge Threshold: {}", config.repository.auto_purge_threshold);
            println!("   Debug Log: {}", config.logging.debug_log);
        }
        None => {
            println!("No configuration file found.");
            println!("   Run 'flyweight config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "initial-capacity" => {
            config.repository.initial_capacity =
                value.parse::<usize>().context("Invalid number value")?;
        }
        "shard-amount" => {
            config.repository.shard_amount =
                value.parse::<usize>().context("Invalid number value")?;
        }
        "auto-purge-threshold" => {
            config.repository.auto_purge_threshold =
                value.parse::<usize>().context("Invalid number value")?;
        }
        "debug-log" => {
            config.logging.debug_log = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.repository.validate()?;
    config.save(false)?;
    Ok(())
}
