// File: manager/src/config/manager.rs
use super::Config;
use crate::scheduler::validate_6_field_cron;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);
        debug!("Loading main config: {}", main_config_path);

        let main_config_content = fs::read_to_string(&main_config_path).await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let config = Self::parse(&main_config_content)?;

        info!(
            "Loaded configuration: database={}, tick_schedule='{}', action_timeout={}s",
            config.database_path, config.tick_schedule, config.action_timeout_seconds
        );

        Ok(config)
    }

    /// Parse and validate a `main.toml` document
    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<()> {
        validate_6_field_cron(&config.tick_schedule)
            .map_err(|e| anyhow!("Invalid tick_schedule '{}': {}", config.tick_schedule, e))?;

        if config.action_timeout_seconds == 0 {
            return Err(anyhow!("action_timeout_seconds must be greater than 0"));
        }
        if config.stuck_pending_minutes <= 0 {
            return Err(anyhow!("stuck_pending_minutes must be greater than 0"));
        }
        if config.database_path.trim().is_empty() {
            return Err(anyhow!("database_path must not be empty"));
        }
        Ok(())
    }
}
