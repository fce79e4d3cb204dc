// File: manager/src/config/mod.rs
pub mod manager;
use crate::constants::defaults;
use serde::{Deserialize, Serialize};
pub use manager::ConfigManager;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// 6-field cron expression driving the due-check tick
    #[serde(default = "default_tick_schedule")]
    pub tick_schedule: String,
    #[serde(default = "default_action_timeout")]
    pub action_timeout_seconds: u64,
    #[serde(default = "default_stuck_pending_minutes")]
    pub stuck_pending_minutes: i64,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_pvesh_path")]
    pub pvesh_path: String,
    #[serde(default = "default_pct_path")]
    pub pct_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            tick_schedule: default_tick_schedule(),
            action_timeout_seconds: default_action_timeout(),
            stuck_pending_minutes: default_stuck_pending_minutes(),
            control_plane: ControlPlaneConfig::default(),
        }
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            pvesh_path: default_pvesh_path(),
            pct_path: default_pct_path(),
        }
    }
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_tick_schedule() -> String {
    defaults::TICK_SCHEDULE.to_string()
}

fn default_action_timeout() -> u64 {
    defaults::ACTION_TIMEOUT_SECONDS
}

fn default_stuck_pending_minutes() -> i64 {
    defaults::STUCK_PENDING_MINUTES
}

fn default_pvesh_path() -> String {
    defaults::PVESH_PATH.to_string()
}

fn default_pct_path() -> String {
    defaults::PCT_PATH.to_string()
}
