//! Test configuration builder for writing `main.toml` into a temporary directory

use std::fs;
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct TestConfigBuilder {
    temp_dir: TempDir,
    database_path: Option<String>,
    tick_schedule: Option<String>,
    action_timeout_seconds: Option<i64>,
    stuck_pending_minutes: Option<i64>,
    pvesh_path: Option<String>,
    extra: String,
}

/// A written configuration; the directory lives as long as this value
pub struct TestConfig {
    _temp_dir: TempDir,
    pub config_dir: String,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            temp_dir,
            database_path: None,
            tick_schedule: None,
            action_timeout_seconds: None,
            stuck_pending_minutes: None,
            pvesh_path: None,
            extra: String::new(),
        }
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.database_path = Some(path.to_string());
        self
    }

    pub fn tick_schedule(mut self, schedule: &str) -> Self {
        self.tick_schedule = Some(schedule.to_string());
        self
    }

    pub fn action_timeout(mut self, seconds: i64) -> Self {
        self.action_timeout_seconds = Some(seconds);
        self
    }

    pub fn stuck_pending_minutes(mut self, minutes: i64) -> Self {
        self.stuck_pending_minutes = Some(minutes);
        self
    }

    pub fn pvesh_path(mut self, path: &str) -> Self {
        self.pvesh_path = Some(path.to_string());
        self
    }

    /// Append raw TOML after the generated keys
    pub fn raw(mut self, toml: &str) -> Self {
        self.extra.push_str(toml);
        self
    }

    fn to_toml(&self) -> String {
        let mut toml = String::new();
        if let Some(path) = &self.database_path {
            toml.push_str(&format!("database_path = \"{}\"\n", path));
        }
        if let Some(schedule) = &self.tick_schedule {
            toml.push_str(&format!("tick_schedule = \"{}\"\n", schedule));
        }
        if let Some(seconds) = self.action_timeout_seconds {
            toml.push_str(&format!("action_timeout_seconds = {}\n", seconds));
        }
        if let Some(minutes) = self.stuck_pending_minutes {
            toml.push_str(&format!("stuck_pending_minutes = {}\n", minutes));
        }
        toml.push_str(&self.extra);
        if let Some(path) = &self.pvesh_path {
            toml.push_str(&format!("\n[control_plane]\npvesh_path = \"{}\"\n", path));
        }
        toml
    }

    /// Write `main.toml` and return the config directory
    pub fn build(self) -> TestConfig {
        let config_dir = self.temp_dir.path().to_string_lossy().to_string();
        fs::write(self.temp_dir.path().join("main.toml"), self.to_toml())
            .expect("Failed to write main.toml");

        TestConfig {
            _temp_dir: self.temp_dir,
            config_dir,
        }
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
