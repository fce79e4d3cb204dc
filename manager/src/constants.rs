//! Central repository for timeouts, intervals and defaults
//!
//! Constants are grouped by concern so the scheduler, executor and store agree
//! on the same numbers.

/// Restart policy constants
pub mod restart {
    /// Interval applied when a whitelist entry is registered with a value below the floor
    pub const DEFAULT_INTERVAL_HOURS: i64 = 6;

    /// Smallest interval a whitelist entry may carry
    pub const MIN_INTERVAL_HOURS: i64 = 1;

    /// Actor recorded on scheduler-triggered actions
    pub const SCHEDULER_ACTOR: &str = "system";

    /// Actor recorded when a manual caller does not identify itself
    pub const DEFAULT_MANUAL_ACTOR: &str = "api";
}

/// Default configuration values
pub mod defaults {
    /// Hourly, on the hour (6-field cron: sec min hour day month dow)
    pub const TICK_SCHEDULE: &str = "0 0 * * * *";

    pub const DATABASE_PATH: &str = "data/autorestart.db";

    /// Upper bound on a single control-plane action
    pub const ACTION_TIMEOUT_SECONDS: u64 = 600;

    /// Pending audit records older than this are failed on startup
    pub const STUCK_PENDING_MINUTES: i64 = 60;

    pub const PVESH_PATH: &str = "pvesh";

    pub const PCT_PATH: &str = "pct";
}

/// Cleanup constants
pub mod cleanup {
    /// Hours after which a held resource lock is considered stuck
    pub const OPERATION_CLEANUP_HOURS: i64 = 24;

    /// Cleanup interval in seconds
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 3600;
}

/// Limits and constraints
pub mod limits {
    /// Page size for audit queries when the caller does not ask for one
    pub const DEFAULT_LOG_LIMIT: i64 = 100;
}

/// Provisioning constants
pub mod provisioning {
    /// First id handed out when the cluster is empty
    pub const MIN_RESOURCE_ID: i64 = 100;

    /// Commands run inside every freshly cloned container before user commands
    pub const BASE_SETUP_COMMANDS: &[&str] = &[
        "apt-get update && apt-get install -y locales",
        "locale-gen en_US.UTF-8",
        "update-locale LANG=en_US.UTF-8",
        "apt-get update && apt-get install -y curl wget",
    ];
}
