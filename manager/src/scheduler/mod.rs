//! Periodic due-check scheduling for automatic restarts
//!
//! This module drives the restart loop:
//! - A cron job fires the tick (hourly by default)
//! - Each tick restarts every enabled whitelist entry whose interval has elapsed
//!
//! # Features
//!
//! - **Cron-based scheduling**: Uses 6-field cron expressions (sec min hour day month dow)
//! - **One inventory fetch per tick**: Resource types come from a single control-plane listing
//! - **Non-overlapping ticks**: A tick that fires while another is running is skipped
//! - **Failure isolation**: One resource failing never stops the rest of the tick
//!
//! # Configuration
//!
//! The tick schedule lives in `config/main.toml`:
//!
//! ```toml
//! tick_schedule = "0 0 * * * *"  # Every hour, on the hour
//! ```

pub mod restart;
pub use restart::RestartScheduler;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

/// A resource is due when it never restarted successfully, or when at least
/// `interval_hours` have passed since it last did (boundary inclusive)
pub fn is_due(last_restart: Option<DateTime<Utc>>, interval_hours: i64, now: DateTime<Utc>) -> bool {
    match last_restart {
        None => true,
        Some(last) => now.signed_duration_since(last) >= Duration::hours(interval_hours),
    }
}

/// What one tick did, entry by entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Enabled whitelist entries considered
    pub entries: usize,
    /// Restarted successfully
    pub succeeded: usize,
    /// Dispatched but the action failed
    pub failed: usize,
    pub not_due: usize,
    /// Absent from the live inventory
    pub missing: usize,
    /// Another action held the resource
    pub busy: usize,
    /// Could not be evaluated or dispatched (store errors)
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TickOutcome {
    Completed(TickSummary),
    /// The previous tick was still running
    Overlapped,
}

/// Check a 6-field cron expression (sec min hour day month dow) before handing it to the scheduler
pub fn validate_6_field_cron(schedule: &str) -> Result<()> {
    let parts: Vec<&str> = schedule.split_whitespace().collect();

    if parts.len() != 6 {
        return Err(anyhow!(
            "expected exactly 6 fields: second minute hour day month dayofweek. Got {} fields: '{}'",
            parts.len(),
            schedule
        ));
    }

    validate_cron_field(parts[0], "second", 0, 59)?;
    validate_cron_field(parts[1], "minute", 0, 59)?;
    validate_cron_field(parts[2], "hour", 0, 23)?;
    validate_cron_field(parts[3], "day", 1, 31)?;
    validate_cron_field(parts[4], "month", 1, 12)?;
    validate_cron_field(parts[5], "dayofweek", 0, 7)?;

    debug!("Validated 6-field cron: '{}'", schedule);
    Ok(())
}

fn validate_cron_field(field: &str, name: &str, min: u32, max: u32) -> Result<()> {
    if field == "*" || field == "?" {
        return Ok(());
    }

    let check = |value: u32| -> Result<()> {
        if value < min || value > max {
            return Err(anyhow!("{} value {} is outside valid range {}-{}", name, value, min, max));
        }
        Ok(())
    };

    if let Some(step_str) = field.strip_prefix("*/") {
        let step = step_str
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} step value: {}", name, step_str))?;
        if step == 0 {
            return Err(anyhow!("{} step value cannot be 0", name));
        }
        return Ok(());
    }

    if field.contains(',') {
        for part in field.split(',') {
            let value = part
                .parse::<u32>()
                .map_err(|_| anyhow!("Invalid {} value in list: {}", name, part))?;
            check(value)?;
        }
        return Ok(());
    }

    if let Some((start, end)) = field.split_once('-') {
        let start = start
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} range start: {}", name, start))?;
        let end = end
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} range end: {}", name, end))?;
        check(start)?;
        check(end)?;
        if start > end {
            return Err(anyhow!("{} range {}-{} is reversed", name, start, end));
        }
        return Ok(());
    }

    let value = field
        .parse::<u32>()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, field))?;
    check(value)
}
