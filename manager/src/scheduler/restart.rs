// File: manager/src/scheduler/restart.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, instrument, warn};

use super::{is_due, validate_6_field_cron, TickOutcome, TickSummary};
use crate::constants::restart::SCHEDULER_ACTOR;
use crate::control_plane::ResourceKind;
use crate::database::{ActionStatus, LifecycleAction, TriggerType, WhitelistEntry};
use crate::errors::ManagerError;
use crate::services::action_executor::{ActionExecutor, ActionRequest};

/// Owns the cron job that drives the due-check tick
pub struct RestartScheduler {
    runner: TickRunner,
    tick_schedule: String,
    scheduler: Mutex<Option<JobScheduler>>,
}

/// The tick itself, cloned into the cron job
#[derive(Clone)]
struct TickRunner {
    executor: ActionExecutor,
    tick_guard: Arc<Mutex<()>>,
}

enum EntryResult {
    Succeeded,
    Failed,
    NotDue,
    Busy,
    Error,
}

impl RestartScheduler {
    pub fn new(executor: ActionExecutor, tick_schedule: impl Into<String>) -> Self {
        Self {
            runner: TickRunner {
                executor,
                tick_guard: Arc::new(Mutex::new(())),
            },
            tick_schedule: tick_schedule.into(),
            scheduler: Mutex::new(None),
        }
    }

    #[instrument(skip(self), fields(schedule = %self.tick_schedule))]
    pub async fn start(&self) -> Result<(), ManagerError> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Err(ManagerError::Scheduler("restart scheduler is already running".to_string()));
        }

        validate_6_field_cron(&self.tick_schedule).map_err(|e| {
            ManagerError::Scheduler(format!("Invalid 6-field cron schedule '{}': {}", self.tick_schedule, e))
        })?;

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| ManagerError::Scheduler(format!("Failed to create JobScheduler: {}", e)))?;

        let runner = self.runner.clone();
        let job = Job::new_async(self.tick_schedule.as_str(), move |_uuid, _scheduler| {
            let runner = runner.clone();
            Box::pin(async move {
                match runner.run(Utc::now()).await {
                    Ok(TickOutcome::Completed(summary)) => debug!("Restart tick finished: {:?}", summary),
                    Ok(TickOutcome::Overlapped) => {}
                    Err(e) => error!("Restart tick failed: {}", e),
                }
            })
        })
        .map_err(|e| {
            ManagerError::Scheduler(format!("Failed to create restart job for '{}': {}", self.tick_schedule, e))
        })?;

        scheduler
            .add(job)
            .await
            .map_err(|e| ManagerError::Scheduler(format!("Failed to add restart job: {}", e)))?;
        scheduler
            .start()
            .await
            .map_err(|e| ManagerError::Scheduler(format!("Failed to start scheduler: {}", e)))?;

        *slot = Some(scheduler);
        info!("Restart scheduler started with schedule '{}'", self.tick_schedule);
        Ok(())
    }

    /// Stop firing ticks and wait for a tick already in progress
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            debug!("Restart scheduler was not running");
            return Ok(());
        };

        scheduler
            .shutdown()
            .await
            .map_err(|e| ManagerError::Scheduler(format!("Failed to shut down scheduler: {}", e)))?;

        let _in_flight = self.runner.tick_guard.lock().await;
        info!("Restart scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Run one tick now
    pub async fn run_tick(&self) -> Result<TickOutcome, ManagerError> {
        self.runner.run(Utc::now()).await
    }

    /// Run one tick as if the clock read `now`
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, ManagerError> {
        self.runner.run(now).await
    }
}

impl TickRunner {
    #[instrument(skip(self))]
    async fn run(&self, now: DateTime<Utc>) -> Result<TickOutcome, ManagerError> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            warn!("Previous restart tick still running, skipping this one");
            return Ok(TickOutcome::Overlapped);
        };

        let entries = self.executor.database().get_enabled_whitelist().await?;
        if entries.is_empty() {
            info!("No enabled whitelist entries, nothing to restart");
            return Ok(TickOutcome::Completed(TickSummary::default()));
        }

        let inventory: HashMap<i64, ResourceKind> = self
            .executor
            .control_plane()
            .list_resources()
            .await?
            .into_iter()
            .map(|r| (r.resource_id, r.kind))
            .collect();

        let mut summary = TickSummary {
            entries: entries.len(),
            ..TickSummary::default()
        };

        for entry in &entries {
            let Some(kind) = inventory.get(&entry.resource_id).copied() else {
                warn!(
                    "Whitelisted resource {} ({}) on {} no longer exists, skipping",
                    entry.resource_id, entry.resource_name, entry.node
                );
                summary.missing += 1;
                continue;
            };

            match self.process_entry(entry, kind, now).await {
                EntryResult::Succeeded => summary.succeeded += 1,
                EntryResult::Failed => summary.failed += 1,
                EntryResult::NotDue => summary.not_due += 1,
                EntryResult::Busy => summary.busy += 1,
                EntryResult::Error => summary.errors += 1,
            }
        }

        info!(
            "Restart tick: {} entries, {} restarted, {} failed, {} not due, {} missing, {} busy, {} errors",
            summary.entries,
            summary.succeeded,
            summary.failed,
            summary.not_due,
            summary.missing,
            summary.busy,
            summary.errors
        );
        Ok(TickOutcome::Completed(summary))
    }

    async fn process_entry(&self, entry: &WhitelistEntry, kind: ResourceKind, now: DateTime<Utc>) -> EntryResult {
        let last_restart = match self
            .executor
            .database()
            .last_successful_restart(entry.resource_id)
            .await
        {
            Ok(last) => last,
            Err(e) => {
                error!(
                    "Could not read restart history of {}: {}",
                    entry.resource_id, e
                );
                return EntryResult::Error;
            }
        };

        if !is_due(last_restart, entry.restart_interval_hours, now) {
            debug!(
                "Resource {} not due (last restart {:?}, every {}h)",
                entry.resource_id, last_restart, entry.restart_interval_hours
            );
            return EntryResult::NotDue;
        }

        let request = ActionRequest {
            resource_id: entry.resource_id,
            resource_name: entry.resource_name.clone(),
            node: entry.node.clone(),
            kind,
            action: LifecycleAction::Restart,
            trigger_type: TriggerType::Auto,
            triggered_by: SCHEDULER_ACTOR.to_string(),
        };

        info!(
            "Restarting {} ({}) on {}",
            entry.resource_id, entry.resource_name, entry.node
        );

        // Spawned so a panic in one action stays confined to its entry
        let executor = self.executor.clone();
        let task_request = request.clone();
        let handle = tokio::spawn(async move { executor.perform(task_request).await });

        match handle.await {
            Ok(Ok(record)) if record.status == ActionStatus::Success => EntryResult::Succeeded,
            Ok(Ok(_)) => EntryResult::Failed,
            Ok(Err(ManagerError::ResourceBusy { operation, .. })) => {
                warn!(
                    "Skipping {}: busy with '{}'",
                    entry.resource_id, operation
                );
                EntryResult::Busy
            }
            Ok(Err(e)) => {
                error!("Restart of {} was not performed: {}", entry.resource_id, e);
                EntryResult::Error
            }
            Err(join_err) => {
                error!("Restart of {} crashed: {}", entry.resource_id, join_err);
                self.executor
                    .recover_aborted(&request, &format!("action task crashed: {}", join_err))
                    .await;
                EntryResult::Failed
            }
        }
    }
}
