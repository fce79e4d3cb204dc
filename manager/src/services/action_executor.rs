// File: manager/src/services/action_executor.rs
//
// Audited execution of a single power action against one resource
//
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::control_plane::{is_already_running, ActionOutput, ControlPlane, ResourceKind};
use crate::database::{ActionStatus, AuditLogRecord, Database, LifecycleAction, TriggerType};
use crate::errors::ManagerError;
use crate::operation_tracker::SimpleOperationTracker;

/// Everything `perform` needs to know about one dispatch
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub resource_id: i64,
    pub resource_name: String,
    pub node: String,
    pub kind: ResourceKind,
    pub action: LifecycleAction,
    pub trigger_type: TriggerType,
    pub triggered_by: String,
}

/// Error text recorded when the control plane does not answer in time
pub const TIMEOUT_MESSAGE: &str = "timeout";

#[derive(Clone)]
pub struct ActionExecutor {
    database: Arc<Database>,
    control_plane: Arc<dyn ControlPlane>,
    tracker: SimpleOperationTracker,
    action_timeout: Duration,
}

impl ActionExecutor {
    pub fn new(
        database: Arc<Database>,
        control_plane: Arc<dyn ControlPlane>,
        tracker: SimpleOperationTracker,
        action_timeout: Duration,
    ) -> Self {
        Self {
            database,
            control_plane,
            tracker,
            action_timeout,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    pub fn tracker(&self) -> &SimpleOperationTracker {
        &self.tracker
    }

    /// Run one power action and return its completed audit record.
    ///
    /// # Returns
    /// * `Ok(record)` - the action was dispatched; `record.status` says how it went
    /// * `Err(ResourceBusy)` - another action holds the resource, nothing recorded
    /// * `Err(Database)` - the pending record could not be written, nothing dispatched
    #[instrument(
        skip(self, request),
        fields(resource_id = request.resource_id, node = %request.node, action = %request.action)
    )]
    pub async fn perform(&self, request: ActionRequest) -> Result<AuditLogRecord, ManagerError> {
        if !request.action.is_power_action() {
            return Err(ManagerError::validation(
                "action",
                format!("'{}' is not a power action", request.action),
            ));
        }

        self.claim(&request).await?;
        self.perform_claimed(request).await
    }

    /// Take the per-resource lock for `request` without running it
    pub async fn claim(&self, request: &ActionRequest) -> Result<(), ManagerError> {
        self.tracker
            .try_start_operation(
                &request.node,
                request.resource_id,
                request.action.as_str(),
                Some(request.triggered_by.clone()),
            )
            .await
    }

    /// Run an action whose lock the caller already took with [`claim`](Self::claim).
    ///
    /// The lock is released when this returns.
    pub async fn perform_claimed(&self, request: ActionRequest) -> Result<AuditLogRecord, ManagerError> {
        let result = self.perform_locked(&request).await;
        self.tracker
            .finish_operation(&request.node, request.resource_id)
            .await;
        result
    }

    async fn perform_locked(&self, request: &ActionRequest) -> Result<AuditLogRecord, ManagerError> {
        let mut record = AuditLogRecord::pending(
            request.resource_id,
            &request.resource_name,
            &request.node,
            request.action,
            request.trigger_type,
            &request.triggered_by,
        );

        record.id = match self.database.create_audit_record(&record).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    "Not dispatching {} of {}: audit record could not be written: {}",
                    request.action, request.resource_id, e
                );
                return Err(e.into());
            }
        };

        let started = Instant::now();
        let outcome = self.call_control_plane(request).await;
        let elapsed = started.elapsed();

        let succeeded = outcome.is_success()
            || (request.action == LifecycleAction::Start && is_already_running(&outcome.output));

        record.status = if succeeded {
            ActionStatus::Success
        } else {
            ActionStatus::Failed
        };
        record.error_message = if succeeded { None } else { outcome.failure };
        record.output = Some(outcome.output).filter(|o| !o.is_empty());
        record.completed_at = Some(Utc::now());
        record.duration_seconds = Some(elapsed.as_secs() as i64);

        if succeeded {
            info!(
                "{} of {} ({}) on {} succeeded in {}s",
                request.action,
                request.resource_id,
                request.resource_name,
                request.node,
                elapsed.as_secs()
            );
        } else {
            error!(
                "{} of {} ({}) on {} failed: {}",
                request.action,
                request.resource_id,
                request.resource_name,
                request.node,
                record.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        // The action already happened; a lost completion update is only logged
        if let Err(e) = self.database.complete_audit_record(&record).await {
            error!(
                "Failed to complete audit record {} for {}: {}",
                record.id, request.resource_id, e
            );
        }

        Ok(record)
    }

    /// Bounded control-plane call; timeouts, transport errors and task panics all
    /// come back as a failed [`ActionOutput`]
    async fn call_control_plane(&self, request: &ActionRequest) -> ActionOutput {
        let control_plane = self.control_plane.clone();
        let node = request.node.clone();
        let (resource_id, kind, action) = (request.resource_id, request.kind, request.action);

        let mut handle = tokio::spawn(async move {
            control_plane
                .perform_action(&node, resource_id, kind, action)
                .await
        });

        match tokio::time::timeout(self.action_timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => output,
            Ok(Ok(Err(e))) => ActionOutput::failed(String::new(), e.to_string()),
            Ok(Err(join_err)) => {
                ActionOutput::failed(String::new(), format!("control plane call aborted: {}", join_err))
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "{} of {} timed out after {}s",
                    action,
                    resource_id,
                    self.action_timeout.as_secs()
                );
                ActionOutput::failed(String::new(), TIMEOUT_MESSAGE)
            }
        }
    }

    /// Clean up after a `perform` task that died before completing its record
    pub async fn recover_aborted(&self, request: &ActionRequest, reason: &str) {
        match self
            .database
            .fail_pending_records(request.resource_id, &request.node, request.action, reason)
            .await
        {
            Ok(count) => warn!(
                "Marked {} pending {} record(s) of {} as failed: {}",
                count, request.action, request.resource_id, reason
            ),
            Err(e) => error!(
                "Failed to fail pending records of {}: {}",
                request.resource_id, e
            ),
        }
        self.tracker
            .finish_operation(&request.node, request.resource_id)
            .await;
    }
}
