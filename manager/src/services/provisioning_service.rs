// File: manager/src/services/provisioning_service.rs
//
// Container provisioning: audited deploys, deletes with record cascade, id suggestions
//
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::constants::provisioning::{BASE_SETUP_COMMANDS, MIN_RESOURCE_ID};
use crate::constants::restart::DEFAULT_MANUAL_ACTOR;
use crate::control_plane::{is_already_running, ActionOutput, ControlPlane, ResourceKind};
use crate::database::{
    ActionStatus, AuditLogRecord, ContainerService, Database, LifecycleAction, ServiceType,
    TriggerType,
};
use crate::errors::{ControlPlaneError, ManagerError};
use crate::operation_tracker::SimpleOperationTracker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub source_id: i64,
    pub new_id: i64,
    pub node: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub commands: Vec<String>,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

impl DeployRequest {
    /// Name recorded for the install: the hostname, or a generated one
    pub fn service_name(&self) -> String {
        match self.hostname.as_deref().map(str::trim) {
            Some(hostname) if !hostname.is_empty() => hostname.to_string(),
            _ => format!("blockchain-node-{}", self.new_id),
        }
    }
}

/// A bare template clone, without the start and setup steps of a deploy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneRequest {
    pub source_id: i64,
    pub new_id: i64,
    pub node: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<String>,
}

/// Records removed by [`ProvisioningService::delete_resource`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeleteSummary {
    pub whitelist_removed: u64,
    pub services_removed: u64,
}

struct StepFailure {
    step: String,
    reason: String,
}

#[derive(Clone)]
pub struct ProvisioningService {
    database: Arc<Database>,
    control_plane: Arc<dyn ControlPlane>,
    tracker: SimpleOperationTracker,
}

impl ProvisioningService {
    pub fn new(
        database: Arc<Database>,
        control_plane: Arc<dyn ControlPlane>,
        tracker: SimpleOperationTracker,
    ) -> Self {
        Self {
            database,
            control_plane,
            tracker,
        }
    }

    /// Clone, start and set up a new container, recording the whole run as one `deploy` action.
    ///
    /// Steps stop at the first failure. The returned record carries the outcome;
    /// `Err` means the deploy never started.
    #[instrument(skip(self, request), fields(source = request.source_id, new_id = request.new_id, node = %request.node))]
    pub async fn deploy(&self, request: DeployRequest) -> Result<AuditLogRecord, ManagerError> {
        Self::validate_deploy(&request)?;

        self.tracker
            .try_start_operation(
                &request.node,
                request.new_id,
                LifecycleAction::Deploy.as_str(),
                request.triggered_by.clone(),
            )
            .await?;

        let result = self.deploy_locked(&request).await;
        self.tracker.finish_operation(&request.node, request.new_id).await;
        result
    }

    fn validate_clone_target(source_id: i64, new_id: i64, node: &str) -> Result<(), ManagerError> {
        if source_id <= 0 {
            return Err(ManagerError::validation("source_id", "must be positive"));
        }
        if new_id <= 0 {
            return Err(ManagerError::validation("new_id", "must be positive"));
        }
        if source_id == new_id {
            return Err(ManagerError::validation("new_id", "must differ from source_id"));
        }
        if node.trim().is_empty() {
            return Err(ManagerError::validation("node", "must not be empty"));
        }
        Ok(())
    }

    fn validate_deploy(request: &DeployRequest) -> Result<(), ManagerError> {
        Self::validate_clone_target(request.source_id, request.new_id, &request.node)?;
        if request.commands.iter().all(|c| c.trim().is_empty()) {
            return Err(ManagerError::validation("commands", "at least one command is required"));
        }
        Ok(())
    }

    async fn deploy_locked(&self, request: &DeployRequest) -> Result<AuditLogRecord, ManagerError> {
        let service_name = request.service_name();
        let triggered_by = actor(request.triggered_by.as_deref());

        let mut record = AuditLogRecord::pending(
            request.new_id,
            &service_name,
            &request.node,
            LifecycleAction::Deploy,
            TriggerType::Manual,
            triggered_by,
        );
        record.id = self.database.create_audit_record(&record).await?;

        let started = Instant::now();
        let mut transcript = String::new();
        let outcome = self.run_deploy_steps(request, &mut transcript).await;
        let elapsed = started.elapsed();

        settle_record(&mut record, &outcome, transcript, elapsed);

        match outcome {
            Ok(()) => {
                let commands = request.commands.join("\n");
                let service_type = request
                    .commands
                    .first()
                    .map(|c| ServiceType::from_command(c))
                    .unwrap_or(ServiceType::Custom);

                if let Err(e) = self
                    .database
                    .upsert_container_service(
                        request.new_id,
                        &request.node,
                        &service_name,
                        service_type,
                        Some(commands.as_str()),
                    )
                    .await
                {
                    error!("Failed to record service '{}': {}", service_name, e);
                }
                info!(
                    "Deployed {} as {} on {} in {}s",
                    service_name,
                    request.new_id,
                    request.node,
                    elapsed.as_secs()
                );
            }
            Err(failure) => {
                error!(
                    "Deploy of {} on {} failed at {}: {}",
                    request.new_id, request.node, failure.step, failure.reason
                );
            }
        }

        if let Err(e) = self.database.complete_audit_record(&record).await {
            error!("Failed to complete deploy record {}: {}", record.id, e);
        }
        Ok(record)
    }

    async fn run_deploy_steps(
        &self,
        request: &DeployRequest,
        transcript: &mut String,
    ) -> Result<(), StepFailure> {
        let hostname = request.hostname.as_deref().map(str::trim);
        let cloned = self
            .control_plane
            .clone_container(request.source_id, request.new_id, &request.node, hostname)
            .await;
        Self::check_step("clone", cloned, transcript, false)?;

        let started = self
            .control_plane
            .perform_action(
                &request.node,
                request.new_id,
                ResourceKind::Container,
                LifecycleAction::Start,
            )
            .await;
        Self::check_step("start", started, transcript, true)?;

        for (i, command) in BASE_SETUP_COMMANDS.iter().enumerate() {
            let result = self.control_plane.exec_in_container(request.new_id, command).await;
            Self::check_step(&format!("base setup command {}", i + 1), result, transcript, false)?;
        }

        let user_commands = request.commands.iter().filter(|c| !c.trim().is_empty());
        for (i, command) in user_commands.enumerate() {
            let result = self.control_plane.exec_in_container(request.new_id, command).await;
            Self::check_step(&format!("command {}", i + 1), result, transcript, false)?;
        }

        Ok(())
    }

    fn check_step(
        step: &str,
        result: Result<ActionOutput, ControlPlaneError>,
        transcript: &mut String,
        already_running_ok: bool,
    ) -> Result<(), StepFailure> {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                return Err(StepFailure {
                    step: step.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        transcript.push_str(&output.output);

        match output.failure {
            None => Ok(()),
            Some(_) if already_running_ok && is_already_running(&output.output) => Ok(()),
            Some(reason) => Err(StepFailure {
                step: step.to_string(),
                reason,
            }),
        }
    }

    /// Clone a template into a new container and record it as one `clone` action.
    ///
    /// The clone is left stopped and nothing is installed in it.
    #[instrument(skip(self, request), fields(source = request.source_id, new_id = request.new_id, node = %request.node))]
    pub async fn clone_container(&self, request: CloneRequest) -> Result<AuditLogRecord, ManagerError> {
        Self::validate_clone_target(request.source_id, request.new_id, &request.node)?;

        self.tracker
            .try_start_operation(
                &request.node,
                request.new_id,
                LifecycleAction::Clone.as_str(),
                request.triggered_by.clone(),
            )
            .await?;

        let result = self.clone_locked(&request).await;
        self.tracker.finish_operation(&request.node, request.new_id).await;
        result
    }

    async fn clone_locked(&self, request: &CloneRequest) -> Result<AuditLogRecord, ManagerError> {
        let hostname = request
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty());
        let name = hostname
            .map(str::to_string)
            .unwrap_or_else(|| format!("clone-of-{}", request.source_id));

        let mut record = AuditLogRecord::pending(
            request.new_id,
            &name,
            &request.node,
            LifecycleAction::Clone,
            TriggerType::Manual,
            actor(request.triggered_by.as_deref()),
        );
        record.id = self.database.create_audit_record(&record).await?;

        let started = Instant::now();
        let mut transcript = String::new();
        let cloned = self
            .control_plane
            .clone_container(request.source_id, request.new_id, &request.node, hostname)
            .await;
        let outcome = Self::check_step("clone", cloned, &mut transcript, false);

        settle_record(&mut record, &outcome, transcript, started.elapsed());
        match &outcome {
            Ok(()) => info!(
                "Cloned {} to {} ({}) on {}",
                request.source_id, request.new_id, name, request.node
            ),
            Err(failure) => error!(
                "Clone of {} to {} failed: {}",
                request.source_id, request.new_id, failure.reason
            ),
        }

        if let Err(e) = self.database.complete_audit_record(&record).await {
            error!("Failed to complete clone record {}: {}", record.id, e);
        }
        Ok(record)
    }

    /// Destroy a container and drop its whitelist and service records.
    ///
    /// A running container is stopped first. Audit history is kept.
    #[instrument(skip(self))]
    pub async fn delete_resource(&self, resource_id: i64, node: &str) -> Result<DeleteSummary, ManagerError> {
        if resource_id <= 0 {
            return Err(ManagerError::validation("resource_id", "must be positive"));
        }
        if node.trim().is_empty() {
            return Err(ManagerError::validation("node", "must not be empty"));
        }

        self.tracker
            .try_start_operation(node, resource_id, "delete", None)
            .await?;
        let result = self.delete_locked(resource_id, node).await;
        self.tracker.finish_operation(node, resource_id).await;
        result
    }

    async fn delete_locked(&self, resource_id: i64, node: &str) -> Result<DeleteSummary, ManagerError> {
        match self.control_plane.get_resource(node, resource_id).await {
            Ok(Some(resource)) if resource.is_running() => {
                info!("Stopping {} on {} before destroying it", resource_id, node);
                match self
                    .control_plane
                    .perform_action(node, resource_id, resource.kind, LifecycleAction::Stop)
                    .await
                {
                    Ok(output) if output.is_success() => {}
                    Ok(output) => warn!(
                        "Stop of {} before delete failed: {}",
                        resource_id,
                        output.failure.unwrap_or_default()
                    ),
                    Err(e) => warn!("Stop of {} before delete failed: {}", resource_id, e),
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not look up {} before delete: {}", resource_id, e),
        }

        let destroyed = self.control_plane.destroy_container(resource_id).await?;
        if let Some(reason) = destroyed.failure {
            return Err(ManagerError::StepFailed {
                step: "destroy".to_string(),
                resource_id,
                reason,
            });
        }

        let (whitelist_removed, services_removed) =
            self.database.purge_resource_records(resource_id, node).await?;

        info!("Deleted container {} on {}", resource_id, node);
        Ok(DeleteSummary {
            whitelist_removed,
            services_removed,
        })
    }

    /// One past the highest id in the cluster, never below 101
    pub async fn suggest_next_resource_id(&self) -> Result<i64, ManagerError> {
        let resources = self.control_plane.list_resources().await?;
        let max_id = resources
            .iter()
            .map(|r| r.resource_id)
            .fold(MIN_RESOURCE_ID, i64::max);
        Ok(max_id + 1)
    }

    pub async fn services_for(&self, resource_id: i64, node: &str) -> Result<Vec<ContainerService>, ManagerError> {
        Ok(self.database.services_for_resource(resource_id, node).await?)
    }
}

fn actor(triggered_by: Option<&str>) -> &str {
    triggered_by
        .filter(|actor| !actor.trim().is_empty())
        .unwrap_or(DEFAULT_MANUAL_ACTOR)
}

/// Move a pending provisioning record to its terminal state
fn settle_record(
    record: &mut AuditLogRecord,
    outcome: &Result<(), StepFailure>,
    transcript: String,
    elapsed: Duration,
) {
    record.output = Some(transcript).filter(|t| !t.is_empty());
    record.completed_at = Some(Utc::now());
    record.duration_seconds = Some(elapsed.as_secs() as i64);

    match outcome {
        Ok(()) => record.status = ActionStatus::Success,
        Err(failure) => {
            record.status = ActionStatus::Failed;
            record.error_message = Some(format!("{} failed: {}", failure.step, failure.reason));
        }
    }
}
