// File: manager/src/services/trigger_gateway.rs
//
// On-demand entry point for power actions; validates, then dispatches in the background
//
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::constants::restart::DEFAULT_MANUAL_ACTOR;
use crate::control_plane::ResourceKind;
use crate::database::{LifecycleAction, TriggerType};
use crate::errors::ManagerError;
use crate::services::action_executor::{ActionExecutor, ActionRequest};

/// Acknowledgement that a manual action was dispatched.
///
/// The outcome lands in the audit log. `task` may be dropped; awaiting it only
/// waits for the background work to finish.
#[derive(Debug, Serialize)]
pub struct TriggerAccepted {
    pub resource_id: i64,
    pub resource_name: String,
    pub node: String,
    pub kind: ResourceKind,
    pub action: LifecycleAction,
    #[serde(skip)]
    pub task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct TriggerGateway {
    executor: ActionExecutor,
}

impl TriggerGateway {
    pub fn new(executor: ActionExecutor) -> Self {
        Self { executor }
    }

    /// Validate a manual action, claim the resource and dispatch it without waiting for the result.
    ///
    /// A resource already busy with another action is refused with `ResourceBusy`.
    pub async fn trigger(
        &self,
        action: LifecycleAction,
        resource_id: i64,
        node: &str,
        triggered_by: Option<&str>,
    ) -> Result<TriggerAccepted, ManagerError> {
        if !action.is_power_action() {
            return Err(ManagerError::validation(
                "action",
                format!("'{}' cannot be triggered on an existing resource", action),
            ));
        }
        if resource_id <= 0 {
            return Err(ManagerError::validation("resource_id", "must be positive"));
        }
        if node.trim().is_empty() {
            return Err(ManagerError::validation("node", "must not be empty"));
        }

        let resource = self
            .executor
            .control_plane()
            .get_resource(node, resource_id)
            .await?
            .ok_or_else(|| ManagerError::ResourceNotFound {
                resource_id,
                node: node.to_string(),
            })?;

        let triggered_by = triggered_by
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .unwrap_or(DEFAULT_MANUAL_ACTOR)
            .to_string();

        let request = ActionRequest {
            resource_id,
            resource_name: resource.name.clone(),
            node: node.to_string(),
            kind: resource.kind,
            action,
            trigger_type: TriggerType::Manual,
            triggered_by,
        };

        // Released by the dispatched task
        self.executor.claim(&request).await?;

        info!(
            "Manual {} of {} ({}) on {} requested by {}",
            action, resource_id, resource.name, node, request.triggered_by
        );

        let task = self.dispatch(request);

        Ok(TriggerAccepted {
            resource_id,
            resource_name: resource.name,
            node: node.to_string(),
            kind: resource.kind,
            action,
            task,
        })
    }

    fn dispatch(&self, request: ActionRequest) -> JoinHandle<()> {
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let worker = {
                let executor = executor.clone();
                let request = request.clone();
                tokio::spawn(async move { executor.perform_claimed(request).await })
            };

            match worker.await {
                Ok(Ok(record)) => info!(
                    "Manual {} of {} finished as {} (audit record {})",
                    record.action, record.resource_id, record.status, record.id
                ),
                Ok(Err(e)) => error!(
                    "Manual {} of {} was not performed: {}",
                    request.action, request.resource_id, e
                ),
                Err(join_err) => {
                    error!(
                        "Manual {} of {} crashed: {}",
                        request.action, request.resource_id, join_err
                    );
                    executor
                        .recover_aborted(&request, &format!("action task crashed: {}", join_err))
                        .await;
                }
            }
        })
    }
}
