//! Scripted control plane for testing
//!
//! Holds a fake inventory and per-resource action responses, and records every
//! call so tests can assert on what was (or was not) sent to the cluster.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use pve_autorestart::control_plane::{
    ActionOutput, ControlPlane, ControlPlaneResult, Resource, ResourceKind,
};
use pve_autorestart::database::LifecycleAction;
use pve_autorestart::errors::ControlPlaneError;

/// How the mock answers one call
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Command succeeded with this output
    Ok(String),
    /// Command ran and reported failure
    Fail { output: String, reason: String },
    /// Command could not be run at all
    Transport(String),
    /// Answer with `Ok("OK")` after a delay
    Delay(Duration),
    /// Never answer in any reasonable time
    Hang,
    Panic,
}

impl MockResponse {
    pub fn fail(output: &str, reason: &str) -> Self {
        MockResponse::Fail {
            output: output.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Default)]
struct MockState {
    resources: Vec<Resource>,
    inventory_failure: Option<String>,
    action_responses: HashMap<(i64, LifecycleAction), MockResponse>,
    clone_response: Option<MockResponse>,
    destroy_response: Option<MockResponse>,
    /// (command substring, response)
    exec_responses: Vec<(String, MockResponse)>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockControlPlane {
    state: Mutex<MockState>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        self.add_resource(resource);
        self
    }

    pub fn add_resource(&self, resource: Resource) {
        self.state.lock().unwrap().resources.push(resource);
    }

    pub fn remove_resource(&self, resource_id: i64) {
        self.state
            .lock()
            .unwrap()
            .resources
            .retain(|r| r.resource_id != resource_id);
    }

    pub fn fail_inventory(&self, reason: &str) {
        self.state.lock().unwrap().inventory_failure = Some(reason.to_string());
    }

    pub fn set_action_response(&self, resource_id: i64, action: LifecycleAction, response: MockResponse) {
        self.state
            .lock()
            .unwrap()
            .action_responses
            .insert((resource_id, action), response);
    }

    pub fn set_clone_response(&self, response: MockResponse) {
        self.state.lock().unwrap().clone_response = Some(response);
    }

    pub fn set_destroy_response(&self, response: MockResponse) {
        self.state.lock().unwrap().destroy_response = Some(response);
    }

    /// Respond to any exec whose command contains `needle`
    pub fn set_exec_response(&self, needle: &str, response: MockResponse) {
        self.state
            .lock()
            .unwrap()
            .exec_responses
            .push((needle.to_string(), response));
    }

    /// Every call made so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Power actions only
    pub fn action_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("restart ") || c.starts_with("stop ") || c.starts_with("start "))
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    async fn respond(response: Option<MockResponse>, command: &str) -> ControlPlaneResult<ActionOutput> {
        match response.unwrap_or_else(|| MockResponse::Ok("OK".to_string())) {
            MockResponse::Ok(output) => Ok(ActionOutput::success(output)),
            MockResponse::Fail { output, reason } => Ok(ActionOutput::failed(output, reason)),
            MockResponse::Transport(reason) => Err(ControlPlaneError::Transport {
                command: command.to_string(),
                reason,
            }),
            MockResponse::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ActionOutput::success("OK"))
            }
            MockResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ActionOutput::success("OK"))
            }
            MockResponse::Panic => panic!("mock control plane panicked on '{}'", command),
        }
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn list_resources(&self) -> ControlPlaneResult<Vec<Resource>> {
        self.record("list".to_string());
        let state = self.state.lock().unwrap();
        if let Some(reason) = &state.inventory_failure {
            return Err(ControlPlaneError::Transport {
                command: "list".to_string(),
                reason: reason.clone(),
            });
        }
        Ok(state.resources.clone())
    }

    async fn perform_action(
        &self,
        node: &str,
        resource_id: i64,
        _kind: ResourceKind,
        action: LifecycleAction,
    ) -> ControlPlaneResult<ActionOutput> {
        let command = format!("{} {}@{}", action, resource_id, node);
        self.record(command.clone());
        let response = self
            .state
            .lock()
            .unwrap()
            .action_responses
            .get(&(resource_id, action))
            .cloned();
        Self::respond(response, &command).await
    }

    async fn clone_container(
        &self,
        source_id: i64,
        new_id: i64,
        target_node: &str,
        hostname: Option<&str>,
    ) -> ControlPlaneResult<ActionOutput> {
        let command = format!(
            "clone {}->{}@{} {}",
            source_id,
            new_id,
            target_node,
            hostname.unwrap_or("-")
        );
        self.record(command.clone());
        let response = self.state.lock().unwrap().clone_response.clone();
        Self::respond(response, &command).await
    }

    async fn destroy_container(&self, resource_id: i64) -> ControlPlaneResult<ActionOutput> {
        let command = format!("destroy {}", resource_id);
        self.record(command.clone());
        let response = self.state.lock().unwrap().destroy_response.clone();
        Self::respond(response, &command).await
    }

    async fn exec_in_container(&self, resource_id: i64, command: &str) -> ControlPlaneResult<ActionOutput> {
        let call = format!("exec {}: {}", resource_id, command);
        self.record(call.clone());
        let response = self
            .state
            .lock()
            .unwrap()
            .exec_responses
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, response)| response.clone());
        Self::respond(response, &call).await
    }
}
