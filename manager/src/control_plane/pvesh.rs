use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

use super::{ActionOutput, ControlPlane, ControlPlaneResult, Resource, ResourceKind};
use crate::config::ControlPlaneConfig;
use crate::database::LifecycleAction;
use crate::errors::ControlPlaneError;

/// Control plane backed by the node-local `pvesh` and `pct` tools
pub struct PveshControlPlane {
    pvesh_path: String,
    pct_path: String,
}

#[derive(Debug, Deserialize)]
struct ClusterResource {
    vmid: Option<Value>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    node: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    uptime: i64,
    #[serde(default)]
    cpu: f64,
    #[serde(default)]
    mem: i64,
    #[serde(default)]
    maxmem: i64,
    #[serde(default)]
    disk: i64,
    #[serde(default)]
    maxdisk: i64,
}

/// `vmid` arrives as a number on most versions and as a string on some
fn parse_vmid(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse `pvesh get /cluster/resources --type vm --output-format json`.
///
/// Entries with a missing or malformed id or an unknown type are dropped.
pub fn parse_cluster_resources(json: &str) -> ControlPlaneResult<Vec<Resource>> {
    let entries: Vec<ClusterResource> =
        serde_json::from_str(json).map_err(|e| ControlPlaneError::InvalidResponse {
            command: "pvesh get /cluster/resources".to_string(),
            reason: e.to_string(),
        })?;

    let resources = entries
        .into_iter()
        .filter_map(|entry| {
            let resource_id = entry.vmid.as_ref().and_then(parse_vmid)?;
            let kind = entry.kind.parse::<ResourceKind>().ok()?;
            Some(Resource {
                resource_id,
                name: entry.name,
                kind,
                node: entry.node,
                status: entry.status,
                uptime: entry.uptime,
                cpu_usage: entry.cpu,
                memory_used: entry.mem,
                memory_total: entry.maxmem,
                disk_used: entry.disk,
                disk_total: entry.maxdisk,
            })
        })
        .collect();

    Ok(resources)
}

fn status_verb(action: LifecycleAction) -> ControlPlaneResult<&'static str> {
    match action {
        LifecycleAction::Restart => Ok("reboot"),
        LifecycleAction::Stop => Ok("stop"),
        LifecycleAction::Start => Ok("start"),
        LifecycleAction::Deploy | LifecycleAction::Clone => {
            Err(ControlPlaneError::UnsupportedAction(action.to_string()))
        }
    }
}

impl PveshControlPlane {
    pub fn new(config: &ControlPlaneConfig) -> Self {
        Self {
            pvesh_path: config.pvesh_path.clone(),
            pct_path: config.pct_path.clone(),
        }
    }

    /// Run a command and capture stdout followed by stderr.
    ///
    /// A non-zero exit is a failed [`ActionOutput`]; only a spawn failure is an error.
    async fn run(&self, program: &str, args: &[String]) -> ControlPlaneResult<ActionOutput> {
        let command_line = format!("{} {}", program, args.join(" "));
        debug!("Running: {}", command_line);

        // Dropping the future (on timeout) must take the child down with it
        let output = AsyncCommand::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ControlPlaneError::Transport {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(ActionOutput::success(text))
        } else {
            let reason = format!(
                "'{}' failed with {}: {}",
                command_line,
                output.status,
                text.trim()
            );
            warn!("{}", reason);
            Ok(ActionOutput::failed(text, reason))
        }
    }
}

#[async_trait]
impl ControlPlane for PveshControlPlane {
    async fn list_resources(&self) -> ControlPlaneResult<Vec<Resource>> {
        let args: Vec<String> = ["get", "/cluster/resources", "--type", "vm", "--output-format", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = self.run(&self.pvesh_path, &args).await?;
        if let Some(reason) = result.failure {
            return Err(ControlPlaneError::Transport {
                command: format!("{} get /cluster/resources", self.pvesh_path),
                reason,
            });
        }

        let resources = parse_cluster_resources(&result.output)?;
        debug!("Inventory lists {} resources", resources.len());
        Ok(resources)
    }

    async fn perform_action(
        &self,
        node: &str,
        resource_id: i64,
        kind: ResourceKind,
        action: LifecycleAction,
    ) -> ControlPlaneResult<ActionOutput> {
        let verb = status_verb(action)?;
        let path = format!("/nodes/{}/{}/{}/status/{}", node, kind.as_str(), resource_id, verb);
        info!("Requesting {} of {} {} on {}", verb, kind, resource_id, node);

        self.run(&self.pvesh_path, &["create".to_string(), path]).await
    }

    async fn clone_container(
        &self,
        source_id: i64,
        new_id: i64,
        target_node: &str,
        hostname: Option<&str>,
    ) -> ControlPlaneResult<ActionOutput> {
        let mut args = vec![
            "clone".to_string(),
            source_id.to_string(),
            new_id.to_string(),
            "--target".to_string(),
            target_node.to_string(),
        ];
        if let Some(hostname) = hostname.filter(|h| !h.is_empty()) {
            args.push("--hostname".to_string());
            args.push(hostname.to_string());
        }

        info!("Cloning container {} to {} on {}", source_id, new_id, target_node);
        self.run(&self.pct_path, &args).await
    }

    async fn destroy_container(&self, resource_id: i64) -> ControlPlaneResult<ActionOutput> {
        info!("Destroying container {}", resource_id);
        let args = vec![
            "destroy".to_string(),
            resource_id.to_string(),
            "--purge".to_string(),
        ];
        self.run(&self.pct_path, &args).await
    }

    async fn exec_in_container(&self, resource_id: i64, command: &str) -> ControlPlaneResult<ActionOutput> {
        let args = vec![
            "exec".to_string(),
            resource_id.to_string(),
            "--".to_string(),
            "bash".to_string(),
            "-c".to_string(),
            command.to_string(),
        ];
        self.run(&self.pct_path, &args).await
    }
}
