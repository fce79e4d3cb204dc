// File: manager/src/services/mod.rs

pub mod action_executor;
pub mod provisioning_service;
pub mod status_service;
pub mod trigger_gateway;
pub mod whitelist_service;

pub use action_executor::{ActionExecutor, ActionRequest};
pub use provisioning_service::{CloneRequest, DeleteSummary, DeployRequest, ProvisioningService};
pub use status_service::StatusService;
pub use trigger_gateway::{TriggerAccepted, TriggerGateway};
pub use whitelist_service::WhitelistService;
