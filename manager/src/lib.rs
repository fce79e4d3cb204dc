pub mod config;
pub mod constants;
pub mod control_plane;
pub mod database;
pub mod errors;
pub mod operation_tracker;
pub mod scheduler;
pub mod services;

// Re-export commonly used types
pub use config::{Config, ConfigManager};
pub use control_plane::{ControlPlane, PveshControlPlane};
pub use database::Database;
pub use errors::{ControlPlaneError, DatabaseError, ManagerError};
pub use operation_tracker::SimpleOperationTracker;
pub use scheduler::RestartScheduler;
pub use services::{
    ActionExecutor, ProvisioningService, StatusService, TriggerGateway, WhitelistService,
};
