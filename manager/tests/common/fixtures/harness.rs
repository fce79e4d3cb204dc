//! Fully wired executor over an in-memory database and a mock control plane

use std::sync::Arc;
use std::time::Duration;

use pve_autorestart::control_plane::ControlPlane;
use pve_autorestart::database::{AuditLogFilter, AuditLogRecord, Database};
use pve_autorestart::scheduler::RestartScheduler;
use pve_autorestart::services::{ActionExecutor, ProvisioningService, TriggerGateway, WhitelistService};
use pve_autorestart::SimpleOperationTracker;

use super::mock_control_plane::MockControlPlane;
use super::test_database::TestDatabase;

pub struct TestHarness {
    pub db: TestDatabase,
    pub control_plane: Arc<MockControlPlane>,
    pub tracker: SimpleOperationTracker,
    pub executor: ActionExecutor,
}

impl TestHarness {
    pub async fn new(control_plane: MockControlPlane) -> Self {
        Self::with_timeout(control_plane, Duration::from_secs(5)).await
    }

    pub async fn with_timeout(control_plane: MockControlPlane, action_timeout: Duration) -> Self {
        let db = TestDatabase::new().await.expect("Failed to create test database");
        let control_plane = Arc::new(control_plane);
        let tracker = SimpleOperationTracker::new();
        let dyn_control_plane: Arc<dyn ControlPlane> = control_plane.clone();
        let executor = ActionExecutor::new(db.database(), dyn_control_plane, tracker.clone(), action_timeout);

        Self {
            db,
            control_plane,
            tracker,
            executor,
        }
    }

    pub fn database(&self) -> Arc<Database> {
        self.db.database()
    }

    pub fn scheduler(&self, schedule: &str) -> RestartScheduler {
        RestartScheduler::new(self.executor.clone(), schedule)
    }

    pub fn gateway(&self) -> TriggerGateway {
        TriggerGateway::new(self.executor.clone())
    }

    pub fn whitelist(&self) -> WhitelistService {
        WhitelistService::new(self.database())
    }

    pub fn provisioning(&self) -> ProvisioningService {
        let control_plane: Arc<dyn ControlPlane> = self.control_plane.clone();
        ProvisioningService::new(self.database(), control_plane, self.tracker.clone())
    }

    /// Every audit record, newest first
    pub async fn records(&self) -> Vec<AuditLogRecord> {
        self.database()
            .query_audit_logs(&AuditLogFilter::default())
            .await
            .expect("Failed to query audit log")
    }

    pub async fn records_for(&self, resource_id: i64) -> Vec<AuditLogRecord> {
        self.database()
            .query_audit_logs(&AuditLogFilter {
                resource_id: Some(resource_id),
                ..AuditLogFilter::default()
            })
            .await
            .expect("Failed to query audit log")
    }
}
