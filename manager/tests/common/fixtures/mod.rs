//! This module provides reusable test utilities:
//! - Mock control plane (scripted inventory and action responses)
//! - Test configuration builders
//! - In-memory test databases
//! - A wired-up executor harness
//! - Common test data

// Allow unused code in test fixtures - each test binary uses a different subset
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod harness;
pub mod mock_control_plane;
pub mod test_config;
pub mod test_data;
pub mod test_database;

// Re-export commonly used items
pub use harness::TestHarness;
pub use mock_control_plane::{MockControlPlane, MockResponse};
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
