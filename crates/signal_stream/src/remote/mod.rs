pub mod dashboard_client;
pub mod responses;

pub use dashboard_client::{DashboardApi, DashboardClient};
pub use responses::{AgentInfo, HealthStatus, ManualSignalAck};

#[cfg(test)]
pub use dashboard_client::MockDashboardApi;
