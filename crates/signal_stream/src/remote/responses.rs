use common::models::AgentName;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Server clock as sent, often without an offset.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// One row of the `/agents` roster.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentInfo {
    pub name: AgentName,
    pub status: String,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManualSignalAck {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
