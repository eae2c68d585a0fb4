use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentName, SignalType};

/// Aggregated outcome of several agents for one symbol. Decisions form a log;
/// a newer decision never rewrites an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub signal: SignalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub contributing_agents: Vec<AgentName>,
    pub reasoning: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}
