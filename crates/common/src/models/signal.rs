use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AgentName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub agent_name: AgentName,
    pub symbol: String,
    pub signal_type: SignalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub reasoning: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
}
