use serde::{Deserialize, Serialize};

/// Name of an analysis agent. Names outside the known roster are kept verbatim
/// in `Other` so a new agent on the backend never breaks ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentName {
    ChartAnalyst,
    RiskManager,
    MarketSentinel,
    MacroForecaster,
    TacticBot,
    PlatformPilot,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Technical,
    Risk,
    Sentiment,
    Macro,
    Tactical,
    Execution,
    Unclassified,
}

impl AgentName {
    pub const KNOWN: [AgentName; 6] = [
        AgentName::ChartAnalyst,
        AgentName::RiskManager,
        AgentName::MarketSentinel,
        AgentName::MacroForecaster,
        AgentName::TacticBot,
        AgentName::PlatformPilot,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::ChartAnalyst => "chartanalyst",
            Self::RiskManager => "riskmanager",
            Self::MarketSentinel => "marketsentinel",
            Self::MacroForecaster => "macroforecaster",
            Self::TacticBot => "tacticbot",
            Self::PlatformPilot => "platformpilot",
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn role(&self) -> AgentRole {
        match self {
            Self::ChartAnalyst => AgentRole::Technical,
            Self::RiskManager => AgentRole::Risk,
            Self::MarketSentinel => AgentRole::Sentiment,
            Self::MacroForecaster => AgentRole::Macro,
            Self::TacticBot => AgentRole::Tactical,
            Self::PlatformPilot => AgentRole::Execution,
            Self::Other(_) => AgentRole::Unclassified,
        }
    }
}

impl From<String> for AgentName {
    fn from(value: String) -> Self {
        match value.as_str() {
            "chartanalyst" => Self::ChartAnalyst,
            "riskmanager" => Self::RiskManager,
            "marketsentinel" => Self::MarketSentinel,
            "macroforecaster" => Self::MacroForecaster,
            "tacticbot" => Self::TacticBot,
            "platformpilot" => Self::PlatformPilot,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for AgentName {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        match value {
            AgentName::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
