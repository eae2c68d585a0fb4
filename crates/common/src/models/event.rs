use super::{AgentLogEntry, Decision, MacroEvent, Signal, TradeUpdate};

/// A classified inbound frame, ready to be applied to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Signal(Signal),
    AgentLog(AgentLogEntry),
    MacroEvent(MacroEvent),
    Decision(Decision),
    TradeUpdate(TradeUpdate),
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Signal(_) => "signal",
            Self::AgentLog(_) => "agent_log",
            Self::MacroEvent(_) => "macro_event",
            Self::Decision(_) => "decision",
            Self::TradeUpdate(_) => "trade_update",
        }
    }

    /// Symbol the event is about; macro events are keyed by their name.
    pub fn subject(&self) -> &str {
        match self {
            Self::Signal(s) => &s.symbol,
            Self::AgentLog(l) => &l.symbol,
            Self::MacroEvent(m) => &m.event_name,
            Self::Decision(d) => &d.symbol,
            Self::TradeUpdate(t) => &t.symbol,
        }
    }
}
