//! Read-side projections over a [`Snapshot`]. Nothing here is stored; every view
//! is recomputed from the snapshot it is called on.

use common::models::{AgentLogEntry, AgentName, Decision, Signal, Trade};

use crate::Snapshot;

/// Agent filter value that disables filtering.
pub const ALL_AGENTS: &str = "all";

pub trait AgentScoped {
    fn agent_name(&self) -> &AgentName;
}

pub trait SymbolScoped {
    fn symbol(&self) -> &str;
}

impl AgentScoped for Signal {
    fn agent_name(&self) -> &AgentName {
        &self.agent_name
    }
}

impl AgentScoped for AgentLogEntry {
    fn agent_name(&self) -> &AgentName {
        &self.agent_name
    }
}

impl SymbolScoped for Signal {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl SymbolScoped for AgentLogEntry {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl SymbolScoped for Decision {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl SymbolScoped for Trade {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Exact match on the agent name; [`ALL_AGENTS`] returns everything.
pub fn filter_by_agent<'a, T, I>(items: I, agent: &str) -> Vec<&'a T>
where
    T: AgentScoped + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if agent == ALL_AGENTS {
        return items.into_iter().collect();
    }
    items
        .into_iter()
        .filter(|item| item.agent_name().as_str() == agent)
        .collect()
}

pub fn filter_by_symbol<'a, T, I>(items: I, symbol: &str) -> Vec<&'a T>
where
    T: SymbolScoped + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .filter(|item| item.symbol() == symbol)
        .collect()
}

/// The two tabs of the trade book: the decision ledger and the trades, split by lifecycle.
#[derive(Debug)]
pub struct TradeBookView<'a> {
    pub decisions: Vec<&'a Decision>,
    pub open_trades: Vec<&'a Trade>,
    pub closed_trades: Vec<&'a Trade>,
}

impl Snapshot {
    /// Signals oldest to newest.
    pub fn live_feed(&self) -> Vec<&Signal> {
        self.signals.iter().collect()
    }

    pub fn signals_for_agent(&self, agent: &str) -> Vec<&Signal> {
        filter_by_agent(self.signals.iter(), agent)
    }

    pub fn signals_for_symbol(&self, symbol: &str) -> Vec<&Signal> {
        filter_by_symbol(self.signals.iter(), symbol)
    }

    pub fn agent_logs_for(&self, agent: &str) -> Vec<&AgentLogEntry> {
        filter_by_agent(self.agent_logs.iter(), agent)
    }

    pub fn agent_logs_for_symbol(&self, symbol: &str) -> Vec<&AgentLogEntry> {
        filter_by_symbol(self.agent_logs.iter(), symbol)
    }

    pub fn decisions_for_symbol(&self, symbol: &str) -> Vec<&Decision> {
        filter_by_symbol(self.decisions.iter(), symbol)
    }

    pub fn trades_for_symbol(&self, symbol: &str) -> Vec<&Trade> {
        filter_by_symbol(self.trades.iter(), symbol)
    }

    pub fn trade_book(&self) -> TradeBookView<'_> {
        TradeBookView {
            decisions: self.decisions.iter().collect(),
            open_trades: self.trades.open().collect(),
            closed_trades: self.trades.closed().collect(),
        }
    }
}
