use std::sync::Arc;

use common::models::{AgentLogEntry, Decision, MacroEvent, Signal};

use crate::{BoundedLog, Retention, TradeBook};

/// Immutable view of the store at one point in time.
///
/// Each slice sits behind its own `Arc`. A mutation only replaces the slice it
/// touches, so a panel can compare its slice with `Arc::ptr_eq` against the
/// previous snapshot and skip work when nothing it shows has changed.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) version: u64,
    pub(crate) signals: Arc<BoundedLog<Signal>>,
    pub(crate) decisions: Arc<BoundedLog<Decision>>,
    pub(crate) agent_logs: Arc<BoundedLog<AgentLogEntry>>,
    pub(crate) macro_events: Arc<BoundedLog<MacroEvent>>,
    pub(crate) trades: Arc<TradeBook>,
}

impl Snapshot {
    pub fn empty(retention: &Retention) -> Self {
        Self {
            version: 0,
            signals: Arc::new(BoundedLog::with_capacity(retention.signals)),
            decisions: Arc::new(BoundedLog::with_capacity(retention.decisions)),
            agent_logs: Arc::new(BoundedLog::with_capacity(retention.agent_logs)),
            macro_events: Arc::new(BoundedLog::with_capacity(retention.macro_events)),
            trades: Arc::new(TradeBook::default()),
        }
    }

    /// Number of mutations applied since the store was created.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn signals(&self) -> &Arc<BoundedLog<Signal>> {
        &self.signals
    }

    pub fn decisions(&self) -> &Arc<BoundedLog<Decision>> {
        &self.decisions
    }

    pub fn agent_logs(&self) -> &Arc<BoundedLog<AgentLogEntry>> {
        &self.agent_logs
    }

    pub fn macro_events(&self) -> &Arc<BoundedLog<MacroEvent>> {
        &self.macro_events
    }

    pub fn trades(&self) -> &Arc<TradeBook> {
        &self.trades
    }
}
