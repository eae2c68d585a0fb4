use std::sync::Arc;

use common::config::DEFAULT_RETENTION;
use common::models::{AgentLogEntry, Decision, DomainEvent, MacroEvent, Signal, TradeUpdate};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::Snapshot;

/// Per-collection caps for the append-only slices. Trades are never capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub signals: usize,
    pub decisions: usize,
    pub agent_logs: usize,
    pub macro_events: usize,
}

impl Retention {
    pub fn uniform(cap: usize) -> Self {
        Self {
            signals: cap,
            decisions: cap,
            agent_logs: cap,
            macro_events: cap,
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self::uniform(DEFAULT_RETENTION)
    }
}

/// Authoritative in-memory state behind the dashboard panels.
///
/// Every accepted mutation publishes a fresh `Arc<Snapshot>`; readers either
/// take the current one with [`StateStore::snapshot`] or follow changes through
/// [`StateStore::subscribe`]. Cloning the store yields another handle to the
/// same state.
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
    retention: Retention,
}

impl StateStore {
    pub fn new(retention: Retention) -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::empty(&retention)));
        Self {
            tx: Arc::new(tx),
            retention,
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Routes a classified event to its slice. Returns whether a new snapshot was published.
    pub fn apply(&self, event: DomainEvent) -> bool {
        match event {
            DomainEvent::Signal(signal) => self.append_signal(signal),
            DomainEvent::AgentLog(entry) => self.append_agent_log(entry),
            DomainEvent::MacroEvent(event) => self.append_macro_event(event),
            DomainEvent::Decision(decision) => self.append_decision(decision),
            DomainEvent::TradeUpdate(update) => self.upsert_trade(update),
        }
    }

    pub fn append_signal(&self, signal: Signal) -> bool {
        self.mutate(|snapshot| {
            if let Some(evicted) = Arc::make_mut(&mut snapshot.signals).push(signal) {
                trace!("Evicted signal {} {}", evicted.agent_name, evicted.symbol);
            }
            true
        })
    }

    /// Appends a batch of signals (e.g. a backfill) as a single snapshot.
    pub fn extend_signals(&self, signals: impl IntoIterator<Item = Signal>) -> bool {
        let mut signals = signals.into_iter().peekable();
        if signals.peek().is_none() {
            return false;
        }

        self.mutate(|snapshot| {
            let log = Arc::make_mut(&mut snapshot.signals);
            for signal in signals {
                log.push(signal);
            }
            true
        })
    }

    pub fn append_decision(&self, decision: Decision) -> bool {
        self.mutate(|snapshot| {
            Arc::make_mut(&mut snapshot.decisions).push(decision);
            true
        })
    }

    pub fn append_macro_event(&self, event: MacroEvent) -> bool {
        self.mutate(|snapshot| {
            Arc::make_mut(&mut snapshot.macro_events).push(event);
            true
        })
    }

    /// Appends an agent log entry unless one with the same id is still retained.
    pub fn append_agent_log(&self, entry: AgentLogEntry) -> bool {
        self.mutate(|snapshot| {
            if snapshot.agent_logs.iter().any(|e| e.id == entry.id) {
                debug!("Ignoring duplicate agent log {} from {}", entry.id, entry.agent_name);
                return false;
            }
            Arc::make_mut(&mut snapshot.agent_logs).push(entry);
            true
        })
    }

    /// Opens the trade if its id is new, otherwise merges the exit fields.
    /// Re-applying an update that changes nothing publishes nothing.
    pub fn upsert_trade(&self, update: TradeUpdate) -> bool {
        self.mutate(|snapshot| Arc::make_mut(&mut snapshot.trades).upsert(update))
    }

    fn mutate<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut Snapshot) -> bool,
    {
        self.tx.send_if_modified(|current| {
            let mut next = (**current).clone();
            if !apply(&mut next) {
                return false;
            }
            next.version += 1;
            *current = Arc::new(next);
            true
        })
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Retention::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::models::{AgentName, EventId, EventType, ForecastBias, SignalType};
    use serde_json::json;

    fn signal(agent: &str, symbol: &str, n: u32) -> Signal {
        Signal {
            agent_name: AgentName::from(agent),
            symbol: symbol.to_string(),
            signal_type: SignalType::Buy,
            confidence: Some(0.5),
            reasoning: format!("signal #{}", n),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, n).unwrap(),
        }
    }

    fn log_entry(id: u64, agent: &str) -> AgentLogEntry {
        AgentLogEntry {
            id: EventId::Numeric(id),
            agent_name: AgentName::from(agent),
            symbol: "EURUSD".to_string(),
            confidence: None,
            reasoning: Some("pattern".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            data: Some(json!({ "pattern": "bullish_engulfing" })),
        }
    }

    fn trade_update(id: u64) -> TradeUpdate {
        TradeUpdate {
            trade_id: EventId::Numeric(id),
            symbol: "EURUSD".to_string(),
            entry_time: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            entry_price: 1.095,
            exit_time: None,
            exit_price: None,
            pnl: None,
            pnl_percentage: None,
            success_flag: None,
        }
    }

    #[test]
    fn test_signals_keep_order_and_evict_oldest() {
        let store = StateStore::new(Retention::uniform(3));
        for n in 0..5 {
            store.append_signal(signal("chartanalyst", "EURUSD", n));
        }

        let snapshot = store.snapshot();
        let reasons: Vec<_> = snapshot.signals().iter().map(|s| s.reasoning.as_str()).collect();
        assert_eq!(reasons, vec!["signal #2", "signal #3", "signal #4"]);
        assert_eq!(snapshot.signals().evicted(), 2);
        assert_eq!(snapshot.version(), 5);
    }

    #[test]
    fn test_mutation_publishes_new_snapshot_reference() {
        let store = StateStore::default();
        let before = store.snapshot();

        store.append_decision(Decision {
            symbol: "EURUSD".to_string(),
            signal: SignalType::Sell,
            confidence: None,
            contributing_agents: vec![],
            reasoning: "risk off".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });
        let after = store.snapshot();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.decisions().is_empty());
        assert_eq!(after.decisions().len(), 1);
        // untouched slices are shared between the two snapshots
        assert!(Arc::ptr_eq(before.signals(), after.signals()));
        assert!(Arc::ptr_eq(before.trades(), after.trades()));
    }

    #[test]
    fn test_duplicate_agent_log_is_ignored() {
        let store = StateStore::default();
        assert!(store.append_agent_log(log_entry(1, "chartanalyst")));
        let snapshot = store.snapshot();

        assert!(!store.append_agent_log(log_entry(1, "chartanalyst")));
        assert!(Arc::ptr_eq(&snapshot, &store.snapshot()));
        assert_eq!(store.snapshot().agent_logs().len(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = StateStore::default();
        store.upsert_trade(trade_update(1));

        let mut close = trade_update(1);
        close.exit_time = Some(Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
        close.exit_price = Some(1.101);
        close.pnl = Some(60.0);
        close.pnl_percentage = Some(0.55);
        close.success_flag = Some(true);

        assert!(store.upsert_trade(close.clone()));
        let once = store.snapshot();
        assert!(!store.upsert_trade(close));
        let twice = store.snapshot();

        assert!(Arc::ptr_eq(&once, &twice));
        let trade = twice.trades().get(&EventId::Numeric(1)).unwrap();
        assert!(trade.is_closed());
        assert_eq!(trade.pnl, Some(60.0));
        assert_eq!(twice.trades().len(), 1);
    }

    #[test]
    fn test_trades_are_never_evicted() {
        let store = StateStore::new(Retention::uniform(2));
        for id in 0..10 {
            store.upsert_trade(trade_update(id));
        }
        assert_eq!(store.snapshot().trades().len(), 10);
    }

    #[test]
    fn test_apply_routes_to_slices() {
        let store = StateStore::default();
        store.apply(DomainEvent::Signal(signal("riskmanager", "GBPUSD", 1)));
        store.apply(DomainEvent::AgentLog(log_entry(3, "tacticbot")));
        store.apply(DomainEvent::MacroEvent(MacroEvent {
            event_name: "CPI release".to_string(),
            event_type: EventType::Economic,
            forecast_bias: ForecastBias::Bearish,
            impact_score: Some(8.0),
            source: "bls".to_string(),
            event_time: Utc.with_ymd_and_hms(2024, 1, 10, 13, 30, 0).unwrap(),
        }));
        store.apply(DomainEvent::TradeUpdate(trade_update(9)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.signals().len(), 1);
        assert_eq!(snapshot.agent_logs().len(), 1);
        assert_eq!(snapshot.macro_events().len(), 1);
        assert_eq!(snapshot.trades().len(), 1);
        assert!(snapshot.decisions().is_empty());
    }

    #[test]
    fn test_backfill_is_one_snapshot() {
        let store = StateStore::default();
        assert!(!store.extend_signals(Vec::new()));
        assert_eq!(store.snapshot().version(), 0);

        store.extend_signals((0..4).map(|n| signal("chartanalyst", "EURUSD", n)));
        assert_eq!(store.snapshot().version(), 1);
        assert_eq!(store.snapshot().signals().len(), 4);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = StateStore::default();
        let mut rx = store.subscribe();

        let writer = store.clone();
        tokio::spawn(async move {
            writer.append_signal(signal("chartanalyst", "EURUSD", 0));
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().signals().len(), 1);
    }
}
