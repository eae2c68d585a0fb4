use std::fmt;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time;
use tracing::{info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::REPORT_INTERVAL;
use common::models::{AgentName, ConnectionState};
use signal_stream::services::IngestStats;
use storage::Snapshot;

/// Console view of the dashboard panels at one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSummary {
    pub version: u64,
    pub signals: usize,
    pub decisions: usize,
    pub macro_events: usize,
    pub agent_logs: Vec<(AgentName, usize)>,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub latest_signal: Option<String>,
}

impl PanelSummary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let book = snapshot.trade_book();

        Self {
            version: snapshot.version(),
            signals: snapshot.signals().len(),
            decisions: book.decisions.len(),
            macro_events: snapshot.macro_events().len(),
            agent_logs: AgentName::KNOWN
                .into_iter()
                .map(|agent| {
                    let count = snapshot.agent_logs_for(agent.as_str()).len();
                    (agent, count)
                })
                .collect(),
            open_trades: book.open_trades.len(),
            closed_trades: book.closed_trades.len(),
            latest_signal: snapshot.signals().latest().map(|s| {
                format!("{} {:?} {} ({})", s.agent_name, s.signal_type, s.symbol, s.reasoning)
            }),
        }
    }
}

impl fmt::Display for PanelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} | signals: {} | decisions: {} | macro: {} | trades: {} open, {} closed | logs:",
            self.version,
            self.signals,
            self.decisions,
            self.macro_events,
            self.open_trades,
            self.closed_trades
        )?;
        for (agent, count) in &self.agent_logs {
            write!(f, " {}={}", agent, count)?;
        }
        if let Some(latest) = &self.latest_signal {
            write!(f, " | latest: {}", latest)?;
        }
        Ok(())
    }
}

/// Logs connection transitions as they happen and a panel summary whenever the
/// store has changed since the last report.
pub struct ReporterService {
    id: Uuid,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    connection: broadcast::Receiver<ConnectionState>,
    ingest_stats: Arc<IngestStats>,
    last_reported: Option<Arc<Snapshot>>,
}

#[async_trait]
impl Actor for ReporterService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::ReporterActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        let mut report_interval = time::interval(REPORT_INTERVAL);

        info!("Starting Reporter Service");

        loop {
            tokio::select! {
                transition = self.connection.recv() => match transition {
                    Ok(state) => info!("Stream connection: {}", state),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Reporter missed {} connection transitions", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        heartbeat_handle.abort();
                        supervisor_tx
                            .send(ControlMessage::Error(
                                self.id,
                                format!("{:?}: connection state channel closed.", self.name()),
                            ))
                            .await?;
                        bail!("Connection state channel closed.");
                    }
                },

                _ = report_interval.tick() => {
                    if let Some(summary) = self.next_report() {
                        info!("{} | ingest: {:?}", summary, self.ingest_stats.counts());
                    }
                }
            }
        }
    }
}

impl ReporterService {
    pub fn new(
        snapshots: watch::Receiver<Arc<Snapshot>>,
        connection: broadcast::Receiver<ConnectionState>,
        ingest_stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            snapshots,
            connection,
            ingest_stats,
            last_reported: None,
        }
    }

    /// A summary of the current snapshot, or `None` if it was already reported.
    fn next_report(&mut self) -> Option<PanelSummary> {
        let current = self.snapshots.borrow_and_update().clone();
        if let Some(last) = &self.last_reported {
            if Arc::ptr_eq(last, &current) {
                return None;
            }
        }

        let summary = PanelSummary::from_snapshot(&current);
        self.last_reported = Some(current);
        Some(summary)
    }
}
