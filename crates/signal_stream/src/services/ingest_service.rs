use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use storage::StateStore;

use crate::error::RouteError;
use crate::router;

/// Outcome counters shared by every incarnation of the ingest actor.
#[derive(Debug, Default)]
pub struct IngestStats {
    applied: AtomicU64,
    ignored: AtomicU64,
    unrecognized: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounts {
    /// Frames that produced a new snapshot.
    pub applied: u64,
    /// Valid frames that changed nothing (duplicate log ids, repeated trade updates).
    pub ignored: u64,
    pub unrecognized: u64,
    pub rejected: u64,
}

impl IngestStats {
    pub fn counts(&self) -> IngestCounts {
        IngestCounts {
            applied: self.applied.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Moves parsed frames from the stream into the [`StateStore`].
pub struct IngestService {
    id: Uuid,
    store: StateStore,
    frames_rx: broadcast::Receiver<Arc<Value>>,
    stats: Arc<IngestStats>,
}

#[async_trait]
impl Actor for IngestService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::IngestActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting Ingest Service");

        loop {
            match self.frames_rx.recv().await {
                Ok(frame) => self.handle_frame(&frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Ingest service lagged: missed {} frames", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    heartbeat_handle.abort();
                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.id,
                            format!("{:?}: frame channel closed unexpectedly.", self.name()),
                        ))
                        .await?;
                    bail!("Frame channel closed unexpectedly.");
                }
            }
        }
    }
}

impl IngestService {
    pub fn new(
        store: StateStore,
        frames_rx: broadcast::Receiver<Arc<Value>>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            frames_rx,
            stats,
        }
    }

    pub fn handle_frame(&self, frame: &Value) {
        match router::route(frame) {
            Ok(event) => {
                let kind = event.kind();
                let subject = event.subject().to_string();
                if self.store.apply(event) {
                    self.stats.applied.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                    debug!("{} for {} left the store unchanged", kind, subject);
                }
            }
            Err(RouteError::Unrecognized(kind)) => {
                self.stats.unrecognized.fetch_add(1, Ordering::Relaxed);
                warn!("Unrecognized event type: {}", kind);
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping frame: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn service() -> (IngestService, broadcast::Sender<Arc<Value>>) {
        let (tx, rx) = broadcast::channel(16);
        let service = IngestService::new(StateStore::default(), rx, Arc::new(IngestStats::default()));
        (service, tx)
    }

    fn agent_log(id: u64) -> Value {
        json!({
            "type": "agent_log",
            "data": {
                "id": id,
                "agent_name": "chartanalyst",
                "symbol": "EURUSD",
                "confidence": 0.9,
                "reasoning": "Bullish engulfing",
                "timestamp": "2024-01-01T00:00:00Z",
                "data": { "pattern": "bullish_engulfing" }
            }
        })
    }

    #[test]
    fn test_frames_are_counted_by_outcome() {
        let (service, _tx) = service();

        service.handle_frame(&agent_log(1));
        service.handle_frame(&agent_log(1));
        service.handle_frame(&json!({ "type": "heartbeat", "data": {} }));
        service.handle_frame(&json!({ "type": "decision" }));
        service.handle_frame(&json!("just a string"));

        assert_eq!(
            service.stats.counts(),
            IngestCounts {
                applied: 1,
                ignored: 1,
                unrecognized: 1,
                rejected: 2,
            }
        );
        let snapshot = service.store.snapshot();
        assert_eq!(snapshot.agent_logs().len(), 1);
        assert_eq!(snapshot.version(), 1);
    }

    #[tokio::test]
    async fn test_run_applies_broadcast_frames() {
        let (mut service, tx) = service();
        let store = service.store.clone();
        let mut snapshots = store.subscribe();
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move { service.run(supervisor_tx).await });

        tx.send(Arc::new(agent_log(7))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), snapshots.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.snapshot().agent_logs().len(), 1);

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_err());

        let mut saw_error = false;
        while let Ok(msg) = supervisor_rx.try_recv() {
            saw_error |= matches!(msg, ControlMessage::Error(..));
        }
        assert!(saw_error);
    }
}
