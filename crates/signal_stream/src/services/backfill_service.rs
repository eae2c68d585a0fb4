use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::BACKFILL_LIMIT;
use storage::StateStore;

use crate::error::RequestError;
use crate::remote::DashboardApi;

/// Seeds the live feed with the backend's recent signals once at startup.
///
/// The health check and the agent roster are informational; only a failing
/// signal fetch fails the backfill. Nothing is retried.
pub struct BackfillOneShotActor {
    id: Uuid,
    api: Arc<dyn DashboardApi>,
    store: StateStore,
    limit: usize,
}

#[async_trait]
impl Actor for BackfillOneShotActor {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::Dynamic
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        match self.backfill().await {
            Ok(count) => info!("Backfill finished, {} signals loaded", count),
            Err(e) => {
                error!("Backfill failed: {}", e);
                let _ = supervisor_tx
                    .send(ControlMessage::Error(self.id, format!("Backfill failed: {}", e)))
                    .await;
            }
        }

        heartbeat_handle.abort();
        if supervisor_tx
            .send(ControlMessage::Shutdown(self.id))
            .await
            .is_err()
        {
            warn!("Supervisor is gone, backfill result not reported");
        }
        Ok(())
    }
}

impl BackfillOneShotActor {
    pub fn new(api: Arc<dyn DashboardApi>, store: StateStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            api,
            store,
            limit: BACKFILL_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns how many signals were appended to the store.
    pub async fn backfill(&self) -> Result<usize, RequestError> {
        match self.api.check_health().await {
            Ok(health) if health.is_healthy() => info!("Backend is healthy"),
            Ok(health) => warn!("Backend reports status: {}", health.status),
            Err(e) => warn!("Health check failed: {}", e),
        }

        match self.api.get_agents().await {
            Ok(agents) => {
                for agent in &agents {
                    info!(
                        "Agent {} ({:?}) is {}",
                        agent.name,
                        agent.name.role(),
                        agent.status
                    );
                }
            }
            Err(e) => warn!("Could not load agent roster: {}", e),
        }

        let signals = self.api.get_recent_signals(self.limit).await?;
        let count = signals.len();
        self.store.extend_signals(signals);
        Ok(count)
    }
}
