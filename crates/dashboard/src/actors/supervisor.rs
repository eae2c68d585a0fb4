use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    kinds: HashMap<Uuid, ActorType>,
    pulses: HashMap<Uuid, Instant>,
    handles: HashMap<Uuid, JoinHandle<()>>,
    supervisor_tx: mpsc::Sender<ControlMessage>,
    supervisor_rx: mpsc::Receiver<ControlMessage>,
    check_interval: Duration,
    heartbeat_timeout: Duration,
}

impl Supervisor {
    pub fn new() -> Self {
        let (supervisor_tx, supervisor_rx) = mpsc::channel::<ControlMessage>(512);
        Self {
            actor_factories: HashMap::new(),
            kinds: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            supervisor_tx,
            supervisor_rx,
            check_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_timeouts(mut self, check_interval: Duration, heartbeat_timeout: Duration) -> Self {
        self.check_interval = check_interval;
        self.heartbeat_timeout = heartbeat_timeout;
        self
    }

    /// Channel used to hand one-shot actors to the supervisor via `ControlMessage::Spawn`.
    pub fn sender(&self) -> mpsc::Sender<ControlMessage> {
        self.supervisor_tx.clone()
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    pub fn running(&self) -> usize {
        self.handles.len()
    }

    /// Runs until Ctrl-C.
    pub async fn start(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received, stopping actors");
        })
        .await;
    }

    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        let mut check_interval = time::interval(self.check_interval);

        let registered: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor_type in registered {
            self.spawn_registered(actor_type);
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,

                Some(msg) = self.supervisor_rx.recv() => self.handle_message(msg),

                _ = check_interval.tick() => self.restart_unresponsive(),
            }
        }

        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        self.pulses.clear();
        self.kinds.clear();
    }

    fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Spawn(actor) => {
                info!("Spawning {:?} actor {}", actor.name(), actor.id());
                self.spawn_actor(actor);
            }
            ControlMessage::Heartbeat(id) => {
                // late beats from an actor that already left are ignored
                if let Some(pulse) = self.pulses.get_mut(&id) {
                    *pulse = Instant::now();
                }
            }
            ControlMessage::Shutdown(id) => {
                warn!("{:?} {} is shutting down gracefully.", self.kinds.get(&id), id);
                self.forget(&id);
            }
            ControlMessage::Error(id, error_msg) => {
                error!("Actor {:?} {} reported error: {}", self.kinds.get(&id), id, error_msg);
                if let Some(pulse) = self.pulses.get_mut(&id) {
                    *pulse = Instant::now();
                }
            }
        }
    }

    fn restart_unresponsive(&mut self) {
        let Some(dead_timeout) = Instant::now().checked_sub(self.heartbeat_timeout) else {
            return;
        };

        let dead_actors: Vec<Uuid> = self
            .pulses
            .iter()
            .filter(|(_, pulse)| **pulse < dead_timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in dead_actors {
            let actor_type = self.kinds.get(&id).copied();
            warn!("{:?} {} is unresponsive!", actor_type, id);
            self.forget(&id);

            match actor_type {
                Some(actor_type) if self.actor_factories.contains_key(&actor_type) => {
                    self.spawn_registered(actor_type);
                }
                _ => warn!("No factory for {:?}, actor {} is not restarted", actor_type, id),
            }
        }
    }

    fn forget(&mut self, id: &Uuid) {
        self.pulses.remove(id);
        self.kinds.remove(id);
        if let Some(handle) = self.handles.remove(id) {
            handle.abort();
        }
    }

    fn spawn_registered(&mut self, actor_type: ActorType) {
        if let Some(factory) = self.actor_factories.get(&actor_type) {
            let actor = factory();
            self.spawn_actor(actor);
        }
    }

    fn spawn_actor(&mut self, mut actor: Box<dyn Actor>) {
        let id = actor.id();
        let actor_type = actor.name();
        let tx = self.supervisor_tx.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = actor.run(tx).await {
                error!("Actor {:?} {} crashed: {}", actor_type, id, e);
            }
        });

        self.kinds.insert(id, actor_type);
        self.handles.insert(id, handle);
        self.pulses.insert(id, Instant::now());
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Heartbeats for a while, then hangs without beating.
    struct StallingActor {
        id: Uuid,
    }

    #[async_trait]
    impl Actor for StallingActor {
        fn name(&self) -> ActorType {
            ActorType::IngestActor
        }

        fn id(&self) -> Uuid {
            self.id
        }

        async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            supervisor_tx.send(ControlMessage::Heartbeat(self.id)).await?;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct OneShot {
        id: Uuid,
        done: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for OneShot {
        fn name(&self) -> ActorType {
            ActorType::Dynamic
        }

        fn id(&self) -> Uuid {
            self.id
        }

        async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            self.done.fetch_add(1, Ordering::SeqCst);
            supervisor_tx.send(ControlMessage::Shutdown(self.id)).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unresponsive_actor_is_restarted() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let counter = spawned.clone();

        let mut supervisor = Supervisor::new()
            .with_timeouts(Duration::from_millis(20), Duration::from_millis(100));
        supervisor.register_actor(
            ActorType::IngestActor,
            Box::new(move || -> Box<dyn Actor> {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(StallingActor { id: Uuid::new_v4() })
            }),
        );

        supervisor.run_until(time::sleep(Duration::from_millis(500))).await;

        assert!(spawned.load(Ordering::SeqCst) >= 2);
        assert_eq!(supervisor.running(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_actor_is_forgotten_after_shutdown() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new()
            .with_timeouts(Duration::from_millis(20), Duration::from_millis(100));

        supervisor
            .sender()
            .send(ControlMessage::Spawn(Box::new(OneShot {
                id: Uuid::new_v4(),
                done: done.clone(),
            })))
            .await
            .unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let probe = done.clone();
        tokio::spawn(async move {
            while probe.load(Ordering::SeqCst) == 0 {
                time::sleep(Duration::from_millis(5)).await;
            }
            time::sleep(Duration::from_millis(300)).await;
            let _ = stop_tx.send(());
        });

        supervisor
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;

        // ran once and was never restarted
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
