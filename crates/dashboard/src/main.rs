use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{debug, info};

use common::actors::{Actor, ActorType, ControlMessage};
use common::config::DashboardConfig;
use common::logger;
use signal_stream::services::{BackfillOneShotActor, IngestService, IngestStats};
use signal_stream::{DashboardApi, DashboardClient, SignalStream, StreamConfig};
use storage::StateStore;

use crate::actors::Supervisor;
use crate::services::ReporterService;

mod actors;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    debug!("System starting up...");

    let config = DashboardConfig::from_env();
    info!("Backend API: {}", config.api_base_url);
    info!("Signal stream: {}", config.ws_url);

    // Single request client for the whole process.
    let api: Arc<dyn DashboardApi> = Arc::new(DashboardClient::new(&config.api_base_url)?);
    let store = StateStore::default();
    let ingest_stats = Arc::new(IngestStats::default());

    let mut stream = SignalStream::connect(config.ws_url.clone(), StreamConfig::default());
    stream.on_event(|frame| {
        debug!(
            "Frame received: {}",
            frame.get("type").and_then(|t| t.as_str()).unwrap_or("<untyped>")
        );
    });

    let mut supervisor = Supervisor::new();

    let store_for_ingest = store.clone();
    let stats_for_ingest = ingest_stats.clone();
    let frames_for_ingest = stream.subscribe();
    supervisor.register_actor(
        ActorType::IngestActor,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(IngestService::new(
                store_for_ingest.clone(),
                frames_for_ingest.resubscribe(),
                stats_for_ingest.clone(),
            ))
        }),
    );

    let store_for_reporter = store.clone();
    let stats_for_reporter = ingest_stats.clone();
    let connection_for_reporter = stream.transitions();
    supervisor.register_actor(
        ActorType::ReporterActor,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(ReporterService::new(
                store_for_reporter.subscribe(),
                connection_for_reporter.resubscribe(),
                stats_for_reporter.clone(),
            ))
        }),
    );

    supervisor
        .sender()
        .send(ControlMessage::Spawn(Box::new(BackfillOneShotActor::new(
            api.clone(),
            store.clone(),
        ))))
        .await?;

    supervisor.start().await;

    stream.close();
    info!("Stream stats: {:?}", stream.stats());
    info!("Ingest stats: {:?}", ingest_stats.counts());
    Ok(())
}
