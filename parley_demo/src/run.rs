//! Wires a store, a generator and a display surface together

use crate::{config::DemoConfig, generator::Generator, render::LogRenderer};
use parley_core::{prelude::*, utils::OrLog};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use std::{sync::Arc, time::Duration};

/// How long to wait, once the generator stops, for the surface to show the
/// final event
const SETTLE_TIME: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub messages: usize,
    pub reconnects: usize,
    pub store: StoreStats,
    pub contents_renders: usize,
    pub metadata_renders: usize,
    /// Newest event on the surface when the run ended
    pub rendered: EventId,
}

/// Run the demo until the generator finishes or `cancel` fires
pub async fn run(config: DemoConfig, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
    let store = Arc::new(StateStore::new());
    let renderer = Arc::new(LogRenderer::new(Duration::from_millis(
        config.render_delay_ms,
    )));

    let coordinator = UpdateCoordinator::start(
        config.surface.clone(),
        Arc::clone(&store),
        renderer.clone(),
        &config.coordinator,
        cancel.clone(),
    );
    store.subscribe(coordinator.receiver(), None);

    let mut generator = Generator::new(Arc::clone(&store), &config);
    generator.load_history();
    let produced = generator.run(cancel.clone()).await;

    let newest = store.last_event_id(&config.surface);
    let mut rendered = renderer.rendered();
    match tokio::time::timeout(SETTLE_TIME, rendered.wait_for(|id| *id >= newest)).await {
        Ok(result) => {
            result.map(|_| ()).or_log("waiting for final render");
        }
        Err(_) => tracing::warn!(%newest, "Surface did not catch up before shutdown"),
    }

    coordinator.shutdown().await;
    store.unsubscribe();

    let rendered = *renderer.rendered().borrow();
    Ok(RunSummary {
        messages: produced.messages,
        reconnects: produced.reconnects,
        store: store.stats(),
        contents_renders: renderer.contents_renders(),
        metadata_renders: renderer.metadata_renders(),
        rendered,
    })
}
