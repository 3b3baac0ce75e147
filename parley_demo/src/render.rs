//! A render layer that writes each refresh to the log

use async_trait::async_trait;
use parley_core::prelude::*;
use tokio::sync::watch;

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Logs every contents and metadata render it is asked for
pub struct LogRenderer {
    delay: Duration,
    contents_renders: AtomicUsize,
    metadata_renders: AtomicUsize,
    rendered: watch::Sender<EventId>,
}

impl LogRenderer {
    /// `delay` simulates the time taken to draw each render
    pub fn new(delay: Duration) -> Self {
        let (rendered, _) = watch::channel(EventId::ZERO);
        Self {
            delay,
            contents_renders: AtomicUsize::new(0),
            metadata_renders: AtomicUsize::new(0),
            rendered,
        }
    }

    pub fn contents_renders(&self) -> usize {
        self.contents_renders.load(Ordering::Relaxed)
    }

    pub fn metadata_renders(&self) -> usize {
        self.metadata_renders.load(Ordering::Relaxed)
    }

    /// Watch the newest event shown so far
    pub fn rendered(&self) -> watch::Receiver<EventId> {
        self.rendered.subscribe()
    }
}

#[async_trait]
impl RenderTarget for LogRenderer {
    async fn render_contents(&self, window: ContentsWindow) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        tracing::info!(
            scope = %window.scope,
            newest = %window.newest,
            lines = window.events.len(),
            "Contents refresh"
        );
        for event in &window.events {
            tracing::debug!(id = %event.id, "{}", event.contents);
        }

        self.contents_renders.fetch_add(1, Ordering::Relaxed);
        self.rendered.send_replace(window.newest);
    }

    async fn render_metadata(&self, metadata: SurfaceMetadata) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(network) = &metadata.network {
            tracing::info!(
                network = %network.network,
                nick = %network.nick,
                connection = %network.connection,
                "Network status"
            );
        }
        if let Some(channel) = &metadata.channel {
            tracing::info!(
                channel = %channel.channel,
                presence = %channel.presence,
                topic = %channel.topic,
                members = channel.member_count,
                unread = channel.unread_count,
                "Channel status"
            );
        }

        self.metadata_renders.fetch_add(1, Ordering::Relaxed);
    }
}
