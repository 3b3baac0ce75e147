//! Consumer-side coordination of display refreshes.
//!
//! An [`UpdateCoordinator`] runs per display surface. It merges two inputs:
//! metadata (network and channel state from the [`StateStore`] subscription)
//! and "new event" notifications (from the store's event feed). Each drives
//! its own render path, and each path has at most one render in flight. Bursts
//! of producer updates collapse into a single refresh showing the newest state,
//! and neither path ever goes back to something older than it has shown.

use crate::broadcast::Listener;
use crate::prelude::*;
use crate::slot::{LatestSlot, Revision};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

fn default_initial_size() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Backlog window size used until the first resize
    #[serde(default = "default_initial_size")]
    pub initial_size: usize,
    /// Treat each contents render as the user reading the backlog, resetting
    /// the channel's unread count
    #[serde(default)]
    pub mark_read: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            mark_read: false,
        }
    }
}

/// A backlog window to be drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentsWindow {
    pub scope: Scope,
    /// Requested window size
    pub size: usize,
    /// Newest event known when the window was fetched
    pub newest: EventId,
    /// Up to `size` events ending at `newest`, oldest first
    pub events: Vec<Event>,
}

/// Network and channel state shown alongside a surface's contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceMetadata {
    pub network: Option<NetworkState>,
    pub channel: Option<ChannelState>,
}

/// The render layer for one surface. Each call completes when the render has
/// been done.
#[async_trait]
pub trait RenderTarget: Send + Sync + 'static {
    async fn render_contents(&self, window: ContentsWindow);

    async fn render_metadata(&self, metadata: SurfaceMetadata);
}

/// State shared between a coordinator's tasks and its receiver
struct Surface {
    scope: Scope,
    size: AtomicUsize,
    /// Newest event known to exist in the scope; only ever moves forward
    newest: Mutex<Option<EventId>>,
    refresh: AtomicBool,
    contents_wake: Notify,
    /// Merged metadata and the local revision it was last changed at
    metadata: Mutex<(Revision, SurfaceMetadata)>,
    pending_metadata: LatestSlot<SurfaceMetadata>,
}

impl Surface {
    fn new(scope: Scope, size: usize) -> Self {
        Self {
            scope,
            size: AtomicUsize::new(size),
            newest: Mutex::new(None),
            refresh: AtomicBool::new(false),
            contents_wake: Notify::new(),
            metadata: Mutex::new((0, SurfaceMetadata::default())),
            pending_metadata: LatestSlot::new(),
        }
    }

    /// Record that `id` exists in the scope. An ID newer than any seen so far
    /// advances the surface; an older one is history that arrived late and
    /// forces a refresh of the current window.
    fn note_event(&self, id: EventId) {
        if id.is_zero() {
            return;
        }
        let mut newest = self.newest.lock();
        match *newest {
            Some(current) if id < current => {
                drop(newest);
                self.request_refresh();
            }
            Some(current) if id == current => (),
            _ => {
                *newest = Some(id);
                drop(newest);
                self.contents_wake.notify_one();
            }
        }
    }

    fn request_refresh(&self) {
        self.refresh.store(true, Ordering::Release);
        self.contents_wake.notify_one();
    }

    fn merge_metadata(&self, merge: impl FnOnce(&mut SurfaceMetadata)) {
        let mut guard = self.metadata.lock();
        let (revision, metadata) = &mut *guard;
        merge(metadata);
        *revision += 1;
        self.pending_metadata.offer(*revision, metadata.clone());
    }
}

/// Feeds store updates for one surface into its coordinator
struct SurfaceReceiver(Arc<Surface>);

impl StateReceiver for SurfaceReceiver {
    fn update_network(&self, state: NetworkState) {
        if state.network == self.0.scope.network {
            self.0.merge_metadata(|m| m.network = Some(state));
        }
    }

    fn update_channel(&self, state: ChannelState) {
        if state.scope() == self.0.scope {
            self.0.merge_metadata(|m| m.channel = Some(state));
        }
    }

    fn filter(&self) -> Option<Filter> {
        Some(Filter::ByNetwork(self.0.scope.network.clone()))
    }
}

/// Drives refreshes of one display surface
pub struct UpdateCoordinator {
    surface: Arc<Surface>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl UpdateCoordinator {
    /// Start coordinating the surface showing `scope`. Stops when `cancel`
    /// fires, on [`shutdown`](Self::shutdown), or when dropped.
    ///
    /// The coordinator follows new events by itself; to follow metadata, pass
    /// [`receiver`](Self::receiver) to [`StateStore::subscribe`].
    pub fn start(
        scope: Scope,
        store: Arc<StateStore>,
        target: Arc<dyn RenderTarget>,
        config: &CoordinatorConfig,
        cancel: CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let surface = Arc::new(Surface::new(scope, config.initial_size));

        // Attach to the feed before looking at the log, so nothing appended
        // in between goes unnoticed
        let feed = store.listen_events(cancel.clone());
        surface.note_event(store.last_event_id(&surface.scope));
        surface.request_refresh();

        tracing::debug!(scope = %surface.scope, size = config.initial_size, "Starting update coordinator");

        let tasks = vec![
            tokio::spawn(watch_events(Arc::clone(&surface), feed)),
            tokio::spawn(run_contents(
                Arc::clone(&surface),
                store,
                Arc::clone(&target),
                config.mark_read,
                cancel.clone(),
            )),
            tokio::spawn(run_metadata(Arc::clone(&surface), target, cancel.clone())),
        ];

        Self {
            surface,
            cancel,
            tasks,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.surface.scope
    }

    /// A receiver to subscribe to the store with, for this surface's metadata
    pub fn receiver(&self) -> Arc<dyn StateReceiver> {
        Arc::new(SurfaceReceiver(Arc::clone(&self.surface)))
    }

    /// Change the backlog window size and refresh the contents
    pub fn resize(&self, size: usize) {
        tracing::trace!(scope = %self.surface.scope, size, "Resize");
        self.surface.size.store(size, Ordering::Release);
        self.surface.request_refresh();
    }

    /// Tell the coordinator that `id` exists in its scope, for producers that
    /// bypass the store's event feed
    pub fn notify_new_event(&self, id: EventId) {
        self.surface.note_event(id);
    }

    /// Stop all tasks and wait for them to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(error) = task.await {
                tracing::error!(?error, "Coordinator task failed");
            }
        }
    }
}

impl Drop for UpdateCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[instrument(skip_all, fields(scope = %surface.scope))]
async fn watch_events(surface: Arc<Surface>, mut feed: Listener<(Scope, Event)>) {
    while let Some((scope, event)) = feed.recv().await {
        if scope == surface.scope {
            surface.note_event(event.id);
        }
    }
}

#[instrument(skip_all, fields(scope = %surface.scope))]
async fn run_contents(
    surface: Arc<Surface>,
    store: Arc<StateStore>,
    target: Arc<dyn RenderTarget>,
    mark_read: bool,
    cancel: CancellationToken,
) {
    let mut rendered: Option<EventId> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = surface.contents_wake.notified() => (),
        }

        let forced = surface.refresh.swap(false, Ordering::AcqRel);
        let newest = *surface.newest.lock();
        if !forced && newest <= rendered {
            continue;
        }

        let size = surface.size.load(Ordering::Acquire);
        if size == 0 {
            continue;
        }

        let upto = newest.unwrap_or(EventId::ZERO);
        let events = store.events_before(&surface.scope, size, upto);
        tracing::trace!(newest = %upto, size, fetched = events.len(), "Rendering contents");

        let window = ContentsWindow {
            scope: surface.scope.clone(),
            size,
            newest: upto,
            events,
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = target.render_contents(window) => (),
        }
        rendered = newest;

        // Only what was on screen counts as read
        if mark_read && newest.is_some() {
            store.mark_read_until(&surface.scope, upto);
        }
    }
}

#[instrument(skip_all, fields(scope = %surface.scope))]
async fn run_metadata(
    surface: Arc<Surface>,
    target: Arc<dyn RenderTarget>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = surface.pending_metadata.changed() => (),
        }

        while let Some((revision, metadata)) = surface.pending_metadata.take() {
            tracing::trace!(revision, "Rendering metadata");
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = target.render_metadata(metadata) => (),
            }
        }
    }
}
