//! Collects commonly-used names for convenient import

pub use crate::{
    coordinator::{
        ContentsWindow, CoordinatorConfig, RenderTarget, SurfaceMetadata, UpdateCoordinator,
    },
    errors::{OrderError, OrderResult},
    event::Event,
    id::*,
    log::EventLog,
    scope::Scope,
    state::*,
    store::{Filter, FilterSpec, StateReceiver, StateStore, StoreStats},
};
