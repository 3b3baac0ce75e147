//! Demo producer and logging render layer for `parley_core`.
//!
//! Generates a plausible stream of chat traffic into a [`StateStore`] and
//! watches one surface through an [`UpdateCoordinator`], logging each render.
//!
//! [`StateStore`]: parley_core::store::StateStore
//! [`UpdateCoordinator`]: parley_core::coordinator::UpdateCoordinator

pub mod config;
pub mod tracing_config;

pub mod generator;
pub mod render;

pub mod run;
