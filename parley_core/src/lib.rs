//! Event distribution core for a chat client.
//!
//! Holds per-conversation event history in a total order and propagates state
//! changes from producers to a single active consumer without ever blocking
//! the producer or showing the consumer state older than it already has.

pub mod prelude;

pub mod id;
pub mod scope;
pub mod event;
pub mod errors;

pub mod log;
pub mod broadcast;
pub mod slot;

pub mod state;
pub mod store;

pub mod coordinator;

pub mod utils;
