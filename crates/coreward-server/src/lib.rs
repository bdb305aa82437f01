//! Core-arbitration scheduler: resource table, optimizer, reconciler,
//! and dispatcher.
//!
//! [`Scheduler`] owns every byte of scheduling state and runs on a
//! single thread; [`shell`] wraps it with the threading and teardown
//! plumbing a long-lived server process needs. Everything here depends
//! only on the [`coreward_transport::ServerTransport`] trait, never on
//! a concrete transport.

mod client;
mod error;
mod messenger;
mod optimizer;
mod reconciler;
mod resource_table;

mod dispatcher;
pub mod shell;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use client::ClientRecord;
pub use dispatcher::{HandledAction, Scheduler};
pub use error::{ServerError, ServerResult};
pub use resource_table::ResourceTable;
