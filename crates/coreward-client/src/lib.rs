//! Sample client driver: the invade/reinvade/retreat protocol wired up
//! to a pluggable thread-pool backend.
//!
//! This crate is the "application" side of the protocol —
//! `coreward-server` never depends on it. Two thread-pool backends
//! ship: [`backends::std_backend`] (plain `std::thread`, OpenMP-style)
//! and [`backends::rayon_backend`] (`rayon`, TBB-style); both implement
//! the same [`thread_pool::ThreadPoolBackend`] capability set so the
//! protocol driver in [`client`] never needs to know which one it
//! holds.

pub mod backends;
pub mod client;
pub mod error;
pub mod thread_pool;
pub mod workload;

pub use client::Client;
pub use error::{ClientError, ClientResult};
pub use thread_pool::ThreadPoolBackend;
