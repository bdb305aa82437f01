//! Backend-agnostic thread-pool capability.
//!
//! The protocol driver in [`crate::client`] never picks threads or
//! cores itself — it only tells a backend how many cores it was
//! granted and which ones. What "a thread" means (a plain
//! `std::thread` pool or a `rayon` pool) is entirely the backend's
//! business.

use coreward_types::CoreId;

/// The capability set every thread-pool backend exposes.
pub trait ThreadPoolBackend: Send {
    /// Resizes the pool to exactly `count` worker threads.
    fn set_num_threads(&mut self, count: usize);

    /// Pins the pool's worker threads to `core_ids`, one thread per
    /// core, in order. Implicitly resizes the pool to `core_ids.len()`.
    fn set_affinity(&mut self, core_ids: &[CoreId]);

    /// Current worker thread count.
    fn get_num_threads(&self) -> usize;

    /// Upper bound this backend will accept from `set_num_threads`.
    fn get_max_threads(&self) -> usize;
}
