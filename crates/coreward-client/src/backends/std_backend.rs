//! `std::thread`-backed pool: the "plain OpenMP-style" implementation.
//!
//! Resizing tears down and respawns every worker, matching the
//! one-shot-team-creation cost real OpenMP-style runtimes pay — cheap
//! enough here since resizes only happen on a `CLIENT_INVADE` answer,
//! not per task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use coreward_types::CoreId;

use crate::thread_pool::ThreadPoolBackend;

/// A pool of plain worker threads, each looping `workload` until
/// stopped.
pub struct StdThreadPool {
    workload: Arc<dyn Fn() + Send + Sync>,
    workers: Vec<Worker>,
    max_threads: usize,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl StdThreadPool {
    pub fn new(max_threads: usize, workload: impl Fn() + Send + Sync + 'static) -> Self {
        Self { workload: Arc::new(workload), workers: Vec::new(), max_threads }
    }

    fn stop_all(&mut self) {
        for worker in self.workers.drain(..) {
            worker.stop.store(true, Ordering::Relaxed);
            let _ = worker.handle.join();
        }
    }

    fn spawn_pinned(&mut self, core: Option<CoreId>) {
        let stop = Arc::new(AtomicBool::new(false));
        let workload = Arc::clone(&self.workload);
        let worker_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            #[cfg(feature = "thread_per_core")]
            if let Some(core) = core {
                core_affinity::set_for_current(core_affinity::CoreId { id: core.index() });
            }
            #[cfg(not(feature = "thread_per_core"))]
            let _ = core;
            while !worker_stop.load(Ordering::Relaxed) {
                workload();
            }
        });
        self.workers.push(Worker { stop, handle });
    }
}

impl ThreadPoolBackend for StdThreadPool {
    fn set_num_threads(&mut self, count: usize) {
        let count = count.min(self.max_threads);
        self.stop_all();
        for _ in 0..count {
            self.spawn_pinned(None);
        }
    }

    fn set_affinity(&mut self, core_ids: &[CoreId]) {
        self.stop_all();
        for core in core_ids {
            self.spawn_pinned(Some(*core));
        }
    }

    fn get_num_threads(&self) -> usize {
        self.workers.len()
    }

    fn get_max_threads(&self) -> usize {
        self.max_threads
    }
}

impl Drop for StdThreadPool {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn set_num_threads_spawns_exactly_that_many_workers() {
        let mut pool = StdThreadPool::new(8, || std::thread::yield_now());
        pool.set_num_threads(3);
        assert_eq!(pool.get_num_threads(), 3);
    }

    #[test]
    fn set_num_threads_is_capped_at_max_threads() {
        let mut pool = StdThreadPool::new(2, || std::thread::yield_now());
        pool.set_num_threads(10);
        assert_eq!(pool.get_num_threads(), 2);
    }

    #[test]
    fn set_affinity_resizes_to_the_given_core_count() {
        let mut pool = StdThreadPool::new(8, || std::thread::yield_now());
        pool.set_affinity(&[CoreId(0), CoreId(1), CoreId(2)]);
        assert_eq!(pool.get_num_threads(), 3);
    }

    #[test]
    fn workers_actually_run_the_workload() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let mut pool = StdThreadPool::new(4, move || {
            counter_clone.fetch_add(1, Ordering::Relaxed);
            std::thread::yield_now();
        });
        pool.set_num_threads(2);
        std::thread::sleep(std::time::Duration::from_millis(20));
        pool.set_num_threads(0);
        assert!(counter.load(Ordering::Relaxed) > 0);
    }
}
