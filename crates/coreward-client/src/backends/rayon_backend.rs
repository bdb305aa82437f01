//! `rayon`-backed pool: the "TBB-style" implementation.
//!
//! `rayon::ThreadPool` is immutable once built, so resizing rebuilds
//! the pool wholesale — the same cost model as [`super::std_backend`],
//! just delegated to rayon's own `ThreadPoolBuilder`.

use coreward_types::CoreId;

use crate::thread_pool::ThreadPoolBackend;

pub struct RayonThreadPool {
    pool: Option<rayon::ThreadPool>,
    affinity: Vec<CoreId>,
    num_threads: usize,
    max_threads: usize,
}

impl RayonThreadPool {
    pub fn new(max_threads: usize) -> Self {
        Self { pool: None, affinity: Vec::new(), num_threads: 0, max_threads }
    }

    /// The live pool, if one has been built via [`ThreadPoolBackend::set_num_threads`]
    /// or [`ThreadPoolBackend::set_affinity`].
    pub fn pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_ref()
    }

    fn rebuild(&mut self, count: usize, affinity: Vec<CoreId>) {
        let pinned = affinity.clone();
        let mut builder = rayon::ThreadPoolBuilder::new().num_threads(count);
        if !pinned.is_empty() {
            builder = builder.start_handler(move |index| {
                if let Some(core) = pinned.get(index) {
                    #[cfg(feature = "thread_per_core")]
                    core_affinity::set_for_current(core_affinity::CoreId { id: core.index() });
                    #[cfg(not(feature = "thread_per_core"))]
                    let _ = core;
                }
            });
        }
        self.pool = builder.build().ok();
        self.num_threads = count;
        self.affinity = affinity;
    }
}

impl ThreadPoolBackend for RayonThreadPool {
    fn set_num_threads(&mut self, count: usize) {
        let count = count.min(self.max_threads);
        self.rebuild(count, Vec::new());
    }

    fn set_affinity(&mut self, core_ids: &[CoreId]) {
        self.rebuild(core_ids.len().min(self.max_threads), core_ids.to_vec());
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    fn get_max_threads(&self) -> usize {
        self.max_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_num_threads_builds_a_pool_of_that_size() {
        let mut pool = RayonThreadPool::new(8);
        pool.set_num_threads(4);
        assert_eq!(pool.get_num_threads(), 4);
        assert_eq!(pool.pool().unwrap().current_num_threads(), 4);
    }

    #[test]
    fn set_num_threads_is_capped_at_max_threads() {
        let mut pool = RayonThreadPool::new(2);
        pool.set_num_threads(10);
        assert_eq!(pool.get_num_threads(), 2);
    }

    #[test]
    fn set_affinity_sizes_the_pool_to_the_core_list() {
        let mut pool = RayonThreadPool::new(8);
        pool.set_affinity(&[CoreId(0), CoreId(1)]);
        assert_eq!(pool.get_num_threads(), 2);
    }

    #[test]
    fn pool_actually_executes_work() {
        let mut pool = RayonThreadPool::new(4);
        pool.set_num_threads(2);
        let sum: i32 = pool.pool().unwrap().install(|| (0..100).sum());
        assert_eq!(sum, 4950);
    }
}
