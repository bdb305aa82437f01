//! A dummy CPU-bound workload for exercising a thread pool.
//!
//! Stands in for the original system's OpenMP/TBB sample kernels —
//! enough floating-point work per call that a backend's thread count
//! visibly changes how fast a batch finishes, without depending on any
//! real computation the rest of the crate cares about.

/// Builds a workload closure that burns roughly `iterations` floating
/// point operations per call.
pub fn dummy_workload(iterations: u64) -> impl Fn() + Send + Sync + 'static {
    move || {
        let mut acc = 1.000_001_f64;
        for i in 0..iterations {
            acc = (acc * 1.000_001 + (i as f64).sqrt()).fract() + 1.0;
        }
        std::hint::black_box(acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_workload_runs_without_panicking() {
        let work = dummy_workload(1_000);
        work();
    }
}
