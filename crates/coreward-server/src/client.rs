//! Per-client scheduler state.

use coreward_types::{ClientId, CoreId, Pid};

/// Everything the scheduler tracks about one live client.
///
/// A record is created on `CLIENT_SETUP`, mutated only by the
/// dispatcher thread, and dropped on `CLIENT_SHUTDOWN`.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: ClientId,
    pub pid: Pid,
    pub min_cores: u32,
    pub max_cores: u32,
    pub distribution_hint: f64,
    pub scalability_graph: Vec<f64>,
    /// Ascending by core id, except transiently right after a
    /// `CLIENT_REINVADE_ACK_NONBLOCKING` rebuild, which preserves the
    /// ack's own ordering until the next mutation re-sorts it.
    pub assigned_cores: Vec<CoreId>,
    pub retreat_active: bool,
    pub reinvade_nonblocking_active: bool,
}

impl ClientRecord {
    /// A freshly set-up client wants nothing until its first `CLIENT_INVADE`
    /// sets real constraints — `max_cores: 0` keeps it out of the
    /// optimizer's reservation step until then.
    pub fn new(client_id: ClientId, pid: Pid) -> Self {
        Self {
            client_id,
            pid,
            min_cores: 0,
            max_cores: 0,
            distribution_hint: 0.0,
            scalability_graph: Vec::new(),
            assigned_cores: Vec::new(),
            retreat_active: false,
            reinvade_nonblocking_active: false,
        }
    }

    pub fn number_of_assigned_cores(&self) -> usize {
        self.assigned_cores.len()
    }

    /// Speedup at `k` cores, per the scalability graph convention:
    /// index `i` holds the speedup at `i + 1` cores, and the last
    /// entry is held as a plateau beyond the graph's length. An empty
    /// graph means "linear up to `max_cores`, invalid above it".
    pub fn scalability_at(&self, k: u32, max_cores: u32) -> f64 {
        if self.scalability_graph.is_empty() {
            return if k <= max_cores { f64::from(k) } else { 0.0 };
        }
        let index = (k.saturating_sub(1) as usize).min(self.scalability_graph.len() - 1);
        self.scalability_graph[index]
    }

    pub fn set_constraints(&mut self, min_cores: u32, max_cores: u32, distribution_hint: f64, scalability_graph: Vec<f64>) {
        self.min_cores = min_cores;
        self.max_cores = max_cores;
        self.distribution_hint = distribution_hint;
        self.scalability_graph = scalability_graph;
    }

    pub fn add_assigned_core(&mut self, core: CoreId) {
        self.assigned_cores.push(core);
        self.assigned_cores.sort_unstable();
    }

    /// Drops the highest-id cores, `count` of them, mirroring a
    /// synchronous-path eviction.
    pub fn drop_highest(&mut self, count: usize) -> Vec<CoreId> {
        let keep = self.assigned_cores.len().saturating_sub(count);
        self.assigned_cores.split_off(keep)
    }

    /// Builds the reduced affinity set an async proposal would carry —
    /// the tail after dropping the lowest `count` entries — without
    /// mutating `assigned_cores` (the async `delta < 0` path must not
    /// touch ownership until the client acks).
    pub fn reduced_tail(&self, count: usize) -> Vec<CoreId> {
        self.assigned_cores[count.min(self.assigned_cores.len())..].to_vec()
    }

    /// Replaces `assigned_cores` wholesale, preserving the given order
    /// (used only when rebuilding from a
    /// `CLIENT_REINVADE_ACK_NONBLOCKING`'s affinity array).
    pub fn replace_assigned_cores(&mut self, cores: Vec<CoreId>) {
        self.assigned_cores = cores;
    }

    /// Forces `min = max = 1`, keeping only the lowest-id assigned core
    /// (if any), as `CLIENT_RETREAT` requires.
    pub fn apply_retreat(&mut self) -> Vec<CoreId> {
        self.retreat_active = true;
        self.min_cores = 1;
        self.max_cores = 1;
        if self.assigned_cores.len() <= 1 {
            return Vec::new();
        }
        let kept = self.assigned_cores[0];
        let released = self.assigned_cores.split_off(1);
        self.assigned_cores = vec![kept];
        released
    }
}
