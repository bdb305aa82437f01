//! Prometheus gauges for the scheduler's internal state.
//!
//! Purely additive: nothing here is consulted by the dispatcher for
//! correctness, only updated by it after each handled message.

use prometheus::{Gauge, Registry};

use crate::dispatcher::Scheduler;

/// A registry of gauges tracking the scheduler's live state.
pub struct SchedulerMetrics {
    registry: Registry,
    occupied_cores: Gauge,
    delayed_setup_acks: Gauge,
    in_flight_reinvades: Gauge,
}

impl SchedulerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let occupied_cores = Gauge::new("coreward_occupied_cores", "Cores currently owned by a client")?;
        let delayed_setup_acks = Gauge::new("coreward_delayed_setup_acks", "Invades queued behind a full resource table")?;
        let in_flight_reinvades = Gauge::new("coreward_in_flight_reinvades", "Clients with an unacked asynchronous proposal")?;

        registry.register(Box::new(occupied_cores.clone()))?;
        registry.register(Box::new(delayed_setup_acks.clone()))?;
        registry.register(Box::new(in_flight_reinvades.clone()))?;

        Ok(Self { registry, occupied_cores, delayed_setup_acks, in_flight_reinvades })
    }

    /// Re-reads the live counts off `scheduler` into the gauges.
    pub fn observe(&self, scheduler: &Scheduler) {
        self.occupied_cores.set(scheduler.resource_table().occupied_count() as f64);
        self.delayed_setup_acks.set(scheduler.delayed_setup_ack_count() as f64);
        self.in_flight_reinvades
            .set(scheduler.clients().iter().filter(|c| c.reinvade_nonblocking_active).count() as f64);
    }

    /// Renders every registered metric in the Prometheus text exposition
    /// format.
    pub fn render(&self) -> prometheus::Result<String> {
        use prometheus::{Encoder, TextEncoder};
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
