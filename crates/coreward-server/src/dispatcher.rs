//! Single-threaded receive loop and message handlers.
//!
//! All scheduler state lives here. The loop blocks only at "receive the
//! next inbound message" — no locking is needed for anything this
//! struct owns.

use std::time::Instant;

use coreward_transport::ServerTransport;
use coreward_types::{ClientId, CoreId, Pid};
use coreward_wire::Message;
use tracing::{instrument, warn};

use crate::client::ClientRecord;
use crate::error::{ServerError, ServerResult};
use crate::messenger::Messenger;
use crate::optimizer;
use crate::reconciler::{self, Outcome};
use crate::resource_table::ResourceTable;

/// What the caller's receive loop should do after a handled message.
pub enum HandledAction {
    Continue,
    Shutdown,
}

pub struct Scheduler {
    max_cores: u32,
    table: ResourceTable,
    clients: Vec<ClientRecord>,
    optimal_cpu_distribution: Vec<u32>,
    delayed_setup_acks: Vec<ClientId>,
    messenger: Messenger,
    next_client_id: u64,
    start_time_first_client: Option<Instant>,
    sum_client_shutdown_hint: f64,
    sum_client_shutdown_hint_div_time: f64,
    #[cfg(feature = "metrics")]
    metrics: Option<crate::metrics::SchedulerMetrics>,
}

impl Scheduler {
    pub fn new(max_cores: u32) -> Self {
        Self {
            max_cores,
            table: ResourceTable::new(max_cores as usize),
            clients: Vec::new(),
            optimal_cpu_distribution: Vec::new(),
            delayed_setup_acks: Vec::new(),
            messenger: Messenger::new(),
            next_client_id: 1,
            start_time_first_client: None,
            sum_client_shutdown_hint: 0.0,
            sum_client_shutdown_hint_div_time: 0.0,
            #[cfg(feature = "metrics")]
            metrics: crate::metrics::SchedulerMetrics::new().ok(),
        }
    }

    /// Renders the live Prometheus gauges, when the `metrics` feature is
    /// enabled and the registry built successfully.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> Option<String> {
        self.metrics.as_ref().and_then(|m| m.render().ok())
    }

    #[cfg(feature = "metrics")]
    fn observe_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.observe(self);
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn observe_metrics(&self) {}

    pub fn resource_table(&self) -> &ResourceTable {
        &self.table
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    /// Number of invades currently queued behind a full resource table.
    pub fn delayed_setup_ack_count(&self) -> usize {
        self.delayed_setup_acks.len()
    }

    fn find_index(&self, pid: Pid) -> Option<usize> {
        self.clients.iter().position(|c| c.pid == pid)
    }

    fn recompute_optimum(&mut self) {
        self.optimal_cpu_distribution = optimizer::optimize(&self.clients, self.max_cores);
    }

    fn flush_delayed_acks(&mut self, transport: &mut dyn ServerTransport) -> ServerResult<()> {
        let entries = std::mem::take(&mut self.delayed_setup_acks);
        let mut still_pending = Vec::with_capacity(entries.len());

        for client_id in entries {
            let Some(index) = self.clients.iter().position(|c| c.client_id == client_id) else {
                continue;
            };

            let Scheduler { table, clients, optimal_cpu_distribution, .. } = self;
            let client = &mut clients[index];
            let optimal = optimal_cpu_distribution[index];
            let outcome = reconciler::apply_sync(table, client, optimal)?;

            if outcome == Outcome::Changed {
                let pid = self.clients[index].pid;
                let affinity = self.clients[index].assigned_cores.clone();
                let msg = self.messenger.invade_answer(pid, true, affinity);
                transport.send_to(pid.get(), &msg)?;

                let Scheduler { table, clients, optimal_cpu_distribution, messenger, .. } = self;
                reconciler::apply_async(table, &mut clients[index], optimal_cpu_distribution[index], false, messenger, transport)?;
            } else {
                still_pending.push(client_id);
            }
        }

        self.delayed_setup_acks = still_pending;
        Ok(())
    }

    fn broadcast_async_reinvades(&mut self, transport: &mut dyn ServerTransport) -> ServerResult<()> {
        for index in 0..self.clients.len() {
            let Scheduler { table, clients, optimal_cpu_distribution, messenger, .. } = self;
            reconciler::apply_async(table, &mut clients[index], optimal_cpu_distribution[index], false, messenger, transport)?;
        }
        Ok(())
    }

    #[instrument(skip(self, transport), fields(kind))]
    pub fn handle(&mut self, msg: Message, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        tracing::Span::current().record("kind", format!("{:?}", msg.kind()));
        match msg {
            Message::ClientSetup(m) => self.handle_setup(m.pid, transport),
            Message::ClientShutdown(m) => self.handle_shutdown(m.pid, m.client_shutdown_hint, transport),
            Message::ClientInvade(m) => self.handle_invade(m, transport, false),
            Message::ClientInvadeNonblocking(m) => self.handle_invade(m, transport, true),
            Message::ClientReinvade(m) => self.handle_reinvade(m.pid, transport),
            Message::ClientReinvadeAckNonblocking(m) => self.handle_reinvade_ack(m.pid, m.affinity, transport),
            Message::ClientRetreat(m) => self.handle_retreat(m.pid, transport),
            Message::ClientServerShutdown => Ok(HandledAction::Shutdown),
            other => {
                warn!(?other, "ignoring message not valid inbound to the dispatcher");
                Ok(HandledAction::Continue)
            }
        }
    }

    fn handle_setup(&mut self, pid: Pid, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        if self.start_time_first_client.is_none() {
            self.start_time_first_client = Some(Instant::now());
        }

        if self.find_index(pid).is_none() {
            let client_id = ClientId(self.next_client_id);
            self.next_client_id += 1;
            self.clients.push(ClientRecord::new(client_id, pid));
            self.optimal_cpu_distribution.push(0);
        }

        let ack = self.messenger.ack();
        transport.send_to(pid.get(), &ack)?;
        Ok(HandledAction::Continue)
    }

    fn handle_shutdown(&mut self, pid: Pid, hint: f64, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        let Some(index) = self.find_index(pid) else {
            warn!(%pid, "CLIENT_SHUTDOWN for unknown pid");
            return Ok(HandledAction::Continue);
        };

        let client_id = self.clients[index].client_id;
        self.table.release_all_for(client_id);
        self.clients.remove(index);
        self.delayed_setup_acks.retain(|id| *id != client_id);

        self.sum_client_shutdown_hint += hint;
        let elapsed = self.start_time_first_client.map_or(0.0, |t| t.elapsed().as_secs_f64());
        if elapsed > 0.0 {
            self.sum_client_shutdown_hint_div_time += hint / elapsed;
        }

        let reply = self.messenger.ack_shutdown(self.sum_client_shutdown_hint, self.sum_client_shutdown_hint_div_time);
        transport.send_to(pid.get(), &reply)?;

        self.recompute_optimum();
        self.flush_delayed_acks(transport)?;
        self.broadcast_async_reinvades(transport)?;
        Ok(HandledAction::Continue)
    }

    fn handle_invade(&mut self, m: coreward_wire::Invade, transport: &mut dyn ServerTransport, nonblocking: bool) -> ServerResult<HandledAction> {
        if m.min_cpus == 0 || m.max_cpus == 0 {
            return Err(ServerError::InvalidConstraints { pid: m.pid, min_cpus: m.min_cpus, max_cpus: m.max_cpus });
        }

        let Some(index) = self.find_index(m.pid) else {
            warn!(pid = %m.pid, "CLIENT_INVADE for unknown pid");
            return Ok(HandledAction::Continue);
        };

        self.clients[index].retreat_active = false;
        self.clients[index].set_constraints(m.min_cpus, m.max_cpus, m.distribution_hint, m.scalability_graph);
        self.recompute_optimum();

        let client_id = self.clients[index].client_id;

        if nonblocking {
            let Scheduler { table, clients, optimal_cpu_distribution, messenger, .. } = self;
            reconciler::apply_async(table, &mut clients[index], optimal_cpu_distribution[index], false, messenger, transport)?;

            if self.clients[index].number_of_assigned_cores() == 0 {
                self.delayed_setup_acks.push(client_id);
            } else {
                self.flush_delayed_acks(transport)?;
                self.broadcast_async_reinvades(transport)?;
            }
        } else {
            let Scheduler { table, clients, optimal_cpu_distribution, .. } = self;
            let outcome = reconciler::apply_sync(table, &mut clients[index], optimal_cpu_distribution[index])?;

            if self.clients[index].number_of_assigned_cores() == 0 {
                self.delayed_setup_acks.push(client_id);
            } else {
                let pid = self.clients[index].pid;
                let affinity = self.clients[index].assigned_cores.clone();
                let msg = self.messenger.invade_answer(pid, outcome == Outcome::Changed, affinity);
                transport.send_to(pid.get(), &msg)?;
                self.flush_delayed_acks(transport)?;
                self.broadcast_async_reinvades(transport)?;
            }
        }

        Ok(HandledAction::Continue)
    }

    fn handle_reinvade(&mut self, pid: Pid, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        let Some(index) = self.find_index(pid) else {
            warn!(%pid, "CLIENT_REINVADE for unknown pid");
            return Ok(HandledAction::Continue);
        };

        if self.clients[index].reinvade_nonblocking_active {
            let msg = self.messenger.invade_answer(pid, false, self.clients[index].assigned_cores.clone());
            transport.send_to(pid.get(), &msg)?;
        } else {
            let Scheduler { table, clients, optimal_cpu_distribution, .. } = self;
            let outcome = reconciler::apply_sync(table, &mut clients[index], optimal_cpu_distribution[index])?;
            let affinity = self.clients[index].assigned_cores.clone();
            let msg = self.messenger.invade_answer(pid, outcome == Outcome::Changed, affinity);
            transport.send_to(pid.get(), &msg)?;
        }

        self.flush_delayed_acks(transport)?;
        self.broadcast_async_reinvades(transport)?;
        Ok(HandledAction::Continue)
    }

    fn handle_reinvade_ack(&mut self, pid: Pid, affinity: Vec<CoreId>, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        let Some(index) = self.find_index(pid) else {
            warn!(%pid, "CLIENT_REINVADE_ACK_NONBLOCKING for unknown pid");
            return Ok(HandledAction::Continue);
        };

        reconciler::apply_reinvade_ack(&mut self.table, &mut self.clients[index], affinity)?;

        if self.clients[index].retreat_active {
            return Ok(HandledAction::Continue);
        }

        self.flush_delayed_acks(transport)?;
        self.broadcast_async_reinvades(transport)?;
        Ok(HandledAction::Continue)
    }

    fn handle_retreat(&mut self, pid: Pid, transport: &mut dyn ServerTransport) -> ServerResult<HandledAction> {
        let Some(index) = self.find_index(pid) else {
            warn!(%pid, "CLIENT_RETREAT for unknown pid");
            return Ok(HandledAction::Continue);
        };

        let client_id = self.clients[index].client_id;
        let released = self.clients[index].apply_retreat();
        for core in released {
            self.table.release(core, client_id)?;
        }

        self.recompute_optimum();
        let ack = self.messenger.ack();
        transport.send_to(pid.get(), &ack)?;

        self.flush_delayed_acks(transport)?;
        self.broadcast_async_reinvades(transport)?;
        Ok(HandledAction::Continue)
    }

    /// Runs the receive loop until a `CLIENT_SERVER_SHUTDOWN` arrives,
    /// broadcasting `SERVER_QUIT` to every still-registered client
    /// immediately before returning.
    pub fn run(&mut self, transport: &mut dyn ServerTransport) -> ServerResult<()> {
        loop {
            let msg = transport.recv_blocking()?;
            match self.handle(msg, transport)? {
                HandledAction::Continue => self.observe_metrics(),
                HandledAction::Shutdown => break,
            }
        }

        let quit = self.messenger.quit();
        for client in &self.clients {
            if let Err(err) = transport.send_to(client.pid.get(), &quit) {
                warn!(pid = %client.pid, error = %err, "failed to deliver SERVER_QUIT");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreward_transport::{ClientTransport, InMemoryHub};
    use coreward_wire::{ClientShutdown, Invade, PidOnly};
    use test_case::test_case;

    struct Harness {
        scheduler: Scheduler,
        server: coreward_transport::InMemoryServerTransport,
        hub: std::sync::Arc<InMemoryHub>,
    }

    impl Harness {
        fn new(max_cores: u32) -> Self {
            let hub = InMemoryHub::new(64);
            let server = hub.server_transport();
            Self { scheduler: Scheduler::new(max_cores), server, hub }
        }

        fn connect(&self, pid: u32) -> coreward_transport::InMemoryClientTransport {
            self.hub.register_client(Pid(pid))
        }

        fn send(&mut self, msg: Message) {
            self.scheduler.handle(msg, &mut self.server).expect("handler succeeds");
        }
    }

    fn invade(pid: u32, min: u32, max: u32) -> Message {
        Message::ClientInvade(Invade { pid: Pid(pid), min_cpus: min, max_cpus: max, distribution_hint: 0.0, scalability_graph: vec![] })
    }

    fn invade_nonblocking(pid: u32, min: u32, max: u32) -> Message {
        Message::ClientInvadeNonblocking(Invade { pid: Pid(pid), min_cpus: min, max_cpus: max, distribution_hint: 0.0, scalability_graph: vec![] })
    }

    #[test]
    fn scenario_solo_client() {
        let mut h = Harness::new(4);
        let mut a = h.connect(100);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(100) }));
        let _ack = a.recv_blocking().unwrap();

        h.send(invade(100, 1, 4));
        let answer = a.recv_blocking().unwrap();
        match answer {
            Message::ServerInvadeAnswer(ans) => {
                assert!(ans.anything_changed);
                assert_eq!(ans.affinity, vec![CoreId(0), CoreId(1), CoreId(2), CoreId(3)]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        h.send(Message::ClientRetreat(PidOnly { pid: Pid(100) }));
        let _ack = a.recv_blocking().unwrap();
        assert_eq!(h.scheduler.clients()[0].assigned_cores, vec![CoreId(0)]);

        h.send(Message::ClientShutdown(ClientShutdown { pid: Pid(100), client_shutdown_hint: 1.0 }));
        let _shutdown_ack = a.recv_blocking().unwrap();
        assert_eq!(h.scheduler.resource_table().occupied_count(), 0);
    }

    #[test]
    fn scenario_two_equals_queues_then_unsticks() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        let mut b = h.connect(2);

        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(2) }));
        let _ = b.recv_blocking().unwrap();

        h.send(invade(1, 1, 4));
        let _ = a.recv_blocking().unwrap();
        assert_eq!(h.scheduler.resource_table().occupied_count(), 4);

        h.send(invade(2, 1, 4));
        // B is queued: the resource table has no free slot for a sync grant.
        assert_eq!(h.scheduler.clients()[1].number_of_assigned_cores(), 0);

        // A's async reinvade-ack frees cores, unsticking B's delayed ack.
        h.send(Message::ClientReinvadeAckNonblocking(coreward_wire::ClientReinvadeAckNonblocking {
            pid: Pid(1),
            affinity: vec![CoreId(0), CoreId(1)],
        }));
        assert!(h.scheduler.clients()[1].number_of_assigned_cores() > 0);
    }

    #[test]
    fn scenario_scalability_bias() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        let mut b = h.connect(2);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(2) }));
        let _ = b.recv_blocking().unwrap();

        h.send(Message::ClientInvade(Invade {
            pid: Pid(1),
            min_cpus: 1,
            max_cpus: 4,
            distribution_hint: 0.0,
            scalability_graph: vec![1.0, 1.1, 1.15, 1.17],
        }));
        let _ = a.recv_blocking().unwrap();

        h.send(Message::ClientInvade(Invade {
            pid: Pid(2),
            min_cpus: 1,
            max_cpus: 4,
            distribution_hint: 0.0,
            scalability_graph: vec![1.0, 1.9, 2.7, 3.4],
        }));
        let _ = b.recv_blocking().unwrap();

        let total: usize = h.scheduler.clients().iter().map(ClientRecord::number_of_assigned_cores).sum();
        assert_eq!(total, 4);
        assert!(h.scheduler.clients()[1].number_of_assigned_cores() >= 3);
    }

    #[test]
    fn scenario_nonblocking_gates_a_second_proposal() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();

        h.send(invade_nonblocking(1, 1, 4));
        let proposal = a.recv_blocking().unwrap();
        match proposal {
            Message::ServerReinvadeNonblocking(answer) => {
                assert_eq!(answer.affinity, vec![CoreId(0), CoreId(1), CoreId(2), CoreId(3)]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        h.send(Message::ClientReinvadeAckNonblocking(coreward_wire::ClientReinvadeAckNonblocking {
            pid: Pid(1),
            affinity: vec![CoreId(0), CoreId(1)],
        }));
        assert_eq!(h.scheduler.clients()[0].assigned_cores, vec![CoreId(0), CoreId(1)]);
        assert_eq!(h.scheduler.resource_table().owner(CoreId(2)), None);
        assert_eq!(h.scheduler.resource_table().owner(CoreId(3)), None);
    }

    #[test]
    fn scenario_delayed_ack_unsticks_on_shutdown() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        let mut b = h.connect(2);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(invade(1, 1, 4));
        let _ = a.recv_blocking().unwrap();

        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(2) }));
        let _ = b.recv_blocking().unwrap();
        h.send(invade(2, 1, 4));
        assert_eq!(h.scheduler.clients()[1].number_of_assigned_cores(), 0);

        h.send(Message::ClientShutdown(ClientShutdown { pid: Pid(1), client_shutdown_hint: 0.5 }));
        let _ = a.recv_blocking().unwrap();

        let answer = b.recv_blocking().unwrap();
        match answer {
            Message::ServerInvadeAnswer(ans) => {
                assert_eq!(ans.affinity, vec![CoreId(0), CoreId(1), CoreId(2), CoreId(3)]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn scenario_retreat_under_async_skips_flush_for_that_client() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        let mut b = h.connect(2);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(2) }));
        let _ = b.recv_blocking().unwrap();

        h.send(invade_nonblocking(1, 1, 4));
        let _ = a.recv_blocking().unwrap();
        // B has nothing to claim yet (A holds every core); its proposal,
        // if any, is left undrained here — this scenario only cares
        // about A's in-flight gate.
        h.send(invade_nonblocking(2, 1, 4));

        h.send(Message::ClientRetreat(PidOnly { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        assert!(h.scheduler.clients()[0].retreat_active);
        assert!(h.scheduler.clients()[0].reinvade_nonblocking_active, "A's async proposal is still outstanding");

        h.send(Message::ClientReinvadeAckNonblocking(coreward_wire::ClientReinvadeAckNonblocking {
            pid: Pid(1),
            affinity: vec![CoreId(0)],
        }));
        assert!(h.scheduler.clients()[0].number_of_assigned_cores() <= 1);
    }

    #[test_case(1, 4 ; "solo client at full capacity")]
    #[test_case(2, 4 ; "two-core request below capacity")]
    fn invade_never_exceeds_requested_max(max_cpus: u32, machine_cores: u32) {
        let mut h = Harness::new(machine_cores);
        let mut a = h.connect(1);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(invade(1, 1, max_cpus));
        let _ = a.recv_blocking().unwrap();
        assert!(h.scheduler.clients()[0].number_of_assigned_cores() as u32 <= max_cpus);
    }

    #[test]
    fn idempotent_reinvade_with_no_state_change_reports_unchanged() {
        let mut h = Harness::new(4);
        let mut a = h.connect(1);
        h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
        let _ = a.recv_blocking().unwrap();
        h.send(invade(1, 1, 4));
        let _ = a.recv_blocking().unwrap();

        h.send(Message::ClientReinvade(PidOnly { pid: Pid(1) }));
        let answer = a.recv_blocking().unwrap();
        match answer {
            Message::ServerInvadeAnswer(ans) => assert!(!ans.anything_changed),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(h.scheduler.clients()[0].assigned_cores.len(), 4);
    }

    proptest::proptest! {
        #[test]
        fn ownership_uniqueness_holds_after_random_invades(
            a_max in 1u32..5, b_max in 1u32..5,
        ) {
            let mut h = Harness::new(4);
            let _a = h.connect(1);
            let _b = h.connect(2);
            h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(1) }));
            h.send(Message::ClientSetup(coreward_wire::ClientSetup { pid: Pid(2) }));
            h.send(invade(1, 1, a_max));
            h.send(invade(2, 1, b_max));

            for core_index in 0..4u32 {
                let core = CoreId(core_index);
                let owner = h.scheduler.resource_table().owner(core);
                if let Some(owner) = owner {
                    let claimants = h.scheduler.clients().iter().filter(|c| c.assigned_cores.contains(&core)).count();
                    prop_assert_eq!(claimants, 1);
                    prop_assert!(h.scheduler.clients().iter().any(|c| c.client_id == owner));
                }
            }

            let total: u32 = h.scheduler.clients().iter().map(|c| c.number_of_assigned_cores() as u32).sum();
            prop_assert!(total <= 4);
        }
    }
}
