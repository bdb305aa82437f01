//! Protocol driver: turns `invade`/`reinvade`/`retreat` calls into wire
//! messages and keeps a thread-pool backend in sync with whatever
//! affinity the server last granted.

use coreward_transport::ClientTransport;
use coreward_types::{CoreId, Pid, SeqId};
use coreward_wire::{ClientReinvadeAckNonblocking, ClientSetup, ClientShutdown, Invade, Message, PidOnly};
use tracing::{info, instrument};

use crate::error::{ClientError, ClientResult};
use crate::thread_pool::ThreadPoolBackend;

/// Drives the invade/reinvade/retreat protocol for one pid, keeping
/// `backend` sized to whatever the server last granted.
pub struct Client {
    pid: Pid,
    transport: Box<dyn ClientTransport>,
    backend: Box<dyn ThreadPoolBackend>,
    last_seq: Option<SeqId>,
    affinity: Vec<CoreId>,
}

impl Client {
    pub fn new(pid: Pid, transport: Box<dyn ClientTransport>, backend: Box<dyn ThreadPoolBackend>) -> Self {
        Self { pid, transport, backend, last_seq: None, affinity: Vec::new() }
    }

    pub fn affinity(&self) -> &[CoreId] {
        &self.affinity
    }

    fn check_seq(&mut self, seq_id: SeqId) -> ClientResult<()> {
        if let Some(last) = self.last_seq {
            if seq_id.0 <= last.0 {
                return Err(ClientError::SeqIdRegression { last: last.0, received: seq_id.0 });
            }
        }
        self.last_seq = Some(seq_id);
        Ok(())
    }

    fn apply_affinity(&mut self, affinity: Vec<CoreId>) {
        self.backend.set_affinity(&affinity);
        self.affinity = affinity;
    }

    #[instrument(skip(self), fields(pid = %self.pid))]
    pub fn setup(&mut self) -> ClientResult<()> {
        self.transport.send_to_server(&Message::ClientSetup(ClientSetup { pid: self.pid }))?;
        match self.transport.recv_blocking()? {
            Message::ServerAck(ack) => {
                self.check_seq(ack.seq_id)?;
                info!("setup acknowledged");
                Ok(())
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Blocking invade: waits for the server's grant and applies it.
    pub fn invade(&mut self, min_cpus: u32, max_cpus: u32, distribution_hint: f64, scalability_graph: Vec<f64>) -> ClientResult<Vec<CoreId>> {
        let msg = Message::ClientInvade(Invade { pid: self.pid, min_cpus, max_cpus, distribution_hint, scalability_graph });
        self.transport.send_to_server(&msg)?;
        match self.transport.recv_blocking()? {
            Message::ServerInvadeAnswer(answer) => {
                self.check_seq(answer.seq_id)?;
                self.apply_affinity(answer.affinity.clone());
                Ok(answer.affinity)
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Non-blocking invade: sends the request but does not wait for the
    /// answer. Call [`Client::poll_reinvade_proposal`] to pick up the
    /// server's eventual `SERVER_REINVADE_NONBLOCKING`.
    pub fn invade_nonblocking(&mut self, min_cpus: u32, max_cpus: u32, distribution_hint: f64, scalability_graph: Vec<f64>) -> ClientResult<()> {
        let msg = Message::ClientInvadeNonblocking(Invade { pid: self.pid, min_cpus, max_cpus, distribution_hint, scalability_graph });
        self.transport.send_to_server(&msg)?;
        Ok(())
    }

    /// Blocks for the next inbound message and, if it is a
    /// `SERVER_REINVADE_NONBLOCKING` proposal, applies it and acks it
    /// back immediately (this sample client never declines a proposal).
    pub fn poll_reinvade_proposal(&mut self) -> ClientResult<Option<Vec<CoreId>>> {
        match self.transport.recv_blocking()? {
            Message::ServerReinvadeNonblocking(answer) => {
                self.check_seq(answer.seq_id)?;
                self.apply_affinity(answer.affinity.clone());
                self.transport.send_to_server(&Message::ClientReinvadeAckNonblocking(ClientReinvadeAckNonblocking {
                    pid: self.pid,
                    affinity: answer.affinity.clone(),
                }))?;
                Ok(Some(answer.affinity))
            }
            Message::ServerQuit(ack) => {
                self.check_seq(ack.seq_id)?;
                Ok(None)
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn reinvade(&mut self) -> ClientResult<Vec<CoreId>> {
        self.transport.send_to_server(&Message::ClientReinvade(PidOnly { pid: self.pid }))?;
        match self.transport.recv_blocking()? {
            Message::ServerInvadeAnswer(answer) => {
                self.check_seq(answer.seq_id)?;
                self.apply_affinity(answer.affinity.clone());
                Ok(answer.affinity)
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Drops to one core, keeping the lowest-id core it already held.
    pub fn retreat(&mut self) -> ClientResult<()> {
        self.transport.send_to_server(&Message::ClientRetreat(PidOnly { pid: self.pid }))?;
        match self.transport.recv_blocking()? {
            Message::ServerAck(ack) => {
                self.check_seq(ack.seq_id)?;
                let kept = self.affinity.first().copied();
                self.apply_affinity(kept.into_iter().collect());
                Ok(())
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub fn shutdown(&mut self, client_shutdown_hint: f64) -> ClientResult<()> {
        self.transport.send_to_server(&Message::ClientShutdown(ClientShutdown { pid: self.pid, client_shutdown_hint }))?;
        match self.transport.recv_blocking()? {
            Message::ClientAckShutdown(_) => {
                self.backend.set_num_threads(0);
                Ok(())
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::std_backend::StdThreadPool;
    use coreward_transport::{InMemoryHub, ServerTransport};
    use coreward_wire::{InvadeAnswer, ServerAck};

    fn backend() -> Box<dyn ThreadPoolBackend> {
        Box::new(StdThreadPool::new(8, || std::thread::yield_now()))
    }

    #[test]
    fn setup_applies_the_servers_ack() {
        let hub = InMemoryHub::new(8);
        let client_transport = hub.register_client(Pid(100));
        let mut server = hub.server_transport();

        let mut client = Client::new(Pid(100), Box::new(client_transport), backend());
        let handle = std::thread::spawn(move || client.setup().map(|()| client));

        let inbound = server.recv_blocking().unwrap();
        assert!(matches!(inbound, Message::ClientSetup(_)));
        server.send_to(100, &Message::ServerAck(ServerAck { seq_id: SeqId(1) })).unwrap();

        let client = handle.join().unwrap().unwrap();
        assert_eq!(client.last_seq, Some(SeqId(1)));
    }

    #[test]
    fn invade_applies_the_granted_affinity_to_the_backend() {
        let hub = InMemoryHub::new(8);
        let client_transport = hub.register_client(Pid(200));
        let mut server = hub.server_transport();

        let mut client = Client::new(Pid(200), Box::new(client_transport), backend());
        let handle = std::thread::spawn(move || {
            let affinity = client.invade(1, 4, 0.0, vec![]).unwrap();
            (client, affinity)
        });

        let _ = server.recv_blocking().unwrap();
        server
            .send_to(
                200,
                &Message::ServerInvadeAnswer(InvadeAnswer {
                    pid: Pid(200),
                    seq_id: SeqId(1),
                    anything_changed: true,
                    affinity: vec![CoreId(0), CoreId(1)],
                }),
            )
            .unwrap();

        let (client, affinity) = handle.join().unwrap();
        assert_eq!(affinity, vec![CoreId(0), CoreId(1)]);
        assert_eq!(client.backend.get_num_threads(), 2);
    }

    #[test]
    fn retreat_keeps_only_the_lowest_core() {
        let hub = InMemoryHub::new(8);
        let client_transport = hub.register_client(Pid(300));
        let mut server = hub.server_transport();

        let mut client = Client::new(Pid(300), Box::new(client_transport), backend());
        client.affinity = vec![CoreId(1), CoreId(2), CoreId(3)];

        let handle = std::thread::spawn(move || client.retreat().map(|()| client));
        let _ = server.recv_blocking().unwrap();
        server.send_to(300, &Message::ServerAck(ServerAck { seq_id: SeqId(1) })).unwrap();

        let client = handle.join().unwrap().unwrap();
        assert_eq!(client.affinity, vec![CoreId(1)]);
    }
}
