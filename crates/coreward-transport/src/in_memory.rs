//! In-process transport backed by bounded mailboxes, keyed by `mtype`.
//!
//! Used by the server/client test suites and by the in-process sample
//! driver, where spawning real processes and Unix sockets would be
//! overkill for exercising dispatcher behaviour.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use coreward_types::Pid;
use coreward_wire::{Message, SERVER_MTYPE};

use crate::error::{TransportError, TransportResult};
use crate::mailbox::{Mailbox, PushOutcome};
use crate::{ClientTransport, ServerTransport};

/// Shared switchboard every [`InMemoryServerTransport`] and
/// [`InMemoryClientTransport`] handle is cloned from.
pub struct InMemoryHub {
    capacity: usize,
    server_inbox: Arc<Mailbox<Message>>,
    clients: Mutex<HashMap<u32, Arc<Mailbox<Message>>>>,
}

impl InMemoryHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            server_inbox: Arc::new(Mailbox::new(capacity)),
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the single server-side transport handle for this hub.
    pub fn server_transport(self: &Arc<Self>) -> InMemoryServerTransport {
        InMemoryServerTransport { hub: Arc::clone(self) }
    }

    /// Registers a new client inbox under `pid.get()` and returns its
    /// transport handle. Re-registering an existing pid replaces its
    /// mailbox, matching a client that reconnects after a crash.
    pub fn register_client(self: &Arc<Self>, pid: Pid) -> InMemoryClientTransport {
        let inbox = Arc::new(Mailbox::new(self.capacity));
        self.clients.lock().expect("hub mutex poisoned").insert(pid.get(), Arc::clone(&inbox));
        InMemoryClientTransport {
            hub: Arc::clone(self),
            mtype: pid.get(),
            inbox,
        }
    }

    pub fn deregister_client(&self, pid: Pid) {
        if let Some(inbox) = self.clients.lock().expect("hub mutex poisoned").remove(&pid.get()) {
            inbox.close();
        }
    }
}

pub struct InMemoryServerTransport {
    hub: Arc<InMemoryHub>,
}

impl ServerTransport for InMemoryServerTransport {
    fn recv_blocking(&mut self) -> TransportResult<Message> {
        self.hub.server_inbox.recv_blocking().ok_or(TransportError::Closed)
    }

    fn send_to(&mut self, mtype: u32, msg: &Message) -> TransportResult<()> {
        let clients = self.hub.clients.lock().expect("hub mutex poisoned");
        let inbox = clients.get(&mtype).ok_or(TransportError::UnknownDestination(mtype))?;
        match inbox.try_push(msg.clone()) {
            PushOutcome::Delivered => Ok(()),
            PushOutcome::Full(_) => Err(TransportError::MailboxFull),
        }
    }

    fn known_clients(&self) -> Vec<u32> {
        self.hub.clients.lock().expect("hub mutex poisoned").keys().copied().collect()
    }
}

pub struct InMemoryClientTransport {
    hub: Arc<InMemoryHub>,
    mtype: u32,
    inbox: Arc<Mailbox<Message>>,
}

impl ClientTransport for InMemoryClientTransport {
    fn send_to_server(&mut self, msg: &Message) -> TransportResult<()> {
        debug_assert_eq!(SERVER_MTYPE, 1, "server mtype constant changed underfoot");
        match self.hub.server_inbox.try_push(msg.clone()) {
            PushOutcome::Delivered => Ok(()),
            PushOutcome::Full(_) => Err(TransportError::MailboxFull),
        }
    }

    fn recv_blocking(&mut self) -> TransportResult<Message> {
        let _ = self.mtype;
        self.inbox.recv_blocking().ok_or(TransportError::Closed)
    }
}
