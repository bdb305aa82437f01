//! Local IPC transport for the coreward core-arbitration service.
//!
//! The dispatcher core never touches a socket directly; it depends only
//! on the narrow [`ServerTransport`] / [`ClientTransport`] traits here.
//! Two implementations are provided: [`in_memory`], a bounded-channel
//! transport used by tests and the in-process sample driver, and
//! [`unix_socket`], a `UnixDatagram`-backed transport rooted at a
//! configurable directory path for real multi-process use.

mod error;
mod in_memory;
mod mailbox;
mod unix_socket;

pub use error::{TransportError, TransportResult};
pub use in_memory::{InMemoryClientTransport, InMemoryHub, InMemoryServerTransport};
pub use unix_socket::{UnixClientTransport, UnixServerTransport};

use coreward_wire::Message;

/// The server side of the transport: one shared inbox fed by every
/// registered client, and addressed sends keyed by `mtype`.
pub trait ServerTransport: Send {
    /// Blocks until the next client→server message arrives.
    fn recv_blocking(&mut self) -> TransportResult<Message>;

    /// Sends `msg` to the client registered under `mtype`.
    fn send_to(&mut self, mtype: u32, msg: &Message) -> TransportResult<()>;

    /// `mtype`s of every client currently known to this transport, for
    /// broadcast sends such as `SERVER_QUIT`.
    fn known_clients(&self) -> Vec<u32>;

    /// Sends `msg` to every client in [`ServerTransport::known_clients`],
    /// logging and continuing past any individual send failure.
    fn broadcast(&mut self, msg: &Message) -> TransportResult<()> {
        for mtype in self.known_clients() {
            if let Err(err) = self.send_to(mtype, msg) {
                tracing::warn!(mtype, error = %err, "broadcast send failed");
            }
        }
        Ok(())
    }
}

/// The client side of the transport: send to the well-known server
/// address and block on one's own inbox.
pub trait ClientTransport: Send {
    fn send_to_server(&mut self, msg: &Message) -> TransportResult<()>;

    fn recv_blocking(&mut self) -> TransportResult<Message>;
}
