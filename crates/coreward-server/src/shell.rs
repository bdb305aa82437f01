//! Threaded wrapper around [`Scheduler`].
//!
//! The dispatcher itself never spawns threads or owns a runtime; this
//! module runs its receive loop on a dedicated thread and gives the
//! caller a handle that tears it down cleanly — injecting
//! `CLIENT_SERVER_SHUTDOWN` through a separate client channel to
//! unblock the blocking receive, then joining.

use std::thread::{self, JoinHandle};

use coreward_transport::{ClientTransport, ServerTransport};
use coreward_wire::Message;
use tracing::info;

use crate::dispatcher::Scheduler;
use crate::error::{ServerError, ServerResult};

/// A running dispatcher thread.
pub struct Shell {
    handle: JoinHandle<ServerResult<()>>,
}

impl Shell {
    /// Spawns `scheduler`'s receive loop on its own thread, taking
    /// ownership of `transport` for the lifetime of that loop.
    pub fn spawn(mut scheduler: Scheduler, mut transport: Box<dyn ServerTransport>) -> Self {
        let handle = thread::Builder::new()
            .name("coreward-dispatcher".into())
            .spawn(move || scheduler.run(transport.as_mut()))
            .expect("failed to spawn dispatcher thread");
        Self { handle }
    }

    /// Sends `CLIENT_SERVER_SHUTDOWN` over `shutdown_client` and joins
    /// the dispatcher thread. `shutdown_client` must be a client of the
    /// same transport endpoint the dispatcher is reading from.
    pub fn shutdown(self, shutdown_client: &mut dyn ClientTransport) -> ServerResult<()> {
        shutdown_client.send_to_server(&Message::ClientServerShutdown)?;
        info!("CLIENT_SERVER_SHUTDOWN sent, waiting for dispatcher thread to join");
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(ServerError::DispatcherPanicked),
        }
    }
}
