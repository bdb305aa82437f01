//! `coreward demo` — runs the server and two sample clients in one
//! process over an in-memory transport, so the optimizer's reaction to
//! a population change can be watched without any real sockets.

use anyhow::{Context, Result};
use coreward_client::backends::std_backend::StdThreadPool;
use coreward_client::{Client, ThreadPoolBackend};
use coreward_server::Scheduler;
use coreward_server::shell::Shell;
use coreward_transport::{ClientTransport, InMemoryHub};
use coreward_types::Pid;
use tracing::info;

const SHUTDOWN_PID: u32 = u32::MAX;

pub fn run(max_cores: u32, queue_capacity: usize) -> Result<()> {
    info!(max_cores, queue_capacity, "starting in-process demo");

    let hub = InMemoryHub::new(queue_capacity);
    let server_transport = hub.server_transport();
    let shell = Shell::spawn(Scheduler::new(max_cores), Box::new(server_transport));

    let mut client_a = Client::new(
        Pid(1),
        Box::new(hub.register_client(Pid(1))),
        backend_for(max_cores),
    );
    let mut client_b = Client::new(
        Pid(2),
        Box::new(hub.register_client(Pid(2))),
        backend_for(max_cores),
    );

    client_a.setup().context("client A setup failed")?;
    client_b.setup().context("client B setup failed")?;

    let affinity_a = client_a
        .invade(1, max_cores, 1.0, Vec::new())
        .context("client A invade failed")?;
    info!(cores = ?affinity_a, "client A invaded");

    let affinity_b = client_b
        .invade(1, max_cores, 1.0, Vec::new())
        .context("client B invade failed")?;
    info!(cores = ?affinity_b, "client B invaded (optimizer reconciled with A)");

    client_a.retreat().context("client A retreat failed")?;
    info!("client A retreated to one core");

    client_a.shutdown(1.0).context("client A shutdown failed")?;
    client_b.shutdown(1.0).context("client B shutdown failed")?;

    let mut shutdown_client = hub.register_client(Pid(SHUTDOWN_PID));
    shell
        .shutdown(&mut shutdown_client as &mut dyn ClientTransport)
        .context("dispatcher did not shut down cleanly")?;

    info!("demo complete");
    Ok(())
}

fn backend_for(max_cores: u32) -> Box<dyn ThreadPoolBackend> {
    Box::new(StdThreadPool::new(
        max_cores as usize,
        coreward_client::workload::dummy_workload(10_000),
    ))
}
