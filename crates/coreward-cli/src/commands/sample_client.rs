//! `coreward sample-client` — connects to a running server over a Unix
//! socket, invades cores, runs the dummy workload for a while, then
//! retreats and shuts down.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use coreward_client::backends::rayon_backend::RayonThreadPool;
use coreward_client::backends::std_backend::StdThreadPool;
use coreward_client::{Client, ThreadPoolBackend};
use coreward_transport::UnixClientTransport;
use coreward_types::Pid;
use tracing::info;

pub struct SampleClientArgs {
    pub socket_dir: PathBuf,
    pub pid: u32,
    pub min_cores: u32,
    pub max_cores: u32,
    pub distribution_hint: f64,
    pub run_millis: u64,
    pub rayon: bool,
}

pub fn run(args: SampleClientArgs) -> Result<()> {
    let pid = Pid(args.pid);
    let transport = UnixClientTransport::connect(&args.socket_dir, pid)
        .context("failed to open client socket")?;

    let backend: Box<dyn ThreadPoolBackend> = if args.rayon {
        Box::new(RayonThreadPool::new(args.max_cores as usize))
    } else {
        Box::new(StdThreadPool::new(
            args.max_cores as usize,
            coreward_client::workload::dummy_workload(10_000),
        ))
    };

    let mut client = Client::new(pid, Box::new(transport), backend);
    client.setup().context("CLIENT_SETUP failed")?;
    info!(%pid, "registered with the server");

    let affinity = client
        .invade(args.min_cores, args.max_cores, args.distribution_hint, Vec::new())
        .context("CLIENT_INVADE failed")?;
    info!(%pid, cores = affinity.len(), "invade granted");

    std::thread::sleep(Duration::from_millis(args.run_millis));

    client.retreat().context("CLIENT_RETREAT failed")?;
    info!(%pid, "retreated");

    client.shutdown(1.0).context("CLIENT_SHUTDOWN failed")?;
    info!(%pid, "shut down cleanly");
    Ok(())
}
