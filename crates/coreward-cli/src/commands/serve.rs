//! `coreward serve` — runs the arbiter server over a Unix-socket
//! transport until it receives SIGINT/SIGTERM or a client sends
//! `CLIENT_SERVER_SHUTDOWN`.

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use coreward_config::CorewardConfig;
use coreward_server::Scheduler;
use coreward_server::shell::Shell;
use coreward_transport::{ClientTransport, UnixClientTransport, UnixServerTransport};
use coreward_types::Pid;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

/// Reserved routing key for the internal client the signal thread uses
/// to poke the dispatcher loop awake. No real client is expected to
/// supply a pid this large.
const SHUTDOWN_PID: u32 = u32::MAX;

pub struct ServeArgs {
    pub verbosity: i32,
    pub max_cores: Option<u32>,
    pub color: bool,
    pub socket_dir: Option<PathBuf>,
    pub queue_capacity: Option<usize>,
}

pub fn run(args: ServeArgs) -> Result<()> {
    let mut config = CorewardConfig::load().unwrap_or_default();
    if let Some(max_cores) = args.max_cores {
        config.server.max_cores = Some(max_cores);
    }
    if let Some(socket_dir) = args.socket_dir {
        config.server.socket_dir = socket_dir;
    }
    if let Some(queue_capacity) = args.queue_capacity {
        config.server.queue_capacity = queue_capacity;
    }
    config.server.verbosity = args.verbosity;
    config.resolve_paths(std::env::current_dir().unwrap_or_default());

    let max_cores = config.server.max_cores.unwrap_or_else(|| {
        core_affinity::get_core_ids().map_or(1, |ids| ids.len() as u32)
    });

    info!(
        socket_dir = %config.server.socket_dir.display(),
        max_cores,
        queue_capacity = config.server.queue_capacity,
        color = args.color,
        "starting coreward server"
    );

    let server_transport = UnixServerTransport::bind(config.server.socket_dir.clone())
        .context("failed to bind server socket")?;
    let scheduler = Scheduler::new(max_cores);
    let shell = Shell::spawn(scheduler, Box::new(server_transport));

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("coreward-signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                let _ = tx.send(signal);
            }
        })
        .context("failed to spawn signal-handling thread")?;

    let signal = rx.recv().context("signal channel closed unexpectedly")?;
    info!(signal, "received shutdown signal, tearing down dispatcher");

    let mut shutdown_client = UnixClientTransport::connect(&config.server.socket_dir, Pid(SHUTDOWN_PID))
        .context("failed to open internal shutdown socket")?;
    shell
        .shutdown(&mut shutdown_client as &mut dyn ClientTransport)
        .context("dispatcher did not shut down cleanly")?;

    info!("server stopped");
    Ok(())
}
