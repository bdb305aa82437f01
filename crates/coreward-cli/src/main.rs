//! Coreward CLI: the arbiter server, a real-socket sample client, and an
//! in-process demo that runs both ends of the protocol for a quick look
//! at the optimizer without spinning up real processes.
//!
//! # Quick start
//!
//! ```bash
//! # Start the server, rooted at a socket directory
//! coreward serve --socket-dir /tmp/coreward
//!
//! # In another terminal, invade 2-4 cores as pid 100
//! coreward sample-client --socket-dir /tmp/coreward --pid 100 --min-cores 2 --max-cores 4
//!
//! # Or watch the whole protocol run in one process
//! coreward demo
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Coreward: a CPU-core resource arbiter for multi-process workloads.
#[derive(Parser)]
#[command(name = "coreward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the arbiter server over a Unix-socket transport.
    Serve {
        /// Verbosity level: positive values print more; -99 and below
        /// raise the per-event trace tier.
        #[arg(short = 'v', long, default_value_t = 0)]
        verbosity: i32,

        /// Override the detected physical core count.
        #[arg(short = 'n', long)]
        max_cores: Option<u32>,

        /// Enable ANSI color in logged output.
        #[arg(short = 'c', long)]
        color: bool,

        /// Directory holding the server and per-client socket files.
        #[arg(long)]
        socket_dir: Option<std::path::PathBuf>,

        /// Bounded mailbox capacity, shared with `coreward demo`'s
        /// in-memory transport; recorded for the Unix transport too but
        /// has no effect there (the kernel owns that buffer).
        #[arg(long)]
        queue_capacity: Option<usize>,
    },

    /// Connect to a running server as one client and exercise
    /// invade/reinvade/retreat against it.
    SampleClient {
        /// Socket directory of the server to connect to.
        #[arg(long)]
        socket_dir: std::path::PathBuf,

        /// This client's pid (the routing key the server will use).
        #[arg(long)]
        pid: u32,

        /// Minimum cores requested.
        #[arg(long, default_value_t = 1)]
        min_cores: u32,

        /// Maximum cores requested.
        #[arg(long, default_value_t = 4)]
        max_cores: u32,

        /// Relative priority weight, passed through as `distribution_hint`.
        #[arg(long, default_value_t = 1.0)]
        distribution_hint: f64,

        /// How long to run the dummy workload before retreating, in
        /// milliseconds.
        #[arg(long, default_value_t = 500)]
        run_millis: u64,

        /// Use the rayon thread-pool backend instead of the plain
        /// `std::thread` one.
        #[arg(long)]
        rayon: bool,
    },

    /// Run the server and two sample clients in one process over an
    /// in-memory transport, to see the optimizer reconcile a population
    /// change without any sockets involved.
    Demo {
        /// Physical cores the demo machine is pretending to have.
        #[arg(short = 'n', long, default_value_t = 4)]
        max_cores: u32,

        #[arg(long, default_value_t = 256)]
        queue_capacity: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match &cli.command {
        Commands::Serve { verbosity, .. } if *verbosity >= 2 => tracing::Level::TRACE,
        Commands::Serve { verbosity, .. } if *verbosity == 1 => tracing::Level::DEBUG,
        Commands::Serve { verbosity, .. } if *verbosity <= -99 => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_ansi(matches!(&cli.command, Commands::Serve { color, .. } if *color))
        .init();

    match cli.command {
        Commands::Serve { verbosity, max_cores, color, socket_dir, queue_capacity } => {
            commands::serve::run(commands::serve::ServeArgs { verbosity, max_cores, color, socket_dir, queue_capacity })
        }
        Commands::SampleClient { socket_dir, pid, min_cores, max_cores, distribution_hint, run_millis, rayon } => {
            commands::sample_client::run(commands::sample_client::SampleClientArgs {
                socket_dir,
                pid,
                min_cores,
                max_cores,
                distribution_hint,
                run_millis,
                rayon,
            })
        }
        Commands::Demo { max_cores, queue_capacity } => commands::demo::run(max_cores, queue_capacity),
    }
}
