//! Server error types.

use coreward_types::{ClientId, CoreId, Pid};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised inside the scheduler core.
///
/// Protocol-violation variants are logged and swallowed by the
/// dispatcher; resource-invariant variants are fatal and unwind the
/// receive loop after a state dump; transport failures are always
/// fatal. Never exits the process from inside this crate — the CLI
/// binary decides the exit code.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A core was assigned to a client while still owned by another.
    #[error("core {core} already owned by {owner}, cannot assign to {claimant}")]
    CoreAlreadyOwned {
        core: CoreId,
        owner: ClientId,
        claimant: ClientId,
    },

    /// A release named a core the releasing client does not own.
    #[error("client {client} attempted to release core {core} it does not own")]
    ReleaseNotOwned { client: ClientId, core: CoreId },

    /// `CLIENT_INVADE`/`CLIENT_INVADE_NONBLOCKING` with a non-positive bound.
    #[error("invalid core constraints for pid {pid}: min={min_cpus}, max={max_cpus}")]
    InvalidConstraints {
        pid: Pid,
        min_cpus: u32,
        max_cpus: u32,
    },

    /// An outbound `seq_id` failed to strictly increase.
    #[error("seq_id regression: emitted {emitted} after {last}")]
    SeqIdRegression { last: u64, emitted: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] coreward_transport::TransportError),

    /// The dispatcher thread in [`crate::shell`] panicked instead of
    /// returning.
    #[error("dispatcher thread panicked")]
    DispatcherPanicked,
}
