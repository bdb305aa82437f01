use thiserror::Error;

/// Errors raised while moving [`coreward_wire::Message`] values between
/// processes.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire framing error: {0}")]
    Wire(#[from] coreward_wire::WireError),

    /// `send_to` named an `mtype` with no registered inbox or socket path.
    #[error("no registered destination for mtype {0}")]
    UnknownDestination(u32),

    /// The destination's bounded mailbox is full; the caller is expected
    /// to back off rather than grow the queue unbounded.
    #[error("destination mailbox is full")]
    MailboxFull,

    /// The transport was closed while a caller was blocked in `recv_blocking`.
    #[error("transport closed")]
    Closed,
}

pub type TransportResult<T> = Result<T, TransportError>;
