use thiserror::Error;

/// Errors raised while framing or decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame header named a `package_type` discriminant this build
    /// doesn't recognise. Treated as a logged-and-ignored protocol
    /// violation by the dispatcher, never as a crash.
    #[error("unknown message kind discriminant: {0}")]
    UnknownKind(u64),

    /// `postcard` failed to decode the payload bytes for an otherwise
    /// recognised kind.
    #[error("failed to decode payload: {0}")]
    Payload(#[from] postcard::Error),

    /// The frame's declared length does not leave enough bytes for the
    /// mandatory 8-byte kind header.
    #[error("frame too short: {len} bytes")]
    FrameTooShort { len: usize },
}

pub type WireResult<T> = Result<T, WireError>;
