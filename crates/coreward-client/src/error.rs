//! Client-side error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] coreward_transport::TransportError),

    #[error("server answered with an unexpected message kind")]
    UnexpectedReply,

    #[error("seq_id regression: received {received} after {last}")]
    SeqIdRegression { last: u64, received: u64 },
}
