//! Shared identifier newtypes used across the coreward workspace.
//!
//! Kept in their own crate so that the wire codec, the transport, the
//! scheduler core, and the sample clients all agree on one definition of
//! "what a pid is" without depending on each other.

mod ids;

pub use ids::{ClientId, CoreId, Pid, SeqId};
