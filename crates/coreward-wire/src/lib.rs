//! Binary wire protocol for the coreward core-arbitration service.
//!
//! This crate owns the typed message records ([`message`]) and the
//! length-prefixed framing ([`frame`]) used to put them on the local
//! transport. It has no opinion about *how* bytes move between processes
//! — see `coreward-transport` for that.

mod error;
mod frame;
mod message;

pub use error::{WireError, WireResult};
pub use frame::{FRAME_HEADER_SIZE, Frame, KIND_HEADER_SIZE};
pub use message::{
    ClientAckShutdown, ClientReinvadeAckNonblocking, ClientSetup, ClientShutdown, Invade,
    InvadeAnswer, Message, MessageKind, PidOnly, SERVER_MTYPE, ServerAck,
};
