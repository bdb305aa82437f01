//! Typed message records for every request/response the protocol defines.
//!
//! ## Inbound (client → server)
//! - [`ClientSetup`] — register a new client
//! - [`ClientShutdown`] — deregister, carrying a shutdown telemetry hint
//! - [`Invade`] — blocking or non-blocking resource request (same shape,
//!   distinguished by [`MessageKind::ClientInvade`] vs.
//!   [`MessageKind::ClientInvadeNonblocking`])
//! - [`ClientReinvadeAckNonblocking`] — client's answer to a server-proposed
//!   async reinvade
//! - [`PidOnly`] — `CLIENT_REINVADE` / `CLIENT_RETREAT`, which carry nothing
//!   but the sender's pid
//!
//! ## Outbound (server → client)
//! - [`ServerAck`] — plain acknowledgement (`CLIENT_SETUP`, `CLIENT_RETREAT`),
//!   also reused as `SERVER_QUIT`'s payload since both carry nothing but a
//!   `seq_id`
//! - [`ClientAckShutdown`] — aggregated shutdown telemetry
//! - [`InvadeAnswer`] — blocking answer or async proposal (same shape,
//!   distinguished by [`MessageKind::ServerInvadeAnswer`] vs.
//!   [`MessageKind::ServerReinvadeNonblocking`])

use coreward_types::{CoreId, Pid, SeqId};
use serde::{Deserialize, Serialize};

/// Discriminant written as the frame's 8-byte `package_type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u64)]
pub enum MessageKind {
    ClientSetup = 1,
    ServerAck = 2,
    ClientShutdown = 3,
    ClientAckShutdown = 4,
    ClientInvade = 5,
    ClientInvadeNonblocking = 6,
    ServerInvadeAnswer = 7,
    ServerReinvadeNonblocking = 8,
    ClientReinvadeAckNonblocking = 9,
    ClientReinvade = 10,
    ClientRetreat = 11,
    ClientServerShutdown = 12,
    ServerQuit = 13,
}

impl MessageKind {
    pub fn from_u64(raw: u64) -> Option<Self> {
        Some(match raw {
            1 => Self::ClientSetup,
            2 => Self::ServerAck,
            3 => Self::ClientShutdown,
            4 => Self::ClientAckShutdown,
            5 => Self::ClientInvade,
            6 => Self::ClientInvadeNonblocking,
            7 => Self::ServerInvadeAnswer,
            8 => Self::ServerReinvadeNonblocking,
            9 => Self::ClientReinvadeAckNonblocking,
            10 => Self::ClientReinvade,
            11 => Self::ClientRetreat,
            12 => Self::ClientServerShutdown,
            13 => Self::ServerQuit,
            _ => return None,
        })
    }
}

/// `mtype` routing key: server→client frames address the client's `pid`;
/// client→server frames always use the reserved server address `1`.
pub const SERVER_MTYPE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSetup {
    pub pid: Pid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAck {
    pub seq_id: SeqId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientShutdown {
    pub pid: Pid,
    pub client_shutdown_hint: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientAckShutdown {
    pub seq_id: SeqId,
    pub sum_client_shutdown_hint: f64,
    pub sum_client_shutdown_hint_div_time: f64,
}

/// Payload shared by `CLIENT_INVADE` and `CLIENT_INVADE_NONBLOCKING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invade {
    pub pid: Pid,
    pub min_cpus: u32,
    pub max_cpus: u32,
    pub distribution_hint: f64,
    pub scalability_graph: Vec<f64>,
}

/// Payload shared by `SERVER_INVADE_ANSWER` and `SERVER_REINVADE_NONBLOCKING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvadeAnswer {
    pub pid: Pid,
    pub seq_id: SeqId,
    pub anything_changed: bool,
    pub affinity: Vec<CoreId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientReinvadeAckNonblocking {
    pub pid: Pid,
    pub affinity: Vec<CoreId>,
}

/// Payload shared by `CLIENT_REINVADE`, `CLIENT_RETREAT`, and
/// `CLIENT_SERVER_SHUTDOWN` (which carries an unused pid of `0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidOnly {
    pub pid: Pid,
}

/// A fully-typed, decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    ClientSetup(ClientSetup),
    ServerAck(ServerAck),
    ClientShutdown(ClientShutdown),
    ClientAckShutdown(ClientAckShutdown),
    ClientInvade(Invade),
    ClientInvadeNonblocking(Invade),
    ServerInvadeAnswer(InvadeAnswer),
    ServerReinvadeNonblocking(InvadeAnswer),
    ClientReinvadeAckNonblocking(ClientReinvadeAckNonblocking),
    ClientReinvade(PidOnly),
    ClientRetreat(PidOnly),
    ClientServerShutdown,
    ServerQuit(ServerAck),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ClientSetup(_) => MessageKind::ClientSetup,
            Self::ServerAck(_) => MessageKind::ServerAck,
            Self::ClientShutdown(_) => MessageKind::ClientShutdown,
            Self::ClientAckShutdown(_) => MessageKind::ClientAckShutdown,
            Self::ClientInvade(_) => MessageKind::ClientInvade,
            Self::ClientInvadeNonblocking(_) => MessageKind::ClientInvadeNonblocking,
            Self::ServerInvadeAnswer(_) => MessageKind::ServerInvadeAnswer,
            Self::ServerReinvadeNonblocking(_) => MessageKind::ServerReinvadeNonblocking,
            Self::ClientReinvadeAckNonblocking(_) => MessageKind::ClientReinvadeAckNonblocking,
            Self::ClientReinvade(_) => MessageKind::ClientReinvade,
            Self::ClientRetreat(_) => MessageKind::ClientRetreat,
            Self::ClientServerShutdown => MessageKind::ClientServerShutdown,
            Self::ServerQuit(_) => MessageKind::ServerQuit,
        }
    }

    /// The pid this message concerns, when it names one.
    ///
    /// Used by the transport to pick the `mtype` routing key for
    /// server→client sends; inbound client→server messages always route
    /// to [`SERVER_MTYPE`] regardless of this value.
    pub fn pid(&self) -> Option<Pid> {
        match self {
            Self::ClientSetup(m) => Some(m.pid),
            Self::ClientShutdown(m) => Some(m.pid),
            Self::ClientInvade(m) | Self::ClientInvadeNonblocking(m) => Some(m.pid),
            Self::ServerInvadeAnswer(m) | Self::ServerReinvadeNonblocking(m) => Some(m.pid),
            Self::ClientReinvadeAckNonblocking(m) => Some(m.pid),
            Self::ClientReinvade(m) | Self::ClientRetreat(m) => Some(m.pid),
            Self::ServerAck(_)
            | Self::ClientAckShutdown(_)
            | Self::ClientServerShutdown
            | Self::ServerQuit(_) => None,
        }
    }

    pub fn is_server_to_client(&self) -> bool {
        matches!(
            self,
            Self::ServerAck(_)
                | Self::ClientAckShutdown(_)
                | Self::ServerInvadeAnswer(_)
                | Self::ServerReinvadeNonblocking(_)
                | Self::ServerQuit(_)
        )
    }
}
