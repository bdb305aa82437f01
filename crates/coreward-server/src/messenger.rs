//! Outbound message formatting.
//!
//! Owns the monotonic `seq_id` counter and builds the five
//! server→client message shapes. Does not touch the transport itself —
//! callers send the returned [`Message`] and decide the destination
//! `mtype`.

use coreward_types::{CoreId, Pid, SeqId};
use coreward_wire::{ClientAckShutdown, InvadeAnswer, Message, ServerAck};

pub struct Messenger {
    seq: u64,
}

impl Messenger {
    pub fn new() -> Self {
        Self { seq: 0 }
    }

    fn next_seq(&mut self) -> SeqId {
        self.seq += 1;
        SeqId(self.seq)
    }

    pub fn ack(&mut self) -> Message {
        Message::ServerAck(ServerAck { seq_id: self.next_seq() })
    }

    pub fn ack_shutdown(&mut self, sum_client_shutdown_hint: f64, sum_client_shutdown_hint_div_time: f64) -> Message {
        Message::ClientAckShutdown(ClientAckShutdown {
            seq_id: self.next_seq(),
            sum_client_shutdown_hint,
            sum_client_shutdown_hint_div_time,
        })
    }

    pub fn invade_answer(&mut self, pid: Pid, anything_changed: bool, affinity: Vec<CoreId>) -> Message {
        Message::ServerInvadeAnswer(InvadeAnswer {
            pid,
            seq_id: self.next_seq(),
            anything_changed,
            affinity,
        })
    }

    pub fn reinvade_nonblocking(&mut self, pid: Pid, anything_changed: bool, affinity: Vec<CoreId>) -> Message {
        Message::ServerReinvadeNonblocking(InvadeAnswer {
            pid,
            seq_id: self.next_seq(),
            anything_changed,
            affinity,
        })
    }

    pub fn quit(&mut self) -> Message {
        Message::ServerQuit(ServerAck { seq_id: self.next_seq() })
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

/// `mtype` a message addressed to `client` should be sent to.
pub fn mtype_for(pid: Pid) -> u32 {
    pid.get()
}
