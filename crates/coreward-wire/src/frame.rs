//! Length-prefixed framing for variable-length protocol records.
//!
//! Wire layout of one frame on the transport:
//!
//! ```text
//! +----------------+----------------+-----------------------+
//! | u32 frame_len  | u64 kind       | postcard-encoded body |
//! +----------------+----------------+-----------------------+
//!      4 bytes          8 bytes           frame_len - 8 bytes
//! ```
//!
//! `frame_len` counts everything after itself (the kind header plus the
//! body), matching `offsetof(affinity_array) + sizeof(int) *
//! number_of_cores` style variable-length accounting from the original
//! protocol description. No trailing flexible array members — the body
//! length is always implied by `frame_len`, never read past the end of
//! the frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{WireError, WireResult};
use crate::message::{Message, MessageKind};

/// Size of the `u32` length prefix that precedes every frame.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Size of the `u64` `package_type` discriminant at the start of every
/// frame body.
pub const KIND_HEADER_SIZE: usize = 8;

/// A decoded frame: the kind header plus its still-encoded payload.
#[derive(Debug, Clone)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Attempts to pull one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` doesn't yet contain a full frame — the
    /// caller should read more bytes from the transport and retry.
    pub fn decode(buf: &mut BytesMut) -> WireResult<Option<Frame>> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let len = u32::from_be_bytes(buf[..FRAME_HEADER_SIZE].try_into().expect("4 bytes")) as usize;
        if buf.len() < FRAME_HEADER_SIZE + len {
            return Ok(None);
        }
        buf.advance(FRAME_HEADER_SIZE);
        let body = buf.split_to(len).freeze();
        if body.len() < KIND_HEADER_SIZE {
            return Err(WireError::FrameTooShort { len: body.len() });
        }
        Ok(Some(Frame { bytes: body }))
    }

    /// Appends this frame's length-prefixed wire representation to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.bytes.len() as u32);
        buf.put_slice(&self.bytes);
    }

    fn kind_raw(&self) -> u64 {
        u64::from_be_bytes(self.bytes[..KIND_HEADER_SIZE].try_into().expect("8 bytes"))
    }

    fn payload(&self) -> &[u8] {
        &self.bytes[KIND_HEADER_SIZE..]
    }

    fn from_parts(kind: MessageKind, payload: &[u8]) -> WireResult<Frame> {
        let mut bytes = BytesMut::with_capacity(KIND_HEADER_SIZE + payload.len());
        bytes.put_u64(kind as u64);
        bytes.put_slice(payload);
        Ok(Frame {
            bytes: bytes.freeze(),
        })
    }
}

fn encode_body<T: Serialize>(value: &T) -> WireResult<Vec<u8>> {
    Ok(postcard::to_allocvec(value)?)
}

fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> WireResult<T> {
    Ok(postcard::from_bytes(bytes)?)
}

impl Message {
    /// Encodes this message into a standalone [`Frame`], ready to append
    /// to a connection's write buffer via [`Frame::encode`].
    pub fn to_frame(&self) -> WireResult<Frame> {
        use crate::message::*;

        let kind = self.kind();
        match self {
            Message::ClientSetup(m) => Frame::from_parts(kind, &encode_body(m)?),
            Message::ServerAck(m) => Frame::from_parts(kind, &encode_body(m)?),
            Message::ClientShutdown(m) => Frame::from_parts(kind, &encode_body(m)?),
            Message::ClientAckShutdown(m) => Frame::from_parts(kind, &encode_body(m)?),
            Message::ClientInvade(m) | Message::ClientInvadeNonblocking(m) => {
                Frame::from_parts(kind, &encode_body(m)?)
            }
            Message::ServerInvadeAnswer(m) | Message::ServerReinvadeNonblocking(m) => {
                Frame::from_parts(kind, &encode_body(m)?)
            }
            Message::ClientReinvadeAckNonblocking(m) => Frame::from_parts(kind, &encode_body(m)?),
            Message::ClientReinvade(m) | Message::ClientRetreat(m) => {
                Frame::from_parts(kind, &encode_body(m)?)
            }
            Message::ClientServerShutdown => Frame::from_parts(kind, &[]),
            Message::ServerQuit(m) => Frame::from_parts(kind, &encode_body(m)?),
        }
    }

    /// Decodes a [`Message`] from a frame previously produced by
    /// [`Message::to_frame`] (or read off the wire via [`Frame::decode`]).
    pub fn from_frame(frame: &Frame) -> WireResult<Message> {
        use crate::message::*;

        let raw = frame.kind_raw();
        let kind = MessageKind::from_u64(raw).ok_or(WireError::UnknownKind(raw))?;
        let body = frame.payload();

        Ok(match kind {
            MessageKind::ClientSetup => Message::ClientSetup(decode_body(body)?),
            MessageKind::ServerAck => Message::ServerAck(decode_body(body)?),
            MessageKind::ClientShutdown => Message::ClientShutdown(decode_body(body)?),
            MessageKind::ClientAckShutdown => Message::ClientAckShutdown(decode_body(body)?),
            MessageKind::ClientInvade => Message::ClientInvade(decode_body(body)?),
            MessageKind::ClientInvadeNonblocking => {
                Message::ClientInvadeNonblocking(decode_body(body)?)
            }
            MessageKind::ServerInvadeAnswer => Message::ServerInvadeAnswer(decode_body(body)?),
            MessageKind::ServerReinvadeNonblocking => {
                Message::ServerReinvadeNonblocking(decode_body(body)?)
            }
            MessageKind::ClientReinvadeAckNonblocking => {
                Message::ClientReinvadeAckNonblocking(decode_body(body)?)
            }
            MessageKind::ClientReinvade => Message::ClientReinvade(decode_body(body)?),
            MessageKind::ClientRetreat => Message::ClientRetreat(decode_body(body)?),
            MessageKind::ClientServerShutdown => Message::ClientServerShutdown,
            MessageKind::ServerQuit => Message::ServerQuit(decode_body(body)?),
        })
    }
}
