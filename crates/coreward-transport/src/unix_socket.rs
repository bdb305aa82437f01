//! `UnixDatagram`-backed transport, rooted at a configurable directory.
//!
//! Every participant gets one socket file under the root directory: the
//! server always binds `<root>/server.sock`, and each client binds
//! `<root>/client-<pid>.sock`. A datagram preserves message boundaries,
//! so one `send_to`/`recv` pair always carries exactly one frame — no
//! partial-read bookkeeping is needed here, unlike a stream transport.

use std::fs;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use coreward_types::Pid;
use coreward_wire::{Frame, Message};

use crate::error::TransportResult;
use crate::{ClientTransport, ServerTransport};

/// Large enough for any frame this protocol produces: the widest payload
/// is a `scalability_graph` / `affinity` vector, both bounded by the
/// number of cores on the host.
const MAX_DATAGRAM: usize = 64 * 1024;

fn encode_datagram(msg: &Message) -> TransportResult<Vec<u8>> {
    let frame = msg.to_frame()?;
    let mut buf = BytesMut::new();
    frame.encode(&mut buf);
    Ok(buf.to_vec())
}

fn decode_datagram(bytes: &[u8]) -> TransportResult<Message> {
    let mut buf = BytesMut::from(bytes);
    let frame = Frame::decode(&mut buf)?.ok_or(coreward_wire::WireError::FrameTooShort {
        len: bytes.len(),
    })?;
    Ok(Message::from_frame(&frame)?)
}

fn client_socket_path(root: &Path, mtype: u32) -> PathBuf {
    root.join(format!("client-{mtype}.sock"))
}

fn bind_fresh(path: &Path) -> std::io::Result<UnixDatagram> {
    let _ = fs::remove_file(path);
    UnixDatagram::bind(path)
}

pub struct UnixServerTransport {
    socket: UnixDatagram,
    root: PathBuf,
    known: Vec<u32>,
}

impl UnixServerTransport {
    /// Binds the server socket at `<root>/server.sock`, creating `root`
    /// if it doesn't exist.
    pub fn bind(root: impl Into<PathBuf>) -> TransportResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let socket = bind_fresh(&root.join("server.sock"))?;
        Ok(Self { socket, root, known: Vec::new() })
    }

    /// Records that `pid` has a socket file under this transport's root,
    /// so future `send_to`/`broadcast` calls can address it and so
    /// `known_clients` reports it. Does not itself create the socket —
    /// the client process owns that.
    pub fn register_client_addr(&mut self, pid: Pid) {
        if !self.known.contains(&pid.get()) {
            self.known.push(pid.get());
        }
    }

    pub fn forget_client_addr(&mut self, pid: Pid) {
        self.known.retain(|&mtype| mtype != pid.get());
    }
}

impl ServerTransport for UnixServerTransport {
    fn recv_blocking(&mut self) -> TransportResult<Message> {
        let mut raw = vec![0u8; MAX_DATAGRAM];
        let n = self.socket.recv(&mut raw)?;
        decode_datagram(&raw[..n])
    }

    fn send_to(&mut self, mtype: u32, msg: &Message) -> TransportResult<()> {
        let bytes = encode_datagram(msg)?;
        self.socket.send_to(&bytes, client_socket_path(&self.root, mtype))?;
        Ok(())
    }

    fn known_clients(&self) -> Vec<u32> {
        self.known.clone()
    }
}

pub struct UnixClientTransport {
    socket: UnixDatagram,
    server_path: PathBuf,
}

impl UnixClientTransport {
    /// Binds this client's own socket at `<root>/client-<pid>.sock` and
    /// targets `<root>/server.sock` for outbound sends.
    pub fn connect(root: impl AsRef<Path>, pid: Pid) -> TransportResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let socket = bind_fresh(&client_socket_path(root, pid.get()))?;
        Ok(Self { socket, server_path: root.join("server.sock") })
    }
}

impl ClientTransport for UnixClientTransport {
    fn send_to_server(&mut self, msg: &Message) -> TransportResult<()> {
        let bytes = encode_datagram(msg)?;
        self.socket.send_to(&bytes, &self.server_path)?;
        Ok(())
    }

    fn recv_blocking(&mut self) -> TransportResult<Message> {
        let mut raw = vec![0u8; MAX_DATAGRAM];
        let n = self.socket.recv(&mut raw)?;
        decode_datagram(&raw[..n])
    }
}
