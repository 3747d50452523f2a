//! TCP transport for one peer: dial-or-listen by `Mode`, frame-aligned
//! receive, full-write send.

use crate::config::PeerConfig;
use crate::PeerError;
use log::{
    debug,
    info,
};
use octavius_bgp_common::Mode;
use octavius_bgp_wire::{
    peek_message_length,
    BgpMessage,
};
use std::net::{
    Ipv4Addr,
    SocketAddr,
};
use tokio::{
    io::{
        AsyncReadExt,
        AsyncWriteExt,
    },
    net::{
        TcpListener,
        TcpStream,
    },
};

/// BGP is fixed to port 179 (RFC 4271 section 8).
pub const BGP_PORT: u16 = 179;

/// Owns the TCP socket and an append-only receive buffer. `recv` carves one
/// full message off the front of the buffer at a time; anything left over
/// (the start of the next message) stays buffered for the next call.
pub struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl Connection {
    /// Opens the TCP session per `config.mode`: dials the remote in
    /// `Active` mode, or binds and accepts exactly one connection in
    /// `Passive` mode.
    pub async fn open(config: &PeerConfig) -> Result<Self, PeerError> {
        let stream = match config.mode {
            Mode::Active => dial(config.local_ip, config.remote_ip).await?,
            Mode::Passive => accept_one(config.local_ip).await?,
        };
        Ok(Self { stream, buffer: Vec::new() })
    }

    /// Writes `message`'s encoded bytes to the socket, retrying a short
    /// write until the whole frame is sent.
    pub async fn send(&mut self, message: &BgpMessage) -> Result<(), PeerError> {
        let bytes = message.pack();
        self.stream.write_all(&bytes).await.map_err(PeerError::Io)?;
        Ok(())
    }

    /// Reads from the socket until one full BGP message is buffered, then
    /// decodes and returns it, leaving any trailing bytes buffered.
    pub async fn recv(&mut self) -> Result<BgpMessage, PeerError> {
        loop {
            if let Some(length) = peek_message_length(&self.buffer) {
                let length = length as usize;
                if self.buffer.len() >= length {
                    let frame = self.buffer[..length].to_vec();
                    self.buffer.drain(..length);
                    let (message, rest) = BgpMessage::unpack(&frame).map_err(PeerError::Wire)?;
                    debug_assert!(rest.is_empty(), "unpack must consume the full frame carved off by recv");
                    return Ok(message);
                }
            }

            let mut chunk = [0u8; 4096];
            let read = self.stream.read(&mut chunk).await.map_err(PeerError::Io)?;
            if read == 0 {
                return Err(PeerError::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed the connection")));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

async fn dial(local_ip: Ipv4Addr, remote_ip: Ipv4Addr) -> Result<TcpStream, PeerError> {
    let remote = SocketAddr::from((remote_ip, BGP_PORT));
    let socket = tokio::net::TcpSocket::new_v4().map_err(PeerError::Io)?;
    socket.bind(SocketAddr::from((local_ip, BGP_PORT))).map_err(PeerError::Io)?;
    info!("Connecting to {remote} from {local_ip}");
    let stream = socket.connect(remote).await.map_err(PeerError::Io)?;
    debug!("Connected to {remote}");
    Ok(stream)
}

async fn accept_one(local_ip: Ipv4Addr) -> Result<TcpStream, PeerError> {
    let local = SocketAddr::from((local_ip, BGP_PORT));
    let listener = TcpListener::bind(local).await.map_err(PeerError::Io)?;
    info!("Listening on {local} for one incoming BGP connection");
    let (stream, remote) = listener.accept().await.map_err(PeerError::Io)?;
    debug!("Accepted connection from {remote}");
    Ok(stream)
}
