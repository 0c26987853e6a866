//! The seam to the QUIC protocol engine.
//!
//! The engine is an external library. Its C-style callback vtable is
//! re-expressed as two traits: [`QuicEngine`] for the operations the
//! driver invokes, and [`QuicEvents`] for the callbacks the engine
//! delivers synchronously while processing packets. Stream opening is
//! split into the [`StreamOpener`] capability so event handlers can open
//! the client stream re-entrantly from inside an engine call.

use crate::error::NetError;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// QUIC CRYPTO_ERROR base code (RFC 9001, Section 4.8); TLS alerts are
/// reported as `CRYPTO_ERROR | alert`.
pub const CRYPTO_ERROR: u64 = 0x100;

/// ECN codepoint of a datagram, the two low bits of TOS/TCLASS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ecn(pub u8);

/// Per-packet metadata exchanged with the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketInfo {
    pub ecn: Ecn,
}

/// The UDP 4-tuple the connection runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Path {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

/// Encryption levels TLS keys are installed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionLevel {
    Initial,
    EarlyData,
    Handshake,
    Application,
}

/// Transport parameters the client opens a connection with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub initial_max_streams_uni: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_stream_data_bidi_local: u64,
    pub initial_max_data: u64,
}

/// Everything the engine needs to start a client connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    pub version: u32,
    pub scid: &'a [u8],
    pub dcid: &'a [u8],
    pub path: Path,
    pub settings: TransportSettings,
    pub now: Instant,
}

/// Result of one `writev_stream` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A datagram of this many octets was produced into the packet buffer.
    Packet(usize),
    /// Nothing to send right now; pacing state should be updated.
    Done,
}

/// Failed `writev_stream` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Stream flow control stops the data; receiving may unblock it.
    #[error("stream data blocked")]
    StreamDataBlocked,
    #[error("engine out of memory")]
    NoMemory,
    /// The engine wants another write before producing a packet. Not
    /// expected without write-more batching.
    #[error("engine expects more data")]
    WriteMore,
    /// The send side of the stream is already shut down.
    #[error("stream shut for writing (transport error {code:#x})")]
    StreamShutWr { code: u64 },
    /// Any other engine failure, with the inferred transport error code.
    #[error("fatal engine error (transport error {code:#x})")]
    Fatal { code: u64 },
}

/// Failed `read_pkt` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The packet requires dropping the whole connection.
    #[error("connection must be dropped")]
    DropConn,
    /// A fatal engine failure, with the inferred transport error code.
    #[error("fatal engine error (transport error {code:#x})")]
    Fatal { code: u64 },
    /// An event handler rejected the packet.
    #[error("event handler failed")]
    CallbackFailed,
}

/// Failures of `open_bidi_stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamOpenError {
    /// The peer's stream limit does not admit another stream yet.
    #[error("stream id space exhausted")]
    Blocked,
    #[error("engine out of memory")]
    NoMemory,
}

/// Returned by event handlers to abort the engine call that fired them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("callback failed")]
pub struct CallbackError;

/// A connection ID and the stateless-reset token tied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionId {
    pub cid: Vec<u8>,
    pub reset_token: [u8; 16],
}

/// Recorded close information for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub kind: CloseKind,
    pub code: u64,
    pub reason: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Application,
    Transport,
}

impl CloseInfo {
    pub fn application(code: u64, reason: &[u8]) -> Self {
        Self {
            kind: CloseKind::Application,
            code,
            reason: reason.to_vec(),
        }
    }

    pub fn transport(code: u64) -> Self {
        Self {
            kind: CloseKind::Transport,
            code,
            reason: Vec::new(),
        }
    }
}

/// Stream-opening capability handed to event handlers.
pub trait StreamOpener {
    /// Open the next client-initiated bidirectional stream.
    fn open_bidi_stream(&mut self) -> Result<i64, StreamOpenError>;
}

/// The QUIC protocol engine driving one client connection.
///
/// Methods that process or produce packets receive the client's
/// [`QuicEvents`] so the engine can deliver callbacks while it works.
pub trait QuicEngine: StreamOpener {
    /// Create the client connection state from the initial parameters.
    fn establish(
        &mut self,
        params: &ConnectParams<'_>,
        events: &mut dyn QuicEvents,
    ) -> Result<(), NetError>;

    /// Produce the next outgoing datagram into `pkt`.
    ///
    /// When `stream` is set, `data` is appended to that stream and the
    /// stream is finished (FIN) once fully written.
    fn writev_stream(
        &mut self,
        pi: &mut PacketInfo,
        stream: Option<i64>,
        data: &[&[u8]],
        pkt: &mut [u8],
        now: Instant,
        events: &mut dyn QuicEvents,
    ) -> Result<WriteOutcome, WriteError>;

    /// Feed one received datagram to the connection.
    fn read_pkt(
        &mut self,
        pi: PacketInfo,
        data: &[u8],
        now: Instant,
        events: &mut dyn QuicEvents,
    ) -> Result<(), ReadError>;

    /// Submit TLS handshake bytes as CRYPTO frames at `level`.
    fn submit_crypto_data(&mut self, level: EncryptionLevel, data: &[u8])
        -> Result<(), CallbackError>;

    /// Install the RX half of a freshly derived traffic secret.
    fn install_rx_key(&mut self, level: EncryptionLevel, secret: &[u8])
        -> Result<(), CallbackError>;

    /// Install the TX half of a freshly derived traffic secret.
    fn install_tx_key(&mut self, level: EncryptionLevel, secret: &[u8])
        -> Result<(), CallbackError>;

    /// Encode the local transport parameters for the TLS extension.
    fn encode_transport_params(&self) -> Result<Vec<u8>, CallbackError>;

    /// Decode and install the peer's transport parameters.
    fn apply_transport_params(&mut self, data: &[u8]) -> Result<(), CallbackError>;

    /// The peer's advertised `max_ack_delay`; drives the poll timeout.
    fn max_ack_delay(&self) -> Duration;

    /// Tell the engine when produced packets were handed to the socket.
    fn update_tx_time(&mut self, now: Instant);
}

/// Connection callbacks delivered synchronously by the engine.
pub trait QuicEvents {
    /// The handshake is confirmed; the connection is usable.
    fn handshake_confirmed(&mut self);

    /// The peer opened (or acknowledged) stream `stream_id`.
    fn stream_open(&mut self, stream_id: i64) -> Result<(), CallbackError>;

    /// Ordered stream payload arrived.
    fn recv_stream_data(&mut self, stream_id: i64, data: &[u8]) -> Result<(), CallbackError>;

    /// The peer acknowledged `datalen` octets of stream data.
    fn acked_stream_data_offset(&mut self, stream_id: i64, datalen: u64);

    /// The stream is fully closed.
    fn stream_close(&mut self, stream_id: i64);

    /// The peer raised the bidirectional stream limit.
    fn extend_max_bidi_streams(
        &mut self,
        max_streams: u64,
        streams: &mut dyn StreamOpener,
    ) -> Result<(), CallbackError>;

    /// Fill `dest` with unpredictable bytes.
    fn rand(&mut self, dest: &mut [u8]);

    /// Produce a fresh connection ID of `cid_len` octets and the
    /// stateless-reset token bound to it.
    fn new_connection_id(&mut self, cid_len: usize) -> Result<NewConnectionId, CallbackError>;
}
