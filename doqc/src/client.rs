//! The DoQ client connection and its blocking driver loops.

use crate::error::NetError;
use crate::net;
use crate::quic::{
    CallbackError, CloseInfo, ConnectParams, NewConnectionId, PacketInfo, Path, QuicEngine,
    QuicEvents, ReadError, StreamOpenError, StreamOpener, TransportSettings, WriteError,
    WriteOutcome,
};
use crate::stream::Stream;
use crate::tls::TlsContext;
use crate::{DOQ_NO_ERROR, DOQ_PROTOCOL_ERROR, MAX_PACKET_SIZE, QUIC_PROTO_VER_V1};
use rand::rngs::OsRng;
use rand::RngCore as _;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

/// DNS-over-QUIC knob embedded in the outer configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct QuicParams {
    /// Whether queries go over QUIC at all.
    pub enable: bool,
}

/// Connection lifecycle; it only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Opening,
    Connected,
    Closed,
}

/// Connection-side state the engine delivers callbacks into.
pub struct ClientState {
    state: ConnState,
    stream: Stream,
    /// Seed for stateless-reset tokens tied to new connection IDs.
    secret: [u8; 32],
    last_error: CloseInfo,
    /// Refreshed whenever stream data arrives; drives the wait deadline.
    last_activity: Instant,
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientState")
            .field("state", &self.state)
            .field("stream", &self.stream)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl QuicEvents for ClientState {
    fn handshake_confirmed(&mut self) {
        log::debug!("QUIC handshake confirmed");
        self.state = ConnState::Connected;
    }

    fn stream_open(&mut self, stream_id: i64) -> Result<(), CallbackError> {
        // Only client-initiated bidirectional streams are legal in DoQ.
        if stream_id % 4 != 0 {
            self.last_error =
                CloseInfo::application(DOQ_PROTOCOL_ERROR, b"Server can't open streams.");
            return Err(CallbackError);
        }
        Ok(())
    }

    fn recv_stream_data(&mut self, stream_id: i64, data: &[u8]) -> Result<(), CallbackError> {
        if self.stream.id != Some(stream_id) {
            return Ok(());
        }
        self.stream.rx.push(data);
        self.last_activity = Instant::now();
        Ok(())
    }

    fn acked_stream_data_offset(&mut self, stream_id: i64, datalen: u64) {
        if self.stream.id == Some(stream_id) {
            self.stream.bytes_in_flight = self.stream.bytes_in_flight.saturating_sub(datalen);
        }
    }

    fn stream_close(&mut self, stream_id: i64) {
        if self.stream.id == Some(stream_id) {
            self.stream.id = None;
        }
    }

    fn extend_max_bidi_streams(
        &mut self,
        max_streams: u64,
        streams: &mut dyn StreamOpener,
    ) -> Result<(), CallbackError> {
        if max_streams == 0 || self.stream.id.is_some() {
            return Ok(());
        }
        match streams.open_bidi_stream() {
            Ok(id) => {
                self.stream.id = Some(id);
                Ok(())
            }
            Err(_) => Err(CallbackError),
        }
    }

    fn rand(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }

    fn new_connection_id(&mut self, cid_len: usize) -> Result<NewConnectionId, CallbackError> {
        let mut cid = vec![0u8; cid_len];
        OsRng.fill_bytes(&mut cid);
        let reset_token = reset_token(&self.secret, &cid);
        Ok(NewConnectionId { cid, reset_token })
    }
}

/// Stateless-reset token bound to `cid` through the connection secret.
fn reset_token(secret: &[u8; 32], cid: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(cid);
    let digest = hasher.finalize();
    let mut token = [0u8; 16];
    token.copy_from_slice(&digest[..16]);
    token
}

/// SHA-256 over 16 fresh random octets.
fn generate_secret() -> [u8; 32] {
    let mut seed = [0u8; 16];
    OsRng.fill_bytes(&mut seed);
    Sha256::digest(seed).into()
}

/// A single DNS-over-QUIC client connection.
///
/// All operations block until done or until `wait` (from the TLS
/// context) has elapsed without connection activity.
pub struct DoqClient {
    engine: Box<dyn QuicEngine>,
    tls: TlsContext,
    params: QuicParams,
    state: ClientState,
    pi: PacketInfo,
    socket: Option<UdpSocket>,
    remote: Option<SocketAddr>,
}

impl fmt::Debug for DoqClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoqClient")
            .field("params", &self.params)
            .field("state", &self.state)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl DoqClient {
    /// Prepare a client over `engine` and `tls`; no I/O happens yet.
    pub fn new(engine: Box<dyn QuicEngine>, tls: TlsContext, params: &QuicParams) -> Self {
        Self {
            engine,
            tls,
            params: *params,
            state: ClientState {
                state: ConnState::Opening,
                stream: Stream::default(),
                secret: generate_secret(),
                last_error: CloseInfo::application(DOQ_NO_ERROR, b""),
                last_activity: Instant::now(),
            },
            pi: PacketInfo::default(),
            socket: None,
            remote: None,
        }
    }

    /// Whether the configuration enables DNS-over-QUIC.
    pub fn enabled(&self) -> bool {
        self.params.enable
    }

    pub fn state(&self) -> ConnState {
        self.state.state
    }

    /// The most recently recorded connection close, for diagnostics.
    pub fn last_error(&self) -> &CloseInfo {
        &self.state.last_error
    }

    /// Octets written to the query stream and not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.state.stream.bytes_in_flight
    }

    #[cfg(test)]
    fn stream_id(&self) -> Option<i64> {
        self.state.stream.id
    }

    /// Connect the socket and drive the handshake until confirmed.
    pub fn connect(&mut self, socket: UdpSocket, remote: SocketAddr) -> Result<(), NetError> {
        if self.state.state != ConnState::Opening {
            return Err(NetError::Invalid);
        }
        socket.connect(remote).map_err(|_| NetError::Connect)?;
        net::enable_ecn_rx(&socket, &remote)?;
        let local = socket.local_addr().map_err(|_| NetError::Connect)?;

        let mut scid = [0u8; 17];
        OsRng.fill_bytes(&mut scid);
        let mut dcid = [0u8; 18];
        OsRng.fill_bytes(&mut dcid);

        let params = ConnectParams {
            version: QUIC_PROTO_VER_V1,
            scid: &scid,
            dcid: &dcid,
            path: Path { local, remote },
            settings: TransportSettings {
                initial_max_streams_uni: 0,
                initial_max_streams_bidi: 0,
                initial_max_stream_data_bidi_local: MAX_PACKET_SIZE as u64,
                initial_max_data: MAX_PACKET_SIZE as u64,
            },
            now: Instant::now(),
        };
        self.engine.establish(&params, &mut self.state)?;
        self.tls.session.enable_quic_hooks()?;

        self.socket = Some(socket);
        self.remote = Some(remote);

        log::debug!("connecting to {remote} over QUIC");
        while self.state.state != ConnState::Connected {
            self.check_deadline()?;
            self.send_pending()?;
            let timeout = self.engine.max_ack_delay();
            if !net::poll_readable(self.socket()?, timeout)? {
                continue;
            }
            self.recv_pkt()?;
        }
        Ok(())
    }

    /// Send one DNS message, length-prefixed, finishing the stream.
    pub fn send_query(&mut self, message: &[u8]) -> Result<(), NetError> {
        if self.state.state != ConnState::Connected {
            return Err(NetError::Invalid);
        }
        if message.len() > usize::from(u16::MAX) {
            return Err(NetError::Invalid);
        }
        self.open_stream()?;

        let prefix = (message.len() as u16).to_be_bytes();
        let mut data: Vec<&[u8]> = vec![&prefix, message];
        self.state.stream.bytes_in_flight += message.len() as u64 + 2;

        log::debug!("sending {} octet query", message.len());
        while self.state.stream.bytes_in_flight > 0 {
            self.check_deadline()?;
            self.send_data(&mut data)?;
            data.clear();
            let timeout = self.engine.max_ack_delay();
            if !net::poll_readable(self.socket()?, timeout)? {
                continue;
            }
            self.recv_pkt()?;
        }
        Ok(())
    }

    /// Receive one DNS response into `buf`, returning its length.
    pub fn recv_response(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        if self.state.state != ConnState::Connected {
            return Err(NetError::Invalid);
        }
        if let Some(len) = self.copy_response(buf)? {
            return Ok(len);
        }

        while self.state.last_activity.elapsed() < self.tls.wait {
            let timeout = self.engine.max_ack_delay();
            if net::poll_readable(self.socket()?, timeout)? {
                self.recv_pkt()?;
                if let Some(len) = self.copy_response(buf)? {
                    return Ok(len);
                }
            }
            self.send_pending()?;
        }
        Err(NetError::Timeout)
    }

    /// Terminally close the connection.
    pub fn close(&mut self) {
        log::debug!("closing QUIC connection");
        self.state.state = ConnState::Closed;
    }

    fn socket(&self) -> Result<&UdpSocket, NetError> {
        self.socket.as_ref().ok_or(NetError::Invalid)
    }

    fn check_deadline(&self) -> Result<(), NetError> {
        if self.state.last_activity.elapsed() >= self.tls.wait {
            return Err(NetError::Timeout);
        }
        Ok(())
    }

    fn open_stream(&mut self) -> Result<(), NetError> {
        if self.state.stream.id.is_some() {
            return Ok(());
        }
        match self.engine.open_bidi_stream() {
            Ok(id) => {
                self.state.stream.id = Some(id);
                Ok(())
            }
            Err(StreamOpenError::Blocked) => Err(NetError::StreamBusy),
            Err(StreamOpenError::NoMemory) => Err(NetError::OutOfMemory),
        }
    }

    /// Flush engine-internal data without offering new stream payload.
    fn send_pending(&mut self) -> Result<(), NetError> {
        let mut no_data: Vec<&[u8]> = Vec::new();
        self.send_data(&mut no_data)
    }

    /// Produce and send datagrams until the engine has nothing left.
    ///
    /// `data` is offered to the stream (with FIN) on the first packet and
    /// cleared; the engine owns it from then on.
    fn send_data(&mut self, data: &mut Vec<&[u8]>) -> Result<(), NetError> {
        let socket = self.socket.as_ref().ok_or(NetError::Invalid)?;
        let remote = self.remote.ok_or(NetError::Invalid)?;
        let mut pkt = [0u8; MAX_PACKET_SIZE];

        loop {
            let now = Instant::now();
            let stream = if data.is_empty() {
                None
            } else {
                self.state.stream.id
            };

            match self.engine.writev_stream(
                &mut self.pi,
                stream,
                data.as_slice(),
                &mut pkt,
                now,
                &mut self.state,
            ) {
                Ok(WriteOutcome::Packet(len)) => {
                    data.clear();
                    net::set_ecn(socket, &remote, self.pi.ecn)?;
                    net::send_dgram(socket, &pkt[..len])?;
                }
                Ok(WriteOutcome::Done) => {
                    self.engine.update_tx_time(now);
                    return Ok(());
                }
                // Let the receive path unblock the stream.
                Err(WriteError::StreamDataBlocked) => return Ok(()),
                Err(WriteError::NoMemory) => return Err(NetError::OutOfMemory),
                Err(WriteError::WriteMore) => {
                    debug_assert!(false, "write-more without batched writes");
                    continue;
                }
                Err(WriteError::StreamShutWr { code }) => {
                    self.state.stream.id = None;
                    self.state.last_error = CloseInfo::transport(code);
                    return Err(NetError::Send);
                }
                Err(WriteError::Fatal { code }) => {
                    self.state.last_error = CloseInfo::transport(code);
                    return Err(NetError::Send);
                }
            }
        }
    }

    /// Receive one datagram and feed it to the engine.
    fn recv_pkt(&mut self) -> Result<(), NetError> {
        let socket = self.socket.as_ref().ok_or(NetError::Invalid)?;
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let (len, ecn) = net::recv_dgram(socket, &mut buf)?;
        self.pi.ecn = ecn;

        match self
            .engine
            .read_pkt(self.pi, &buf[..len], Instant::now(), &mut self.state)
        {
            Ok(()) => Ok(()),
            Err(ReadError::DropConn) => {
                self.state.state = ConnState::Closed;
                Err(NetError::Recv)
            }
            Err(ReadError::Fatal { code }) => {
                self.state.last_error = CloseInfo::transport(code);
                Err(NetError::Recv)
            }
            Err(ReadError::CallbackFailed) => Err(NetError::Recv),
        }
    }

    /// Hand out the oldest completed response, if any.
    fn copy_response(&mut self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        let message = match self.state.stream.rx.front() {
            Some(message) => message,
            None => return Ok(None),
        };
        if buf.len() < message.len() {
            return Err(NetError::OutOfMemory);
        }
        let len = message.len();
        buf[..len].copy_from_slice(message);
        self.state.stream.rx.pop();
        Ok(Some(len))
    }
}
