//! Scripted doubles for the engine and TLS seams.
//!
//! The engine double interprets received datagrams as little command
//! frames, so a test peer socket can remote-control which callbacks fire
//! inside `read_pkt`, the way a real engine would surface peer activity.

use crate::error::NetError;
use crate::quic::{
    CallbackError, ConnectParams, EncryptionLevel, PacketInfo, Path, QuicEngine, QuicEvents,
    ReadError, StreamOpenError, StreamOpener, TransportSettings, WriteError, WriteOutcome,
};
use crate::tls::{TlsContext, TlsSession};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Command opcodes understood by [`ScriptedEngine::read_pkt`].
pub(crate) const CMD_CONFIRM: u8 = 1;
/// `[cmd, stream_id, payload...]`
pub(crate) const CMD_STREAM_DATA: u8 = 2;
/// `[cmd, stream_id, len_be16...]`
pub(crate) const CMD_ACK: u8 = 3;
/// `[cmd, stream_id]`
pub(crate) const CMD_STREAM_OPEN: u8 = 4;
/// `[cmd, stream_id, payload...]` — final data followed by stream close,
/// the way a FIN-carrying packet surfaces both callbacks in one read.
pub(crate) const CMD_STREAM_FIN: u8 = 5;
/// `[cmd, max_streams]`
pub(crate) const CMD_EXTEND_BIDI: u8 = 6;
pub(crate) const CMD_DROP_CONN: u8 = 7;
/// `[cmd, code]`
pub(crate) const CMD_FATAL: u8 = 8;

#[derive(Debug, Clone)]
pub(crate) struct Established {
    pub(crate) version: u32,
    pub(crate) scid: Vec<u8>,
    pub(crate) dcid: Vec<u8>,
    pub(crate) path: Path,
    pub(crate) settings: TransportSettings,
}

/// Observable state of the engine double, shared with the test body.
#[derive(Debug)]
pub(crate) struct EngineShared {
    pub(crate) established: Option<Established>,
    /// Pre-programmed `writev_stream` outcomes, served before defaults.
    pub(crate) write_script: VecDeque<Result<WriteOutcome, WriteError>>,
    /// Stream writes the client handed over, all with FIN.
    pub(crate) sent_frames: Vec<(i64, Vec<u8>)>,
    pub(crate) rx_keys: Vec<(EncryptionLevel, Vec<u8>)>,
    pub(crate) tx_keys: Vec<(EncryptionLevel, Vec<u8>)>,
    pub(crate) crypto_data: Vec<(EncryptionLevel, Vec<u8>)>,
    pub(crate) local_transport_params: Vec<u8>,
    pub(crate) peer_transport_params: Option<Vec<u8>>,
    pub(crate) stream_open_error: Option<StreamOpenError>,
    pub(crate) next_stream_id: i64,
    pub(crate) opened_streams: usize,
    pub(crate) max_ack_delay: Duration,
    pub(crate) tx_time_updates: usize,
}

impl Default for EngineShared {
    fn default() -> Self {
        Self {
            established: None,
            write_script: VecDeque::new(),
            sent_frames: Vec::new(),
            rx_keys: Vec::new(),
            tx_keys: Vec::new(),
            crypto_data: Vec::new(),
            local_transport_params: Vec::new(),
            peer_transport_params: None,
            stream_open_error: None,
            next_stream_id: 0,
            opened_streams: 0,
            max_ack_delay: Duration::from_millis(25),
            tx_time_updates: 0,
        }
    }
}

/// A command-driven [`QuicEngine`] double.
#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    shared: Rc<RefCell<EngineShared>>,
}

impl ScriptedEngine {
    /// Handle to the observable state, valid after the engine is boxed.
    pub(crate) fn shared(&self) -> Rc<RefCell<EngineShared>> {
        Rc::clone(&self.shared)
    }
}

impl StreamOpener for ScriptedEngine {
    fn open_bidi_stream(&mut self) -> Result<i64, StreamOpenError> {
        let mut shared = self.shared.borrow_mut();
        if let Some(error) = shared.stream_open_error {
            return Err(error);
        }
        let id = shared.next_stream_id;
        shared.next_stream_id += 4;
        shared.opened_streams += 1;
        Ok(id)
    }
}

impl QuicEngine for ScriptedEngine {
    fn establish(
        &mut self,
        params: &ConnectParams<'_>,
        _events: &mut dyn QuicEvents,
    ) -> Result<(), NetError> {
        self.shared.borrow_mut().established = Some(Established {
            version: params.version,
            scid: params.scid.to_vec(),
            dcid: params.dcid.to_vec(),
            path: params.path,
            settings: params.settings,
        });
        Ok(())
    }

    fn writev_stream(
        &mut self,
        _pi: &mut PacketInfo,
        stream: Option<i64>,
        data: &[&[u8]],
        pkt: &mut [u8],
        _now: Instant,
        _events: &mut dyn QuicEvents,
    ) -> Result<WriteOutcome, WriteError> {
        let mut shared = self.shared.borrow_mut();
        if let Some(step) = shared.write_script.pop_front() {
            if let Ok(WriteOutcome::Packet(len)) = step {
                pkt[..len].fill(0);
            }
            return step;
        }

        match stream {
            Some(id) if !data.is_empty() => {
                let mut payload = Vec::new();
                for chunk in data {
                    payload.extend_from_slice(chunk);
                }
                let len = payload.len().min(pkt.len());
                pkt[..len].copy_from_slice(&payload[..len]);
                shared.sent_frames.push((id, payload));
                Ok(WriteOutcome::Packet(len))
            }
            _ => Ok(WriteOutcome::Done),
        }
    }

    fn read_pkt(
        &mut self,
        _pi: PacketInfo,
        data: &[u8],
        _now: Instant,
        events: &mut dyn QuicEvents,
    ) -> Result<(), ReadError> {
        let failed = |_: CallbackError| ReadError::CallbackFailed;
        match data.first().copied() {
            Some(CMD_CONFIRM) => {
                events.handshake_confirmed();
                Ok(())
            }
            Some(CMD_STREAM_DATA) => {
                events
                    .recv_stream_data(i64::from(data[1]), &data[2..])
                    .map_err(failed)
            }
            Some(CMD_ACK) => {
                let len = u16::from_be_bytes([data[2], data[3]]);
                events.acked_stream_data_offset(i64::from(data[1]), u64::from(len));
                Ok(())
            }
            Some(CMD_STREAM_OPEN) => events.stream_open(i64::from(data[1])).map_err(failed),
            Some(CMD_STREAM_FIN) => {
                let id = i64::from(data[1]);
                events.recv_stream_data(id, &data[2..]).map_err(failed)?;
                events.stream_close(id);
                Ok(())
            }
            Some(CMD_EXTEND_BIDI) => {
                let max = u64::from(data[1]);
                events.extend_max_bidi_streams(max, self).map_err(failed)
            }
            Some(CMD_DROP_CONN) => Err(ReadError::DropConn),
            Some(CMD_FATAL) => Err(ReadError::Fatal {
                code: u64::from(data[1]),
            }),
            _ => Ok(()),
        }
    }

    fn submit_crypto_data(
        &mut self,
        level: EncryptionLevel,
        data: &[u8],
    ) -> Result<(), CallbackError> {
        self.shared
            .borrow_mut()
            .crypto_data
            .push((level, data.to_vec()));
        Ok(())
    }

    fn install_rx_key(
        &mut self,
        level: EncryptionLevel,
        secret: &[u8],
    ) -> Result<(), CallbackError> {
        self.shared
            .borrow_mut()
            .rx_keys
            .push((level, secret.to_vec()));
        Ok(())
    }

    fn install_tx_key(
        &mut self,
        level: EncryptionLevel,
        secret: &[u8],
    ) -> Result<(), CallbackError> {
        self.shared
            .borrow_mut()
            .tx_keys
            .push((level, secret.to_vec()));
        Ok(())
    }

    fn encode_transport_params(&self) -> Result<Vec<u8>, CallbackError> {
        Ok(self.shared.borrow().local_transport_params.clone())
    }

    fn apply_transport_params(&mut self, data: &[u8]) -> Result<(), CallbackError> {
        self.shared.borrow_mut().peer_transport_params = Some(data.to_vec());
        Ok(())
    }

    fn max_ack_delay(&self) -> Duration {
        self.shared.borrow().max_ack_delay
    }

    fn update_tx_time(&mut self, _now: Instant) {
        self.shared.borrow_mut().tx_time_updates += 1;
    }
}

/// A TLS session double that registers hooks successfully and that's it.
#[derive(Debug, Default)]
pub(crate) struct NullSession;

impl TlsSession for NullSession {
    fn enable_quic_hooks(&mut self) -> Result<(), NetError> {
        Ok(())
    }
}

pub(crate) fn test_tls(wait: Duration) -> TlsContext {
    TlsContext::new(Box::new(NullSession), wait)
}
