//! TLS 1.3 handshake glue for QUIC.
//!
//! The TLS stack is an external collaborator reached through
//! [`TlsSession`]. The four QUIC hooks it fires during the handshake are
//! implemented here as free functions over the engine and the client's
//! stream/close state, so a session integration only has to forward its
//! callbacks verbatim.

use crate::error::NetError;
use crate::quic::{CallbackError, CloseInfo, EncryptionLevel, QuicEngine, CRYPTO_ERROR};
use crate::stream::Stream;
use std::fmt;
use std::time::Duration;

/// TLS extension codepoint `quic_transport_parameters` (RFC 9001).
pub const TLS_EXT_QUIC_TRANSPORT_PARAMETERS_V1: u16 = 0x39;

/// Handshake message classes as the TLS stack reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMessage {
    /// Middlebox-compatibility ChangeCipherSpec; never carried in QUIC.
    ChangeCipherSpec,
    /// Any real handshake message, by its TLS handshake type.
    Other(u8),
}

/// The TLS session shared between the client and the TLS stack.
pub trait TlsSession {
    /// Register the QUIC hooks and the transport-parameters extension
    /// ([`TLS_EXT_QUIC_TRANSPORT_PARAMETERS_V1`]) on the session.
    fn enable_quic_hooks(&mut self) -> Result<(), NetError>;
}

/// Session handle plus the operation deadline.
pub struct TlsContext {
    pub session: Box<dyn TlsSession>,
    /// Wall-clock budget measured from the last connection activity.
    pub wait: Duration,
}

impl TlsContext {
    pub fn new(session: Box<dyn TlsSession>, wait: Duration) -> Self {
        Self { session, wait }
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

/// Install freshly derived traffic secrets into the engine.
///
/// Once the application-level RX secret lands the handshake is far
/// enough to open the client's bidirectional stream, unless the
/// stream-limit callback already did.
pub fn on_secrets(
    engine: &mut dyn QuicEngine,
    stream: &mut Stream,
    level: EncryptionLevel,
    rx_secret: Option<&[u8]>,
    tx_secret: Option<&[u8]>,
) -> Result<(), CallbackError> {
    if let Some(rx) = rx_secret {
        engine.install_rx_key(level, rx)?;
        if level == EncryptionLevel::Application && stream.id.is_none() {
            if let Ok(id) = engine.open_bidi_stream() {
                stream.id = Some(id);
            }
        }
    }
    if let Some(tx) = tx_secret {
        engine.install_tx_key(level, tx)?;
    }
    Ok(())
}

/// Forward handshake bytes as CRYPTO frames at the current level.
pub fn on_handshake_read(
    engine: &mut dyn QuicEngine,
    level: EncryptionLevel,
    message: HandshakeMessage,
    data: &[u8],
) -> Result<(), CallbackError> {
    if message == HandshakeMessage::ChangeCipherSpec {
        return Ok(());
    }
    engine.submit_crypto_data(level, data)
}

/// Record a fatal TLS alert as a transport close.
pub fn on_alert(last_error: &mut CloseInfo, alert: u8) {
    *last_error = CloseInfo::transport(CRYPTO_ERROR | u64::from(alert));
}

/// Append the local transport parameters to the extension payload.
pub fn on_transport_params_send(
    engine: &mut dyn QuicEngine,
    extension: &mut Vec<u8>,
) -> Result<(), CallbackError> {
    let encoded = engine.encode_transport_params()?;
    extension.extend_from_slice(&encoded);
    Ok(())
}

/// Decode and install the peer's transport parameters.
pub fn on_transport_params_recv(
    engine: &mut dyn QuicEngine,
    data: &[u8],
) -> Result<(), CallbackError> {
    engine.apply_transport_params(data)
}
