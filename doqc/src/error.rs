//! Runtime errors of the DoQ client.

/// Everything a client operation can fail with.
///
/// Syscall failures are folded into the operation they interrupted
/// (connect, send or receive); the specific close reason, if any, is
/// recorded on the connection's last-error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    /// Invalid parameter or operation in the current connection state.
    #[error("invalid parameter")]
    Invalid,
    #[error("out of memory")]
    OutOfMemory,
    #[error("failed to connect")]
    Connect,
    #[error("failed to send data")]
    Send,
    #[error("failed to receive data")]
    Recv,
    #[error("connection timed out")]
    Timeout,
    /// Opening a new stream is blocked by the peer's stream limit.
    #[error("stream is busy")]
    StreamBusy,
    #[error("unsupported address family")]
    UnsupportedFamily,
}
