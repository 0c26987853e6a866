//! A DNS-over-QUIC client transport (RFC 9250).
//!
//! One [`client::DoqClient`] drives one QUIC connection over a blocking
//! UDP socket, carrying a single query/response exchange per
//! bidirectional stream. The QUIC protocol machine and the TLS stack are
//! external collaborators reached through the [`quic::QuicEngine`] and
//! [`tls::TlsSession`] seams.

#![warn(
    clippy::semicolon_if_nothing_returned,
    missing_copy_implementations,
    missing_debug_implementations,
    noop_method_call,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    variant_size_differences
)]

pub mod client;
pub mod error;
mod net;
pub mod quic;
pub mod stream;
pub mod tls;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::client::{ConnState, DoqClient, QuicParams};
pub use crate::error::NetError;

/// Largest UDP payload the client sends or accepts.
pub const MAX_PACKET_SIZE: usize = 4096;

/// ALPN identifiers offered during the handshake, in preference order.
pub const DOQ_ALPN: [&str; 4] = ["doq", "doq-i12", "doq-i11", "doq-i03"];

/// QUIC version 1 (RFC 9000).
pub const QUIC_PROTO_VER_V1: u32 = 0x0000_0001;

/// DoQ application error: no error (RFC 9250, Section 4.3).
pub const DOQ_NO_ERROR: u64 = 0x0;

/// DoQ application error: general protocol violation.
pub const DOQ_PROTOCOL_ERROR: u64 = 0x2;
