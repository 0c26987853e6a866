//! Typed accessors over opaque record data.
//!
//! Record bodies are stored as raw byte buffers; the semantic checks only
//! ever look at them through this module. Every accessor validates the
//! declared length before reading, so a malformed buffer surfaces as an
//! [`RdataError`] instead of an out-of-bounds read.

use crate::name::{Name, NameError};
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha384};
use std::fmt;

/// DS digest algorithm numbers (RFC 4509, RFC 5933, RFC 6605).
pub const DS_DIGEST_SHA1: u8 = 1;
pub const DS_DIGEST_SHA256: u8 = 2;
pub const DS_DIGEST_GOST: u8 = 3;
pub const DS_DIGEST_SHA384: u8 = 4;

/// NSEC3 hash algorithm (RFC 5155); SHA-1 is the only defined value.
pub const NSEC3_ALGORITHM_SHA1: u8 = 1;

/// One record body in wire form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rdata {
    bytes: Vec<u8>,
}

impl Rdata {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn octet(&self, at: usize) -> Result<u8, RdataError> {
        self.bytes.get(at).copied().ok_or(RdataError::Truncated {
            need: at + 1,
            have: self.bytes.len(),
        })
    }

    fn be16(&self, at: usize) -> Result<u16, RdataError> {
        Ok(u16::from_be_bytes([self.octet(at)?, self.octet(at + 1)?]))
    }

    /// The target name of an NS record.
    pub fn ns_target(&self) -> Result<Name, RdataError> {
        Ok(Name::from_wire(&self.bytes)?)
    }

    /// DS key tag (octets 0-1).
    pub fn ds_key_tag(&self) -> Result<u16, RdataError> {
        self.be16(0)
    }

    /// DS signing algorithm (octet 2).
    pub fn ds_algorithm(&self) -> Result<u8, RdataError> {
        self.octet(2)
    }

    /// DS digest type (octet 3).
    pub fn ds_digest_type(&self) -> Result<u8, RdataError> {
        self.octet(3)
    }

    /// DS digest length in octets.
    pub fn ds_digest_len(&self) -> Result<usize, RdataError> {
        if self.bytes.len() < 4 {
            return Err(RdataError::Truncated {
                need: 4,
                have: self.bytes.len(),
            });
        }
        Ok(self.bytes.len() - 4)
    }

    /// DNSKEY protocol field (octet 2); must be 3 per RFC 4034.
    pub fn dnskey_protocol(&self) -> Result<u8, RdataError> {
        self.octet(2)
    }

    /// DNSKEY signing algorithm (octet 3).
    pub fn dnskey_algorithm(&self) -> Result<u8, RdataError> {
        self.octet(3)
    }

    /// NSEC3PARAM hash algorithm (octet 0).
    pub fn nsec3param_algorithm(&self) -> Result<u8, RdataError> {
        self.octet(0)
    }

    /// NSEC3PARAM flags (octet 1).
    pub fn nsec3param_flags(&self) -> Result<u8, RdataError> {
        self.octet(1)
    }
}

impl fmt::Debug for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rdata(")?;
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// RFC 4034 Appendix B key tag arithmetic over a DNSKEY record body.
pub fn dnskey_key_tag(dnskey: &Rdata) -> u16 {
    let mut acc: u32 = 0;
    for (i, &byte) in dnskey.as_bytes().iter().enumerate() {
        if i & 1 == 1 {
            acc += u32::from(byte);
        } else {
            acc += u32::from(byte) << 8;
        }
    }
    acc += (acc >> 16) & 0xffff;
    (acc & 0xffff) as u16
}

/// Compute the DS record body for `dnskey` at `owner` with `digest_type`.
///
/// The digest covers the canonical owner name in wire form followed by
/// the DNSKEY record body (RFC 4034, Section 5.1.4). The key must at
/// least hold its fixed header for the algorithm field to exist.
pub fn dnskey_to_ds(owner: &Name, dnskey: &Rdata, digest_type: u8) -> Result<Rdata, RdataError> {
    let algorithm = dnskey.dnskey_algorithm()?;

    let mut input = owner.to_wire();
    input.extend_from_slice(dnskey.as_bytes());
    let digest = match digest_type {
        DS_DIGEST_SHA1 => Sha1::digest(&input).to_vec(),
        DS_DIGEST_SHA256 => Sha256::digest(&input).to_vec(),
        DS_DIGEST_SHA384 => Sha384::digest(&input).to_vec(),
        other => return Err(RdataError::UnsupportedDigest(other)),
    };

    let mut bytes = Vec::with_capacity(4 + digest.len());
    bytes.extend_from_slice(&dnskey_key_tag(dnskey).to_be_bytes());
    bytes.push(algorithm);
    bytes.push(digest_type);
    bytes.extend_from_slice(&digest);
    Ok(Rdata::new(bytes))
}

/// Decoding failures over record data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RdataError {
    #[error("record data truncated: need {need} octets, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("malformed name in record data: {0}")]
    Name(#[from] NameError),
    #[error("unsupported digest type {0}")]
    UnsupportedDigest(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dnskey_fixture() -> Rdata {
        // flags 257 (KSK), protocol 3, algorithm 13, arbitrary key material
        let mut bytes = vec![0x01, 0x01, 0x03, 0x0d];
        bytes.extend_from_slice(&hex::decode("deadbeefcafe0123").unwrap());
        Rdata::new(bytes)
    }

    #[test]
    fn ds_accessors() {
        let mut bytes = vec![0x30, 0x39, 0x0d, 0x02];
        bytes.extend_from_slice(&[0xab; 32]);
        let ds = Rdata::new(bytes);
        assert_eq!(ds.ds_key_tag().unwrap(), 12345);
        assert_eq!(ds.ds_algorithm().unwrap(), 13);
        assert_eq!(ds.ds_digest_type().unwrap(), DS_DIGEST_SHA256);
        assert_eq!(ds.ds_digest_len().unwrap(), 32);

        let short = Rdata::new(vec![0x30, 0x39, 0x0d]);
        assert_eq!(
            short.ds_digest_type(),
            Err(RdataError::Truncated { need: 4, have: 3 })
        );
    }

    #[test]
    fn key_tag_is_stable() {
        // The tag must not change between runs or depend on the owner.
        let key = dnskey_fixture();
        assert_eq!(dnskey_key_tag(&key), dnskey_key_tag(&key.clone()));
    }

    #[test]
    fn ds_computation_layout() {
        let owner: Name = "example.".parse().unwrap();
        let key = dnskey_fixture();

        let ds = dnskey_to_ds(&owner, &key, DS_DIGEST_SHA256).unwrap();
        assert_eq!(ds.ds_key_tag().unwrap(), dnskey_key_tag(&key));
        assert_eq!(ds.ds_algorithm().unwrap(), 13);
        assert_eq!(ds.ds_digest_type().unwrap(), DS_DIGEST_SHA256);
        assert_eq!(ds.ds_digest_len().unwrap(), 32);

        // Digest input is owner wire form followed by the key body.
        let mut input = owner.to_wire();
        input.extend_from_slice(key.as_bytes());
        assert_eq!(&ds.as_bytes()[4..], Sha256::digest(&input).as_slice());

        assert_eq!(
            dnskey_to_ds(&owner, &key, DS_DIGEST_SHA1)
                .unwrap()
                .ds_digest_len()
                .unwrap(),
            20
        );
        assert_eq!(
            dnskey_to_ds(&owner, &key, DS_DIGEST_SHA384)
                .unwrap()
                .ds_digest_len()
                .unwrap(),
            48
        );
        assert_eq!(
            dnskey_to_ds(&owner, &key, DS_DIGEST_GOST),
            Err(RdataError::UnsupportedDigest(DS_DIGEST_GOST))
        );
    }

    #[test]
    fn ns_target_parses_wire_name() {
        let rdata = Rdata::new(b"\x03ns1\x07example\x00".to_vec());
        assert_eq!(
            rdata.ns_target().unwrap(),
            "ns1.example.".parse::<Name>().unwrap()
        );
    }
}
