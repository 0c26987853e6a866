//! Domain names in wire form with canonical ordering.

use std::fmt;
use std::str::FromStr;

const MAX_LABEL_LEN: usize = 63;
const MAX_WIRE_LEN: usize = 255;

/// A fully qualified domain name.
///
/// Labels are stored lowercased, without the terminating root label.
/// The [`Ord`] implementation is the canonical DNS ordering (RFC 4034,
/// Section 6.1): names are compared by their labels right to left, so a
/// parent always sorts before all names below it. Iterating a sorted
/// map of names therefore visits the zone apex first and every node
/// before its children.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
    labels: Vec<Vec<u8>>,
}

impl Name {
    /// The root name `.`.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// The name with the leftmost label removed, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.labels.is_empty() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].to_vec(),
        })
    }

    /// True if `self` is equal to `other` or lies below it.
    pub fn is_subdomain_of(&self, other: &Self) -> bool {
        if other.labels.len() > self.labels.len() {
            return false;
        }
        let skip = self.labels.len() - other.labels.len();
        self.labels[skip..] == other.labels[..]
    }

    /// The wildcard name directly below `self`, i.e. `*.<self>`.
    pub fn prepend_wildcard(&self) -> Self {
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(b"*".to_vec());
        labels.extend_from_slice(&self.labels);
        Self { labels }
    }

    /// Uncompressed wire representation including the root label.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.wire_len());
        for label in &self.labels {
            wire.push(label.len() as u8);
            wire.extend_from_slice(label);
        }
        wire.push(0);
        wire
    }

    fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Parse an uncompressed wire-form name out of `data`.
    ///
    /// Used for names embedded in record data, which are stored without
    /// compression. Fails on truncation or oversized labels.
    pub fn from_wire(data: &[u8]) -> Result<Self, NameError> {
        let mut labels = Vec::new();
        let mut pos = 0;
        let mut wire_len = 1;
        loop {
            let len = *data.get(pos).ok_or(NameError::Truncated)? as usize;
            if len == 0 {
                break;
            }
            if len > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong(len));
            }
            let label = data
                .get(pos + 1..pos + 1 + len)
                .ok_or(NameError::Truncated)?;
            labels.push(label.to_ascii_lowercase());
            pos += 1 + len;
            wire_len += 1 + len;
            if wire_len > MAX_WIRE_LEN {
                return Err(NameError::NameTooLong);
            }
        }
        Ok(Self { labels })
    }

    fn cmp_canonical(&self, other: &Self) -> std::cmp::Ordering {
        let mut left = self.labels.iter().rev();
        let mut right = other.labels.iter().rev();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return std::cmp::Ordering::Equal,
                (None, Some(_)) => return std::cmp::Ordering::Less,
                (Some(_), None) => return std::cmp::Ordering::Greater,
                (Some(l), Some(r)) => match l.cmp(r) {
                    std::cmp::Ordering::Equal => continue,
                    unequal => return unequal,
                },
            }
        }
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp_canonical(other)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NameError::Empty);
        }
        if s == "." {
            return Ok(Self::root());
        }
        let text = s.strip_suffix('.').unwrap_or(s);
        let mut labels = Vec::new();
        let mut wire_len = 1;
        for label in text.split('.') {
            if label.is_empty() {
                return Err(NameError::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(NameError::LabelTooLong(label.len()));
            }
            wire_len += 1 + label.len();
            if wire_len > MAX_WIRE_LEN {
                return Err(NameError::NameTooLong);
            }
            labels.push(label.as_bytes().to_ascii_lowercase());
        }
        Ok(Self { labels })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            for &byte in label {
                if byte.is_ascii_graphic() && byte != b'.' && byte != b'\\' {
                    write!(f, "{}", byte as char)?;
                } else {
                    write!(f, "\\{byte:03}")?;
                }
            }
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

/// Reasons a textual or wire-form name is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("empty name")]
    Empty,
    #[error("empty label")]
    EmptyLabel,
    #[error("label of {0} octets exceeds 63")]
    LabelTooLong(usize),
    #[error("name exceeds 255 octets")]
    NameTooLong,
    #[error("truncated wire-form name")]
    Truncated,
}
