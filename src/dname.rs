//! Owner names and the canonical ordering the diff engine walks by.
//!
//! The spool format and the diff engine both need one fixed total order
//! over owner names: RFC 4034 §6.1's canonical form, comparing labels
//! right-to-left with ASCII case folded out. Rather than reimplement
//! that by hand (as `ixfrcreate.c`'s `dname_compare` does byte-for-byte),
//! this wraps `domain`'s own `Name` type and defers to its `CanonicalOrd`
//! impl, which already matches RFC 4034 exactly.

use std::cmp::Ordering;

use bytes::Bytes;
use domain::base::cmp::CanonicalOrd;
use domain::base::name::Name;
use domain::base::ToName;
use domain::zonetree::types::StoredName;

use crate::error::{Error, ErrorKind, Result};

/// The maximum wire length of a domain name (RFC 1035 §3.1): spec.md
/// §3 and §4.3's "Boundedness" both call this out explicitly.
pub const MAX_DNAME_LEN: usize = 255;

/// Wraps a [`StoredName`] so it sorts by RFC 4034 canonical order under
/// `Ord`/`PartialOrd` rather than `Name`'s default (wire-length-first)
/// ordering.
#[derive(Debug, Clone)]
pub struct CanonicalName(StoredName);

impl CanonicalName {
    pub fn from_str(s: &str) -> Result<Self> {
        Ok(CanonicalName(StoredName::bytes_from_str(s)?))
    }

    pub fn root() -> Self {
        CanonicalName(Name::root())
    }

    pub fn as_name(&self) -> &StoredName {
        &self.0
    }

    pub fn into_name(self) -> StoredName {
        self.0
    }

    /// Parses an uncompressed wire-format dname, as read off the spool
    /// (spec.md §6.1's `dname := u16 length | length octets`). Rejects
    /// anything longer than [`MAX_DNAME_LEN`].
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_DNAME_LEN {
            return Err(Error::new(ErrorKind::Format, "dname too long"));
        }
        let name = Name::from_octets(Bytes::copy_from_slice(bytes))
            .map_err(|e| Error::new(ErrorKind::Format, format!("invalid dname: {}", e)))?;
        Ok(CanonicalName(name))
    }

    /// Composes this name to its uncompressed wire form, as the spool
    /// format and the store sink's raw-owner-bytes contract both want.
    pub fn compose_wire(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.0
            .compose(&mut buf)
            .map_err(|_| Error::new(ErrorKind::Format, "dname does not fit in a wire record"))?;
        Ok(buf)
    }
}

impl From<StoredName> for CanonicalName {
    fn from(name: StoredName) -> Self {
        CanonicalName(name)
    }
}

impl PartialEq for CanonicalName {
    fn eq(&self, other: &Self) -> bool {
        self.0.canonical_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for CanonicalName {}

impl PartialOrd for CanonicalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.canonical_cmp(&other.0)
    }
}

impl std::hash::Hash for CanonicalName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for label in self.0.iter_labels() {
            for octet in label.iter() {
                octet.to_ascii_lowercase().hash(state);
            }
            0xffu8.hash(state); // label separator, keeps "a.b" distinct from "ab"
        }
    }
}

impl std::fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_right_to_left() {
        // "a.example" < "yy.example" < "example" ordering per RFC 4034 examples
        let a = CanonicalName::from_str("a.example.").unwrap();
        let yy = CanonicalName::from_str("yy.example.").unwrap();
        let example = CanonicalName::from_str("example.").unwrap();
        assert!(example < a);
        assert!(a < yy);
    }

    #[test]
    fn case_is_folded_for_equality_and_hash() {
        let upper = CanonicalName::from_str("WWW.Example.").unwrap();
        let lower = CanonicalName::from_str("www.example.").unwrap();
        assert_eq!(upper, lower);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;
        let mut h1 = DefaultHasher::new();
        upper.hash(&mut h1);
        let mut h2 = DefaultHasher::new();
        lower.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn wire_round_trip() {
        let name = CanonicalName::from_str("www.example.").unwrap();
        let wire = name.compose_wire().unwrap();
        let parsed = CanonicalName::from_wire_bytes(&wire).unwrap();
        assert_eq!(name, parsed);
    }

    #[test]
    fn oversize_wire_is_rejected() {
        let oversize = vec![1u8; MAX_DNAME_LEN + 1];
        assert!(CanonicalName::from_wire_bytes(&oversize).is_err());
    }
}
