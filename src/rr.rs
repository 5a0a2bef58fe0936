//! The RR / RR-set model the diff engine compares, and the uncompressed
//! wire form two RRs are considered equal or different by.
//!
//! `ixfrcreate.c` walks rdata by hand (`rr_rdatalen_uncompressed`,
//! `spool_rr_data`) to get an uncompressed length and byte form for each
//! RR, because C has no notion of "this rdata type contains names that
//! may need expanding." The `domain` crate already solves that: composing
//! a [`ZoneRecordData`] through `compose_canonical_rdata` always writes
//! embedded names in full, uncompressed form, which is exactly the
//! "domain-name atoms written as wire names inline" form the spool format
//! wants. So an RR's identity for diffing purposes is just its composed
//! rdata bytes plus its TTL; nothing is walked atom by atom.

use bytes::Bytes;
use domain::base::wire::ComposeRecordData;
use domain::base::{Rtype, Ttl};
use domain::rdata::ZoneRecordData;

use crate::dname::CanonicalName;
use crate::error::{Error, ErrorKind, Result};

pub type StoredRecordData = ZoneRecordData<Bytes, domain::zonetree::types::StoredName>;

/// One resource record: a TTL plus typed rdata. The owner and class live
/// one level up, in [`RrSet`] and the zone walk respectively — every RR
/// sharing an owner/type/class is grouped there, matching how DNS
/// presents RRsets on the wire.
#[derive(Debug, Clone)]
pub struct Rr {
    ttl: Ttl,
    rdata: StoredRecordData,
    wire: Bytes,
}

impl Rr {
    pub fn new(ttl: Ttl, rdata: StoredRecordData) -> Result<Self> {
        let mut buf = Vec::new();
        rdata
            .compose_canonical_rdata(&mut buf)
            .map_err(|_| Error::new(ErrorKind::Format, "rdata does not fit in a wire record"))?;
        Ok(Rr {
            ttl,
            rdata,
            wire: Bytes::from(buf),
        })
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn rtype(&self) -> Rtype {
        self.rdata.rtype()
    }

    pub fn rdata(&self) -> &StoredRecordData {
        &self.rdata
    }

    /// The record's rdata composed without name compression. Spool
    /// format bytes and RR-identity comparisons both use this, never
    /// the `ZoneRecordData` value directly (whose `PartialEq` would
    /// also compare TTL-independent structure, which isn't what RFC
    /// 1995 diffing wants: two RRs differing only by TTL are still "the
    /// same RR, changed").
    pub fn wire_rdata(&self) -> &Bytes {
        &self.wire
    }

    /// Two RRs collide under RFC 1995 §4's matching rule ("same
    /// owner/type/class/rdata") when their rdata bytes match, ttl aside.
    pub fn same_rdata(&self, other: &Rr) -> bool {
        self.wire == other.wire
    }
}

/// All RRs sharing one owner, [`Rtype`], and class — an RRset as it
/// appears in a zone transfer.
#[derive(Debug, Clone)]
pub struct RrSet {
    owner: CanonicalName,
    rtype: Rtype,
    class: domain::base::iana::Class,
    rrs: Vec<Rr>,
}

impl RrSet {
    pub fn new(owner: CanonicalName, rtype: Rtype, class: domain::base::iana::Class) -> Self {
        RrSet {
            owner,
            rtype,
            class,
            rrs: Vec::new(),
        }
    }

    pub fn owner(&self) -> &CanonicalName {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn class(&self) -> domain::base::iana::Class {
        self.class
    }

    pub fn rrs(&self) -> &[Rr] {
        &self.rrs
    }

    pub fn push(&mut self, rr: Rr) {
        self.rrs.push(rr);
    }

    pub fn is_empty(&self) -> bool {
        self.rrs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rrs.len()
    }

    /// Finds an RR in this set whose `ttl` and rdata bytes both match,
    /// mirroring `rrset_find_rdata`'s linear scan. Per spec.md §4.3, TTL
    /// is part of RR identity for diffing purposes: a TTL-only change
    /// is a deletion of the old RR plus an addition of the new one, not
    /// a match.
    pub fn find(&self, ttl: Ttl, rdata: &[u8]) -> Option<usize> {
        self.rrs
            .iter()
            .position(|rr| rr.ttl() == ttl && rr.wire_rdata().as_ref() == rdata)
    }
}
