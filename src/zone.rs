//! The zone-walk interface the diff engine consumes.
//!
//! The diff engine (`ixfr.rs`) needs exactly one thing from "a zone":
//! its apex, its class, and every owner's RRsets, in canonical name
//! order. It does not need a full query-serving database. `ZoneWalk`
//! captures that narrow need; [`MemoryZone`] is a small in-memory
//! implementation of it (adapted from the teacher's `ZoneTree`, and
//! from the light-weight `HashMap`-backed `ZoneStore` the pack's
//! cascade example shows), used by the demo binary and the tests.
//!
//! A real deployment plugs in `domain::zonetree::Zone` instead; the
//! [`DomainZone`] adapter drives it through its own `ReadableZone::walk`,
//! the same call the cascade example makes (`unsigned_zone.read().walk(op)`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use domain::base::iana::Class;
use domain::base::{Rtype, Serial};
use domain::zonetree::{Rrset as DomainRrset, SharedRrset, WalkOp, Zone};

use crate::dname::CanonicalName;
use crate::error::{Error, ErrorKind, Result};
use crate::rr::{Rr, RrSet, StoredRecordData};

/// Every RRset present at one owner name.
#[derive(Debug, Clone)]
pub struct OwnerRrsets {
    pub owner: CanonicalName,
    pub rrsets: Vec<RrSet>,
}

/// What the diff engine needs from a zone: its identity, and a walk
/// over every owner in canonical order.
pub trait ZoneWalk {
    fn apex(&self) -> &CanonicalName;
    fn class(&self) -> Class;

    /// Every owner this zone holds records for, canonically ordered,
    /// each carrying every RRset present at that owner. The apex's SOA
    /// RRset is included like any other.
    fn walk_canonical(&self) -> Result<Vec<OwnerRrsets>>;

    /// The zone's current SOA serial, i.e. `zone_get_current_serial`
    /// (spec.md §6.2). Implemented once here, against `walk_canonical`,
    /// rather than per implementor, since every `ZoneWalk` already
    /// carries its apex's SOA RRset in that walk.
    fn current_serial(&self) -> Result<Serial> {
        let owners = self.walk_canonical()?;
        let apex_rrsets = owners
            .iter()
            .find(|o| &o.owner == self.apex())
            .ok_or_else(|| Error::new(ErrorKind::Format, "zone has no apex owner"))?;
        let soa_rrset = apex_rrsets
            .rrsets
            .iter()
            .find(|r| r.rtype() == Rtype::SOA)
            .ok_or_else(|| Error::new(ErrorKind::Format, "zone apex has no SOA rrset"))?;
        let soa_rr = soa_rrset
            .rrs()
            .first()
            .ok_or_else(|| Error::new(ErrorKind::Format, "zone apex SOA rrset is empty"))?;
        match soa_rr.rdata() {
            StoredRecordData::Soa(soa) => Ok(soa.serial()),
            _ => Err(Error::new(
                ErrorKind::Format,
                "zone apex SOA rrset contains non-SOA rdata",
            )),
        }
    }
}

/// A small in-memory zone: owner name -> RRsets at that owner. Used by
/// tests and the demo binary in place of a real query-serving database.
#[derive(Debug, Clone)]
pub struct MemoryZone {
    apex: CanonicalName,
    class: Class,
    owners: HashMap<CanonicalName, Vec<RrSet>>,
}

impl MemoryZone {
    pub fn new(apex: CanonicalName, class: Class) -> Self {
        MemoryZone {
            apex,
            class,
            owners: HashMap::new(),
        }
    }

    /// Adds one RRset at `owner`. Replaces any existing RRset of the
    /// same type at that owner, matching a zone's "one RRset per
    /// owner/type" invariant.
    pub fn insert_rrset(&mut self, rrset: RrSet) {
        let owner = rrset.owner().clone();
        let rrsets = self.owners.entry(owner).or_default();
        rrsets.retain(|existing| existing.rtype() != rrset.rtype());
        rrsets.push(rrset);
    }

    pub fn remove_owner(&mut self, owner: &CanonicalName) {
        self.owners.remove(owner);
    }
}

impl ZoneWalk for MemoryZone {
    fn apex(&self) -> &CanonicalName {
        &self.apex
    }

    fn class(&self) -> Class {
        self.class
    }

    fn walk_canonical(&self) -> Result<Vec<OwnerRrsets>> {
        let mut owners: Vec<&CanonicalName> = self.owners.keys().collect();
        owners.sort();
        Ok(owners
            .into_iter()
            .map(|owner| OwnerRrsets {
                owner: owner.clone(),
                rrsets: self.owners[owner].clone(),
            })
            .collect())
    }
}

/// Drives a real `domain::zonetree::Zone` through its `ReadableZone`
/// walk and regroups the flat `(owner, SharedRrset)` stream the crate
/// hands back into per-owner, canonically-ordered [`OwnerRrsets`].
pub struct DomainZone<'a> {
    apex: CanonicalName,
    zone: &'a Zone,
}

impl<'a> DomainZone<'a> {
    pub fn new(zone: &'a Zone) -> Self {
        DomainZone {
            apex: CanonicalName::from(zone.apex_name().clone()),
            zone,
        }
    }
}

impl<'a> ZoneWalk for DomainZone<'a> {
    fn apex(&self) -> &CanonicalName {
        &self.apex
    }

    fn class(&self) -> Class {
        self.zone.class()
    }

    fn walk_canonical(&self) -> Result<Vec<OwnerRrsets>> {
        let collected: Arc<Mutex<HashMap<CanonicalName, Vec<DomainRrset>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let sink = collected.clone();
        let op: WalkOp = Box::new(move |owner, rrset: &SharedRrset, _at_zone_cut| {
            let mut map = sink.lock().unwrap();
            map.entry(CanonicalName::from(owner))
                .or_default()
                .push((**rrset).clone());
        });
        self.zone.read().walk(op);

        let map = Arc::try_unwrap(collected)
            .map_err(|_| {
                Error::new(
                    ErrorKind::Logic,
                    "zone walk closure outlived the read, cannot recover collected rrsets",
                )
            })?
            .into_inner()
            .map_err(|_| Error::new(ErrorKind::Logic, "zone walk collector mutex was poisoned"))?;
        let mut owners: Vec<CanonicalName> = map.keys().cloned().collect();
        owners.sort();

        let mut out = Vec::with_capacity(owners.len());
        for owner in owners {
            let domain_rrsets = &map[&owner];
            let mut rrsets = Vec::with_capacity(domain_rrsets.len());
            for domain_rrset in domain_rrsets {
                let mut rrset = RrSet::new(owner.clone(), domain_rrset.rtype(), self.class());
                for data in domain_rrset.data() {
                    rrset.push(Rr::new(domain_rrset.ttl(), data.clone())?);
                }
                rrsets.push(rrset);
            }
            out.push(OwnerRrsets { owner, rrsets });
        }
        Ok(out)
    }
}
