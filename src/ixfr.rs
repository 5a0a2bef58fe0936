//! IXFR Diff Engine (D): the coordinated walk between a spool file and
//! the in-memory zone that produces a minimal RFC 1995 diff.
//!
//! Grounded directly on `ixfr_create_start`/`ixfr_create_perform`/
//! `ixfr_create_walk_zone`/`process_spool_for_domain`/
//! `process_spool_before_domain`/`process_diff_domain`/
//! `process_diff_rrset`/`process_spool_delrrset`/
//! `process_domain_add_RRs`/`process_domain_del_RRs`/
//! `process_spool_remaining` in `ixfrcreate.c`, translated 1:1 in
//! control flow: catch-up phase, align phase, diff phase, then the
//! trailing-spool-owners sweep. Every step that can fail there (short
//! read, oversize dname, zone mismatch) propagates here as `Result`
//! through `?` rather than a boolean return plus `log_msg`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use domain::base::iana::Class;
use domain::base::Rtype;

use crate::dname::CanonicalName;
use crate::error::{Error, ErrorKind, Result};
use crate::rr::RrSet;
use crate::spool::{self, SpoolDnameIterator, SpoolReader};
use crate::store::IxfrStore;
use crate::zone::{OwnerRrsets, ZoneWalk};

/// The IXFR creation context (spec.md §3): apex, old serial and spool
/// path recorded at `start`, held until `perform` consumes them.
pub struct IxfrCreate {
    apex: CanonicalName,
    class: Class,
    old_serial: u32,
    spool_path: PathBuf,
}

impl IxfrCreate {
    /// Freezes `zone` to a spool file next to `zone_file_path` and
    /// returns the context needed to diff against it later. Mirrors
    /// `ixfr_create_start`.
    pub fn start<Z: ZoneWalk>(zone: &Z, zone_file_path: &Path) -> Result<Self> {
        let spool_path = spool::spool_path_for(zone_file_path);
        let old_serial = spool::write_spool(&spool_path, zone)?;
        Ok(IxfrCreate {
            apex: zone.apex().clone(),
            class: zone.class(),
            old_serial,
            spool_path,
        })
    }

    /// The spool file backing this context. The caller owns cleanup:
    /// spec.md §3/§5 both say the spool outlives a failed `perform` for
    /// post-mortem inspection, and is only ever unlinked by the caller.
    pub fn spool_path(&self) -> &Path {
        &self.spool_path
    }

    pub fn apex(&self) -> &CanonicalName {
        &self.apex
    }

    pub fn old_serial(&self) -> u32 {
        self.old_serial
    }

    /// Opens the spool, verifies it against this context, then walks it
    /// against `zone` producing a complete diff in a fresh `S`. Mirrors
    /// `ixfr_create_perform`.
    ///
    /// On any error the store built so far is simply dropped without
    /// ever reaching [`IxfrStore::commit`] — spec.md §7's "no partial
    /// IXFR is committed" guarantee, for free from ownership rather
    /// than an explicit destroy call.
    pub fn perform<Z: ZoneWalk, S: IxfrStore>(&self, zone: &Z) -> Result<S> {
        let file = File::open(&self.spool_path)?;
        let mut reader = SpoolReader::new(BufReader::new(file));
        let (spool_apex, spool_old_serial) = reader.read_header()?;
        if spool_apex != self.apex || spool_old_serial != self.old_serial {
            return Err(Error::new(
                ErrorKind::ZoneMismatch,
                "spool file does not match the ixfr creation context",
            ));
        }

        let new_serial = zone.current_serial()?;
        let mut store = S::start(&self.apex, self.class, self.old_serial, u32::from(new_serial))?;

        let new_owners = zone.walk_canonical()?;
        let mut iter = SpoolDnameIterator::new(reader);

        for owner in new_owners.iter().filter(|o| !o.rrsets.is_empty()) {
            process_spool_before_domain(&mut iter, &owner.owner, &mut store)?;
            let at_domain = matches!(iter.peek()?, Some(name) if name == owner.owner);
            if at_domain {
                process_diff_domain(&mut iter, owner, &mut store)?;
                iter.mark_processed();
            } else {
                process_domain_add_rrs(owner, &mut store)?;
            }
        }
        process_spool_remaining(&mut iter, &mut store)?;

        store.commit()
    }

    /// Idempotent in spirit with `ixfr_create_free`: there is nothing
    /// left to release once the context is dropped (no heap-managed
    /// state outlives it besides the spool file itself, which is the
    /// caller's to unlink). Provided for API parity with spec.md §6.4.
    pub fn free(self) {}
}

fn compose_owner(owner: &CanonicalName) -> Result<Vec<u8>> {
    owner.compose_wire()
}

/// Catch-up phase: deletes every spool owner strictly less than
/// `target` in canonical order. Mirrors `process_spool_before_domain`.
fn process_spool_before_domain<R: std::io::Read, S: IxfrStore>(
    iter: &mut SpoolDnameIterator<R>,
    target: &CanonicalName,
    store: &mut S,
) -> Result<()> {
    loop {
        let Some(spool_name) = iter.peek()? else {
            break;
        };
        if spool_name < *target {
            let owner_raw = compose_owner(&spool_name)?;
            spool::delete_domain_from_spool(iter.reader_mut(), &owner_raw, store)?;
            iter.mark_processed();
        } else {
            break;
        }
    }
    Ok(())
}

/// Deletes every remaining spool owner once the new-zone walk has
/// finished. Mirrors `process_spool_remaining`.
fn process_spool_remaining<R: std::io::Read, S: IxfrStore>(
    iter: &mut SpoolDnameIterator<R>,
    store: &mut S,
) -> Result<()> {
    loop {
        let Some(spool_name) = iter.peek()? else {
            break;
        };
        let owner_raw = compose_owner(&spool_name)?;
        spool::delete_domain_from_spool(iter.reader_mut(), &owner_raw, store)?;
        iter.mark_processed();
    }
    Ok(())
}

/// The domain only exists in the new zone: every in-zone RRset at it is
/// added in full. Mirrors `process_domain_add_RRs`.
fn process_domain_add_rrs<S: IxfrStore>(owner: &OwnerRrsets, store: &mut S) -> Result<()> {
    for rrset in &owner.rrsets {
        add_rrset(owner, rrset, store)?;
    }
    Ok(())
}

fn add_rrset<S: IxfrStore>(owner: &OwnerRrsets, rrset: &RrSet, store: &mut S) -> Result<()> {
    for rr in rrset.rrs() {
        store.add_rr(&owner.owner, rrset.rtype(), rrset.class(), rr.ttl(), rr.rdata())?;
    }
    Ok(())
}

/// Per-owner diff: the domain exists on both sides. Reads the spool's
/// `(type, class, rr_count)` tuples, diffing any RRset also present in
/// the new zone and deleting any missing from it; afterwards, any
/// new-zone RRset whose type was never seen on the spool is a wholesale
/// addition. Mirrors `process_diff_domain` / `process_marktypes`.
fn process_diff_domain<R: std::io::Read, S: IxfrStore>(
    iter: &mut SpoolDnameIterator<R>,
    owner: &OwnerRrsets,
    store: &mut S,
) -> Result<()> {
    let owner_raw = compose_owner(&owner.owner)?;
    let reader = iter.reader_mut();
    let spool_type_count = reader.read_u32()?;

    let mut marktypes: Vec<Rtype> = Vec::new();
    for _ in 0..spool_type_count {
        let (rtype, class, rr_count) = reader.read_rrset_header()?;
        match owner.rrsets.iter().find(|r| r.rtype() == rtype) {
            None => {
                // rrset in spool but not in new zone: wholesale deletion
                for _ in 0..rr_count {
                    let rr = reader.read_rr()?;
                    store.del_rr_uncompressed(&owner_raw, rtype, class, rr.ttl, &rr.rdata)?;
                }
            }
            Some(new_rrset) => {
                marktypes.push(rtype);
                diff_rrset(reader, class, rr_count, &owner.owner, new_rrset, store)?;
            }
        }
    }

    // RRsets present in the new zone but never seen on the spool are
    // wholesale additions.
    for rrset in owner
        .rrsets
        .iter()
        .filter(|r| !marktypes.contains(&r.rtype()))
    {
        add_rrset(owner, rrset, store)?;
    }
    Ok(())
}

/// RR-level diff within one matched RRset. Every spool RR is scanned
/// for a new-side RR with identical ttl and rdata; misses are
/// deletions, and new-side RRs never matched are additions. Mirrors
/// `process_diff_rrset` / `rrset_find_rdata` / `rdata_match`.
fn diff_rrset<R: std::io::Read, S: IxfrStore>(
    reader: &mut SpoolReader<R>,
    class: Class,
    rr_count: u16,
    owner: &CanonicalName,
    new_rrset: &RrSet,
    store: &mut S,
) -> Result<()> {
    let owner_raw = owner.compose_wire()?;
    let mut marked = vec![false; new_rrset.len()];

    for _ in 0..rr_count {
        let rr = reader.read_rr()?;
        match new_rrset.find(rr.ttl, &rr.rdata) {
            Some(idx) => marked[idx] = true,
            None => {
                store.del_rr_uncompressed(&owner_raw, new_rrset.rtype(), class, rr.ttl, &rr.rdata)?;
            }
        }
    }

    for (idx, rr) in new_rrset.rrs().iter().enumerate() {
        if !marked[idx] {
            store.add_rr(owner, new_rrset.rtype(), new_rrset.class(), rr.ttl(), rr.rdata())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Rr, StoredRecordData};
    use crate::store::VecIxfrStore;
    use crate::zone::MemoryZone;
    use domain::base::{Serial, Ttl};
    use domain::rdata::{Soa, A};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn tmp_zone_file_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "ixfrgen-test-{}-{}-{}.zone",
            tag,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn soa_rrset(apex: &CanonicalName, serial: u32) -> RrSet {
        let soa = Soa::new(
            apex.as_name().clone(),
            CanonicalName::from_str("hostmaster.example.")
                .unwrap()
                .into_name(),
            Serial::from(serial),
            Ttl::from_secs(3600),
            Ttl::from_secs(900),
            Ttl::from_secs(604800),
            Ttl::from_secs(3600),
        );
        let mut rrset = RrSet::new(apex.clone(), Rtype::SOA, Class::IN);
        rrset.push(Rr::new(Ttl::from_secs(3600), StoredRecordData::Soa(soa)).unwrap());
        rrset
    }

    fn a_rrset(owner: &CanonicalName, ttl: u32, addr: Ipv4Addr) -> RrSet {
        let mut rrset = RrSet::new(owner.clone(), Rtype::A, Class::IN);
        rrset.push(Rr::new(Ttl::from_secs(ttl), StoredRecordData::A(A::new(addr))).unwrap());
        rrset
    }

    fn find<'a>(
        changes: &'a [crate::store::IxfrChange],
        rtype: Rtype,
        rdata: &[u8],
    ) -> Option<&'a crate::store::IxfrChange> {
        changes
            .iter()
            .find(|c| c.rtype == rtype && c.rdata.as_ref() == rdata)
    }

    /// Seed scenario 1: pure add. Old = {apex SOA s1}. New = {apex SOA
    /// s2, a.apex A 1.2.3.4}.
    #[test]
    fn pure_add() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));

        let path = tmp_zone_file_path("pure-add");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));
        let a = CanonicalName::from_str("a.example.").unwrap();
        new_zone.insert_rrset(a_rrset(&a, 300, Ipv4Addr::new(1, 2, 3, 4)));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        assert_eq!(store.deletes.len(), 1);
        assert_eq!(store.adds.len(), 2);
        assert!(find(&store.deletes, Rtype::SOA, &soa_rdata_bytes(&apex, 1)).is_some());
        assert!(find(&store.adds, Rtype::SOA, &soa_rdata_bytes(&apex, 2)).is_some());
        assert!(find(&store.adds, Rtype::A, &[1, 2, 3, 4]).is_some());

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    fn soa_rdata_bytes(apex: &CanonicalName, serial: u32) -> Vec<u8> {
        use domain::base::wire::ComposeRecordData;
        let rrset = soa_rrset(apex, serial);
        let mut buf = Vec::new();
        rrset.rrs()[0]
            .rdata()
            .compose_canonical_rdata(&mut buf)
            .unwrap();
        buf
    }

    /// Seed scenario 2: pure delete. Old = {apex SOA s1, b.apex TXT "x"}.
    /// New = {apex SOA s2}.
    #[test]
    fn pure_delete() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));
        let b = CanonicalName::from_str("b.example.").unwrap();
        old_zone.insert_rrset(a_rrset(&b, 60, Ipv4Addr::new(8, 8, 8, 8)));

        let path = tmp_zone_file_path("pure-delete");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        assert_eq!(store.deletes.len(), 2);
        assert_eq!(store.adds.len(), 1);

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Seed scenario 3: TTL-only change on one RR. TTL is part of RR
    /// identity, so this is a delete + add, not a no-op.
    #[test]
    fn ttl_change_is_delete_plus_add() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let x = CanonicalName::from_str("x.example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));
        old_zone.insert_rrset(a_rrset(&x, 300, Ipv4Addr::new(1, 2, 3, 4)));

        let path = tmp_zone_file_path("ttl-change");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 1));
        new_zone.insert_rrset(a_rrset(&x, 600, Ipv4Addr::new(1, 2, 3, 4)));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        let a_deletes: Vec<_> = store.deletes.iter().filter(|c| c.rtype == Rtype::A).collect();
        let a_adds: Vec<_> = store.adds.iter().filter(|c| c.rtype == Rtype::A).collect();
        assert_eq!(a_deletes.len(), 1);
        assert_eq!(a_adds.len(), 1);
        assert_eq!(a_deletes[0].ttl, Ttl::from_secs(300));
        assert_eq!(a_adds[0].ttl, Ttl::from_secs(600));

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Seed scenario 4: RRset expansion. Old x.apex A {1.2.3.4}. New
    /// x.apex A {1.2.3.4, 1.2.3.5}. Expect only the new address added.
    #[test]
    fn rrset_expansion_adds_only_the_new_member() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let x = CanonicalName::from_str("x.example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));
        old_zone.insert_rrset(a_rrset(&x, 300, Ipv4Addr::new(1, 2, 3, 4)));

        let path = tmp_zone_file_path("rrset-expansion");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut expanded = RrSet::new(x.clone(), Rtype::A, Class::IN);
        expanded.push(Rr::new(Ttl::from_secs(300), StoredRecordData::A(A::new(Ipv4Addr::new(1, 2, 3, 4)))).unwrap());
        expanded.push(Rr::new(Ttl::from_secs(300), StoredRecordData::A(A::new(Ipv4Addr::new(1, 2, 3, 5)))).unwrap());

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 1));
        new_zone.insert_rrset(expanded);

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        let a_deletes: Vec<_> = store.deletes.iter().filter(|c| c.rtype == Rtype::A).collect();
        let a_adds: Vec<_> = store.adds.iter().filter(|c| c.rtype == Rtype::A).collect();
        assert_eq!(a_deletes.len(), 0);
        assert_eq!(a_adds.len(), 1);
        assert_eq!(&a_adds[0].rdata[..], &[1, 2, 3, 5][..]);

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Seed scenario 5: an owner deleted between two kept owners. Old
    /// owners [a, b, c]; new owners [a, c]. `b` must be caught and
    /// deleted during the catch-up phase between `a` and `c`.
    #[test]
    fn owner_deleted_between_two_kept_owners() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let a = CanonicalName::from_str("a.example.").unwrap();
        let b = CanonicalName::from_str("b.example.").unwrap();
        let c = CanonicalName::from_str("c.example.").unwrap();

        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));
        old_zone.insert_rrset(a_rrset(&a, 300, Ipv4Addr::new(10, 0, 0, 1)));
        old_zone.insert_rrset(a_rrset(&b, 300, Ipv4Addr::new(10, 0, 0, 2)));
        old_zone.insert_rrset(a_rrset(&c, 300, Ipv4Addr::new(10, 0, 0, 3)));

        let path = tmp_zone_file_path("owner-deleted-between");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));
        new_zone.insert_rrset(a_rrset(&a, 300, Ipv4Addr::new(10, 0, 0, 1)));
        new_zone.insert_rrset(a_rrset(&c, 300, Ipv4Addr::new(10, 0, 0, 3)));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        let a_deletes: Vec<_> = store.deletes.iter().filter(|ch| ch.rtype == Rtype::A).collect();
        assert_eq!(a_deletes.len(), 1);
        assert_eq!(&a_deletes[0].rdata[..], &[10, 0, 0, 2][..]);

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Boundary: identical zones produce zero deletes and zero adds.
    #[test]
    fn identical_zones_produce_no_changes() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let x = CanonicalName::from_str("x.example.").unwrap();
        let mut zone = MemoryZone::new(apex.clone(), Class::IN);
        zone.insert_rrset(soa_rrset(&apex, 5));
        zone.insert_rrset(a_rrset(&x, 300, Ipv4Addr::new(9, 9, 9, 9)));

        let path = tmp_zone_file_path("identical");
        let ctx = IxfrCreate::start(&zone, &path).unwrap();

        let store: VecIxfrStore = ctx.perform(&zone).unwrap();
        assert_eq!(store.deletes.len(), 0);
        assert_eq!(store.adds.len(), 0);

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Boundary: an empty new zone (apex deleted along with it) turns
    /// every old owner into a deletion.
    #[test]
    fn empty_new_zone_deletes_everything() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let x = CanonicalName::from_str("x.example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));
        old_zone.insert_rrset(a_rrset(&x, 300, Ipv4Addr::new(1, 1, 1, 1)));

        let path = tmp_zone_file_path("empty-new");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        // `current_serial` needs an apex SOA to read, so the new zone
        // keeps that much; every other old owner still gets dropped.
        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        assert_eq!(store.deletes.len(), 2); // old SOA + x A
        assert_eq!(store.adds.len(), 1); // new SOA

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// Boundary: an empty old zone (spool has only the apex + end
    /// delimiter) turns every new owner into an addition.
    #[test]
    fn empty_old_zone_adds_everything() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));

        let path = tmp_zone_file_path("empty-old");
        let ctx = IxfrCreate::start(&old_zone, &path).unwrap();

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));
        let x = CanonicalName::from_str("x.example.").unwrap();
        new_zone.insert_rrset(a_rrset(&x, 300, Ipv4Addr::new(2, 2, 2, 2)));
        let y = CanonicalName::from_str("y.example.").unwrap();
        new_zone.insert_rrset(a_rrset(&y, 300, Ipv4Addr::new(3, 3, 3, 3)));

        let store: VecIxfrStore = ctx.perform(&new_zone).unwrap();
        assert_eq!(store.deletes.len(), 1); // old SOA only
        assert_eq!(store.adds.len(), 3); // new SOA + x + y

        std::fs::remove_file(ctx.spool_path()).ok();
    }

    /// A zone-mismatch (old serial doesn't match what's on the spool)
    /// is rejected before any diff work starts.
    #[test]
    fn zone_mismatch_is_rejected() {
        let apex = CanonicalName::from_str("example.").unwrap();
        let mut old_zone = MemoryZone::new(apex.clone(), Class::IN);
        old_zone.insert_rrset(soa_rrset(&apex, 1));

        let path = tmp_zone_file_path("mismatch");
        let mut ctx = IxfrCreate::start(&old_zone, &path).unwrap();
        // Simulate a stale context whose recorded serial no longer
        // matches what is actually on disk.
        ctx.old_serial = 999;

        let mut new_zone = MemoryZone::new(apex.clone(), Class::IN);
        new_zone.insert_rrset(soa_rrset(&apex, 2));

        let err = ctx.perform::<_, VecIxfrStore>(&new_zone).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZoneMismatch);

        std::fs::remove_file(ctx.spool_path()).ok();
    }
}
