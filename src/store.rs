//! The `ixfr_store` consumer contract (spec.md §6.3).
//!
//! The diff engine never decides how a finished IXFR is packaged or
//! shipped; it only ever calls three operations on a sink: start a
//! session tagged with the old/new serial pair, add an RR, delete an RR
//! given its already-uncompressed wire rdata. This module defines that
//! contract as a trait plus [`VecIxfrStore`], an in-memory reference
//! implementation used by the tests and the demo binary.
//!
//! `ixfr_store_free` in the C source destroys the session; here that is
//! just `Drop`. A session that is never [`IxfrStore::commit`]ted (the
//! walk returned early via `?`) is simply dropped, which is the "no
//! partial IXFR is committed" guarantee spec.md §7 requires without any
//! explicit abort call.

use bytes::Bytes;
use domain::base::iana::Class;
use domain::base::{Rtype, Ttl};

use crate::dname::CanonicalName;
use crate::error::Result;
use crate::rr::StoredRecordData;

/// One recorded change: an RR that was added to, or removed from, the
/// zone between `old_serial` and `new_serial`.
#[derive(Debug, Clone)]
pub struct IxfrChange {
    pub owner: Bytes,
    pub rtype: Rtype,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Bytes,
}

/// The sink the diff engine drives. Implementors accumulate (or stream
/// out) a del/add RR sequence for one `old_serial -> new_serial` IXFR.
pub trait IxfrStore: Sized {
    /// Opens a session for the given zone/serial pair. Mirrors
    /// `ixfr_store_start(zone, storage, old_serial, new_serial)`.
    fn start(apex: &CanonicalName, class: Class, old_serial: u32, new_serial: u32) -> Result<Self>;

    /// Records an added RR from fully-parsed rdata, mirroring
    /// `ixfr_store_addrr_rdatas`.
    fn add_rr(
        &mut self,
        owner: &CanonicalName,
        rtype: Rtype,
        class: Class,
        ttl: Ttl,
        rdata: &StoredRecordData,
    ) -> Result<()>;

    /// Records a deleted RR from already-uncompressed rdata bytes read
    /// straight off the spool, mirroring `ixfr_store_delrr_uncompressed`.
    fn del_rr_uncompressed(
        &mut self,
        owner: &[u8],
        rtype: Rtype,
        class: Class,
        ttl: Ttl,
        rdata: &[u8],
    ) -> Result<()>;

    /// Finalizes the session, returning it for inspection. Only called
    /// once the whole walk has completed without error.
    fn commit(self) -> Result<Self> {
        Ok(self)
    }
}

/// An in-memory store that simply collects every del/add RR. Used by
/// tests and the demo binary; a real deployment would instead stream
/// these into an IXFR journal file or wire response.
#[derive(Debug, Clone)]
pub struct VecIxfrStore {
    pub apex: CanonicalName,
    pub class: Class,
    pub old_serial: u32,
    pub new_serial: u32,
    pub deletes: Vec<IxfrChange>,
    pub adds: Vec<IxfrChange>,
}

impl VecIxfrStore {
    fn compose_owner(owner: &CanonicalName) -> Result<Bytes> {
        use domain::base::ToName;
        let mut buf = Vec::new();
        owner.as_name().compose(&mut buf).map_err(|_| {
            crate::error::Error::new(crate::error::ErrorKind::Format, "owner dname does not fit")
        })?;
        Ok(Bytes::from(buf))
    }

    fn compose_rdata(rdata: &StoredRecordData) -> Result<Bytes> {
        use domain::base::wire::ComposeRecordData;
        let mut buf = Vec::new();
        rdata.compose_canonical_rdata(&mut buf).map_err(|_| {
            crate::error::Error::new(crate::error::ErrorKind::Format, "rdata does not fit")
        })?;
        Ok(Bytes::from(buf))
    }
}

impl IxfrStore for VecIxfrStore {
    fn start(apex: &CanonicalName, class: Class, old_serial: u32, new_serial: u32) -> Result<Self> {
        log::debug!(
            target: "ixfr",
            "store session start for {} class {} serial {} -> {}",
            apex, class, old_serial, new_serial
        );
        Ok(VecIxfrStore {
            apex: apex.clone(),
            class,
            old_serial,
            new_serial,
            deletes: Vec::new(),
            adds: Vec::new(),
        })
    }

    fn add_rr(
        &mut self,
        owner: &CanonicalName,
        rtype: Rtype,
        class: Class,
        ttl: Ttl,
        rdata: &StoredRecordData,
    ) -> Result<()> {
        self.adds.push(IxfrChange {
            owner: Self::compose_owner(owner)?,
            rtype,
            class,
            ttl,
            rdata: Self::compose_rdata(rdata)?,
        });
        Ok(())
    }

    fn del_rr_uncompressed(
        &mut self,
        owner: &[u8],
        rtype: Rtype,
        class: Class,
        ttl: Ttl,
        rdata: &[u8],
    ) -> Result<()> {
        self.deletes.push(IxfrChange {
            owner: Bytes::copy_from_slice(owner),
            rtype,
            class,
            ttl,
            rdata: Bytes::copy_from_slice(rdata),
        });
        Ok(())
    }

    fn commit(self) -> Result<Self> {
        log::info!(
            target: "ixfr",
            "ixfr {} -> {} complete: {} deletes, {} adds",
            self.old_serial,
            self.new_serial,
            self.deletes.len(),
            self.adds.len()
        );
        Ok(self)
    }
}
