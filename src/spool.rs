//! Zone Spool Codec (S): writes the old zone's apex, serial, and
//! canonical `(owner, rrsets)` stream to a file; reads it back a
//! record at a time.
//!
//! Grounded directly on `spool_dname`/`spool_u16`/`spool_u32`/
//! `spool_rr_data`/`spool_rrset`/`spool_rrsets`/`spool_domains`/
//! `spool_zone_to_file` and their `read_spool_*` counterparts in
//! `ixfrcreate.c`. The C source duplicates the u16/u32 codec between
//! writer and reader (`spool_u16` vs `read_spool_u16`); here both sides
//! share one little-endian `byteorder` codec so they can never drift
//! apart. Endianness is pinned to little-endian per spec.md §6.1's
//! explicit fix (the source uses host order).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use domain::base::iana::Class;
use domain::base::{Rtype, Ttl};

use crate::dname::{CanonicalName, MAX_DNAME_LEN};
use crate::error::{Error, ErrorKind, Result};
use crate::rr::RrSet;
use crate::zone::ZoneWalk;

/// 16-bit rdlen bounds every rdata blob the spool carries (spec.md
/// §4.3's "Boundedness").
pub const MAX_RDLENGTH: usize = 65_535;

static SPOOL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Builds a spool file path from the zone file path, mixing in both
/// the process id and a monotonic per-process counter.
///
/// `ixfrcreate.c`'s `create_ixfr_spool_name` only appends the pid
/// (`<zfile>.spoolzone.<pid>`), which spec.md §5 and §9 both flag as a
/// known collision hazard: two `start` calls for different zones in
/// the same process collide on the same name. The counter closes that
/// gap without changing the on-disk format.
pub fn spool_path_for(zone_file_path: &Path) -> PathBuf {
    let pid = std::process::id();
    let counter = SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = zone_file_path.as_os_str().to_owned();
    name.push(format!(".spoolzone.{}.{}", pid, counter));
    PathBuf::from(name)
}

fn write_dname(w: &mut impl Write, name: &CanonicalName) -> Result<()> {
    let wire = name.compose_wire()?;
    if wire.len() > MAX_DNAME_LEN {
        return Err(Error::new(ErrorKind::Format, "dname too long to spool"));
    }
    w.write_u16::<LittleEndian>(wire.len() as u16)?;
    w.write_all(&wire)?;
    Ok(())
}

fn write_rrset(w: &mut impl Write, rrset: &RrSet) -> Result<()> {
    if rrset.is_empty() {
        return Ok(());
    }
    w.write_u16::<LittleEndian>(u16::from(rrset.rtype()))?;
    w.write_u16::<LittleEndian>(u16::from(rrset.class()))?;
    w.write_u16::<LittleEndian>(rrset.len() as u16)?;
    for rr in rrset.rrs() {
        w.write_u32::<LittleEndian>(rr.ttl().as_secs())?;
        let rdata = rr.wire_rdata();
        if rdata.len() > MAX_RDLENGTH {
            return Err(Error::new(ErrorKind::Format, "rdata too long to spool"));
        }
        w.write_u16::<LittleEndian>(rdata.len() as u16)?;
        w.write_all(rdata)?;
    }
    Ok(())
}

/// Freezes `zone`'s current content to `path`, emitting exactly the
/// wire format documented in spec.md §6.1. Returns the serial recorded
/// in the header, which the caller must hold onto for the later
/// `perform` call to check against.
pub fn write_spool<Z: ZoneWalk>(path: &Path, zone: &Z) -> Result<u32> {
    let serial = zone.current_serial()?;
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write_dname(&mut w, zone.apex())?;
    w.write_u32::<LittleEndian>(u32::from(serial))?;

    for owner in zone.walk_canonical()? {
        let non_empty: Vec<&RrSet> = owner.rrsets.iter().filter(|r| !r.is_empty()).collect();
        if non_empty.is_empty() {
            continue;
        }
        write_dname(&mut w, &owner.owner)?;
        w.write_u32::<LittleEndian>(non_empty.len() as u32)?;
        for rrset in non_empty {
            write_rrset(&mut w, rrset)?;
        }
    }
    // end delimiter: a zero-length dname, distinguishable from any
    // real owner (whose wire length is always >= 1, the root label).
    w.write_u16::<LittleEndian>(0)?;
    w.flush()?;
    Ok(u32::from(serial))
}

/// A single RR as read off the spool: just enough to drive the RR-level
/// diff (ttl, uncompressed rdata bytes) — never reconstructed into a
/// parsed `ZoneRecordData`, since the diff engine only ever compares
/// raw bytes.
pub struct SpooledRr {
    pub ttl: Ttl,
    pub rdata: Vec<u8>,
}

/// The low-level spool reader: one little-endian primitive per spool
/// grammar production (`dname`, `u16`, `u32`, an RR-set header, one RR).
/// Holds no walk-level state; [`SpoolDnameIterator`] layers the
/// `spool_dname_iterator` bookkeeping on top of this.
pub struct SpoolReader<R> {
    inner: R,
}

impl<R: Read> SpoolReader<R> {
    pub fn new(inner: R) -> Self {
        SpoolReader { inner }
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    /// Reads a `u32`. Exposed crate-wide: both the per-domain rrset
    /// count and the spool's deletion/diff paths in `ixfr.rs` need it
    /// directly off the reader.
    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    /// Reads one length-prefixed dname. An empty result signals the
    /// zero-length end delimiter.
    fn read_dname_raw(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u16()?;
        if len == 0 {
            return Ok(Vec::new());
        }
        if len as usize > MAX_DNAME_LEN {
            return Err(Error::new(ErrorKind::Format, "dname too long"));
        }
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads and returns the header: `(apex, old_serial)`.
    pub fn read_header(&mut self) -> Result<(CanonicalName, u32)> {
        let raw = self.read_dname_raw()?;
        if raw.is_empty() {
            return Err(Error::new(
                ErrorKind::Format,
                "spool file has an empty apex",
            ));
        }
        let apex = CanonicalName::from_wire_bytes(&raw)?;
        let serial = self.read_u32()?;
        Ok((apex, serial))
    }

    pub(crate) fn read_rrset_header(&mut self) -> Result<(Rtype, Class, u16)> {
        let rtype = Rtype::from(self.read_u16()?);
        let class = Class::from(self.read_u16()?);
        let rr_count = self.read_u16()?;
        Ok((rtype, class, rr_count))
    }

    pub(crate) fn read_rr(&mut self) -> Result<SpooledRr> {
        let ttl = Ttl::from_secs(self.read_u32()?);
        let rdlen = self.read_u16()? as usize;
        let mut rdata = vec![0u8; rdlen];
        self.inner.read_exact(&mut rdata)?;
        Ok(SpooledRr { ttl, rdata })
    }
}

/// Walks the spool's owner sequence one name at a time, the Rust port
/// of `struct spool_dname_iterator` / `spool_dname_iter_next`.
///
/// Never reads past an unconsumed name: [`Self::peek`] returns the
/// buffered name (reading it the first time it's asked for) without
/// advancing, and the caller must call [`Self::mark_processed`] once
/// it has consumed that owner's rrset block from the underlying reader
/// before the next `peek` is allowed to advance.
pub struct SpoolDnameIterator<R> {
    reader: SpoolReader<R>,
    current: Option<CanonicalName>,
    read_first: bool,
    eof: bool,
    is_processed: bool,
}

impl<R: Read> SpoolDnameIterator<R> {
    pub fn new(reader: SpoolReader<R>) -> Self {
        SpoolDnameIterator {
            reader,
            current: None,
            read_first: false,
            eof: false,
            is_processed: false,
        }
    }

    fn advance(&mut self) -> Result<()> {
        let raw = self.reader.read_dname_raw()?;
        if raw.is_empty() {
            self.eof = true;
            self.current = None;
        } else {
            self.current = Some(CanonicalName::from_wire_bytes(&raw)?);
        }
        self.is_processed = false;
        Ok(())
    }

    fn ensure_current(&mut self) -> Result<()> {
        if self.eof {
            return Ok(());
        }
        if !self.read_first {
            self.read_first = true;
            return self.advance();
        }
        if self.is_processed {
            return self.advance();
        }
        Ok(())
    }

    /// The name currently buffered, or `None` at end of file.
    pub fn peek(&mut self) -> Result<Option<CanonicalName>> {
        self.ensure_current()?;
        Ok(self.current.clone())
    }

    /// Marks the buffered name's rrset block as consumed, letting the
    /// next `peek` advance past it.
    pub fn mark_processed(&mut self) {
        self.is_processed = true;
    }

    /// Access to the underlying reader, for consuming the rrset block
    /// that follows the currently-buffered name.
    pub fn reader_mut(&mut self) -> &mut SpoolReader<R> {
        &mut self.reader
    }
}

/// Reads one domain's full rrset block (`u32 rrset_count` then that
/// many rrset blocks) and deletes every RR in it, mirroring
/// `process_domain_del_RRs` / `process_spool_delrrset`.
pub fn delete_domain_from_spool<R: Read>(
    reader: &mut SpoolReader<R>,
    owner_raw: &[u8],
    store: &mut impl crate::store::IxfrStore,
) -> Result<()> {
    let rrset_count = reader.read_u32()?;
    for _ in 0..rrset_count {
        let (rtype, class, rr_count) = reader.read_rrset_header()?;
        for _ in 0..rr_count {
            let rr = reader.read_rr()?;
            store.del_rr_uncompressed(owner_raw, rtype, class, rr.ttl, &rr.rdata)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dname::CanonicalName;
    use crate::rr::{Rr, StoredRecordData};
    use crate::zone::MemoryZone;
    use domain::base::Serial;
    use domain::rdata::{Soa, A};
    use std::io::Cursor;
    use std::net::Ipv4Addr;

    fn zone_with_soa_and_a() -> MemoryZone {
        let apex = CanonicalName::from_str("example.").unwrap();
        let mut zone = MemoryZone::new(apex.clone(), Class::IN);

        let soa = Soa::new(
            apex.as_name().clone(),
            CanonicalName::from_str("hostmaster.example.")
                .unwrap()
                .into_name(),
            Serial::from(10u32),
            Ttl::from_secs(3600),
            Ttl::from_secs(900),
            Ttl::from_secs(604800),
            Ttl::from_secs(3600),
        );
        let mut soa_rrset = crate::rr::RrSet::new(apex.clone(), Rtype::SOA, Class::IN);
        soa_rrset.push(Rr::new(Ttl::from_secs(3600), StoredRecordData::Soa(soa)).unwrap());
        zone.insert_rrset(soa_rrset);

        let www = CanonicalName::from_str("www.example.").unwrap();
        let mut a_rrset = crate::rr::RrSet::new(www, Rtype::A, Class::IN);
        a_rrset.push(
            Rr::new(
                Ttl::from_secs(300),
                StoredRecordData::A(A::new(Ipv4Addr::new(192, 0, 2, 1))),
            )
            .unwrap(),
        );
        zone.insert_rrset(a_rrset);

        zone
    }

    #[test]
    fn write_then_read_header_round_trips_apex_and_serial() {
        let zone = zone_with_soa_and_a();
        let mut buf = Vec::new();
        {
            let mut w = std::io::Cursor::new(&mut buf);
            let serial = zone.current_serial().unwrap();
            w.write_u16::<LittleEndian>(
                zone.apex().compose_wire().unwrap().len() as u16
            )
            .unwrap();
            w.write_all(&zone.apex().compose_wire().unwrap()).unwrap();
            w.write_u32::<LittleEndian>(u32::from(serial)).unwrap();
        }
        let mut reader = SpoolReader::new(Cursor::new(buf));
        let (apex, serial) = reader.read_header().unwrap();
        assert_eq!(&apex, zone.apex());
        assert_eq!(serial, 10);
    }

    #[test]
    fn full_write_spool_round_trips_domains_and_rrs() {
        use crate::zone::ZoneWalk;

        let zone = zone_with_soa_and_a();
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "ixfrgen-spool-test-{}-{}.spool",
            std::process::id(),
            SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let old_serial = write_spool(&path, &zone).unwrap();
        assert_eq!(old_serial, 10);

        let file = File::open(&path).unwrap();
        let mut reader = SpoolReader::new(BufReader::new(file));
        let (apex, serial) = reader.read_header().unwrap();
        assert_eq!(&apex, zone.apex());
        assert_eq!(serial, old_serial);

        let mut iter = SpoolDnameIterator::new(reader);
        let mut owners_seen = Vec::new();
        while let Some(name) = iter.peek().unwrap() {
            owners_seen.push(name.to_string());
            let type_count = iter.reader_mut().read_u32().unwrap();
            for _ in 0..type_count {
                let (_rtype, _class, rr_count) = iter.reader_mut().read_rrset_header().unwrap();
                for _ in 0..rr_count {
                    iter.reader_mut().read_rr().unwrap();
                }
            }
            iter.mark_processed();
        }
        assert_eq!(owners_seen, vec!["example.", "www.example."]);

        std::fs::remove_file(&path).ok();
    }

    /// An owner carrying an empty `RrSet` (alongside a non-empty one)
    /// must not inflate `rrset_count` past the number of rrset blocks
    /// actually written, or a reader looping `0..rrset_count` reads past
    /// the block and misparses the rest of the stream.
    #[test]
    fn empty_rrset_is_not_counted_or_emitted() {
        use crate::zone::ZoneWalk;

        let mut zone = zone_with_soa_and_a();
        let www = CanonicalName::from_str("www.example.").unwrap();
        let empty_txt = crate::rr::RrSet::new(www, Rtype::TXT, Class::IN);
        zone.insert_rrset(empty_txt);

        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "ixfrgen-spool-test-empty-rrset-{}-{}.spool",
            std::process::id(),
            SPOOL_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        write_spool(&path, &zone).unwrap();

        let file = File::open(&path).unwrap();
        let mut reader = SpoolReader::new(BufReader::new(file));
        reader.read_header().unwrap();

        let mut iter = SpoolDnameIterator::new(reader);
        let mut www_type_count = None;
        while let Some(name) = iter.peek().unwrap() {
            let type_count = iter.reader_mut().read_u32().unwrap();
            if name.to_string() == "www.example." {
                www_type_count = Some(type_count);
            }
            for _ in 0..type_count {
                let (_rtype, _class, rr_count) = iter.reader_mut().read_rrset_header().unwrap();
                for _ in 0..rr_count {
                    iter.reader_mut().read_rr().unwrap();
                }
            }
            iter.mark_processed();
        }
        // Only the A rrset was emitted; the empty TXT rrset contributed
        // neither a block nor a count.
        assert_eq!(www_type_count, Some(1));

        std::fs::remove_file(&path).ok();
    }
}
