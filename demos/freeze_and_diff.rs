//! Freezes a tiny in-memory zone, mutates it, then diffs the mutation
//! against the frozen spool and prints the resulting IXFR.
//!
//! Try it with:
//!
//!   cargo run --bin ixfr-freeze-diff

use std::net::Ipv4Addr;
use std::process::exit;

use domain::base::iana::Class;
use domain::base::{Serial, Ttl};
use domain::rdata::{Soa, A};

use ixfrgen::dname::CanonicalName;
use ixfrgen::ixfr::IxfrCreate;
use ixfrgen::logger::Logger;
use ixfrgen::rr::{Rr, RrSet, StoredRecordData};
use ixfrgen::store::VecIxfrStore;
use ixfrgen::zone::{MemoryZone, ZoneWalk};

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
    let mut rrset = RrSet::new(apex.clone(), domain::base::Rtype::SOA, Class::IN);
    rrset.push(Rr::new(Ttl::from_secs(3600), StoredRecordData::Soa(soa)).unwrap());
    rrset
}

fn a_rrset(owner: &CanonicalName, ttl: u32, addr: Ipv4Addr) -> RrSet {
    let mut rrset = RrSet::new(owner.clone(), domain::base::Rtype::A, Class::IN);
    rrset.push(Rr::new(Ttl::from_secs(ttl), StoredRecordData::A(A::new(addr))).unwrap());
    rrset
}

fn main() {
    Logger::new()
        .with_level(log::LevelFilter::Info)
        .with_stderr(true)
        .init()
        .expect("failed to initialize logger");

    let apex = CanonicalName::from_str("example.com.").unwrap();

    let mut zone = MemoryZone::new(apex.clone(), Class::IN);
    zone.insert_rrset(soa_rrset(&apex, 2024010100));
    let www = CanonicalName::from_str("www.example.com.").unwrap();
    zone.insert_rrset(a_rrset(&www, 300, Ipv4Addr::new(192, 0, 2, 1)));

    let zone_file_path = std::env::temp_dir().join("ixfr-freeze-diff-demo.zone");
    let ctx = match IxfrCreate::start(&zone, &zone_file_path) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to freeze zone: {}", e);
            exit(1);
        }
    };
    log::info!(
        "froze {} at serial {} to {}",
        zone.apex(),
        ctx.old_serial(),
        ctx.spool_path().display()
    );

    // Mutate: bump the serial, add a new owner, drop the existing A RR
    // in favor of a second address at the same owner.
    zone.insert_rrset(soa_rrset(&apex, 2024010101));
    let mut www_expanded = RrSet::new(www.clone(), domain::base::Rtype::A, Class::IN);
    www_expanded.push(Rr::new(Ttl::from_secs(300), StoredRecordData::A(A::new(Ipv4Addr::new(192, 0, 2, 9)))).unwrap());
    zone.insert_rrset(www_expanded);
    let mail = CanonicalName::from_str("mail.example.com.").unwrap();
    zone.insert_rrset(a_rrset(&mail, 300, Ipv4Addr::new(192, 0, 2, 25)));

    let store: VecIxfrStore = match ctx.perform(&zone) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to diff zone: {}", e);
            exit(1);
        }
    };

    println!(
        "IXFR {} -> {}: {} deletes, {} adds",
        store.old_serial,
        store.new_serial,
        store.deletes.len(),
        store.adds.len()
    );
    for change in &store.deletes {
        println!("  del {:?} {:?}", change.rtype, change.rdata);
    }
    for change in &store.adds {
        println!("  add {:?} {:?}", change.rtype, change.rdata);
    }

    std::fs::remove_file(ctx.spool_path()).ok();
}
