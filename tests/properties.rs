//! Property-style tests for the invariants listed in spec §8, driven by hand
//! (no property-testing crate is in the dependency stack) over representative
//! inputs rather than a single fixed example.

use ng_pppoe::clock::FakeClock;
use ng_pppoe::driver::Driver;
use ng_pppoe::link::{LinkId, LinkState};
use ng_pppoe::tag;
use ng_pppoe::transport::mock::MockTransport;
use ng_pppoe::upper::{DownCause, Originated, UpperHook, UpperLayer};

struct NullUpper;
impl UpperLayer for NullUpper {
    fn notify_up(&mut self, _link: LinkId) {}
    fn notify_down(&mut self, _link: LinkId, _cause: DownCause) {}
    fn notify_incoming(&mut self, _link: LinkId) {}
    fn request_upper_hook(&mut self, link: LinkId) -> UpperHook {
        UpperHook { path: "mpd-bundle:".to_string(), hook: format!("link{}", link.0) }
    }
    fn instantiate(&mut self, template: LinkId) -> LinkId {
        template
    }
    fn originated(&self, _link: LinkId) -> Originated {
        Originated::Local
    }
}

type TestDriver = Driver<MockTransport, FakeClock, NullUpper>;

fn new_driver() -> TestDriver {
    Driver::new(1, 4096, MockTransport::new(), FakeClock::new(), NullUpper)
}

/// Invariant 1: CONNECTING always has an armed timer; DOWN never does.
#[test]
fn invariant_connect_timer_matches_connecting_state() {
    let mut driver = new_driver();
    let id = driver.add_link("link0");
    driver.set_iface(id, "eth0", None).unwrap();

    assert_eq!(driver.link(id).unwrap().state, LinkState::Down);
    assert!(driver.link(id).unwrap().runtime.timer.is_none());

    driver.open(id).unwrap();
    assert_eq!(driver.link(id).unwrap().state, LinkState::Connecting);
    let timer = driver.link(id).unwrap().runtime.timer.unwrap();
    assert!(driver.clock.is_armed(timer));

    driver.close(id).unwrap();
    assert_eq!(driver.link(id).unwrap().state, LinkState::Down);
    assert!(driver.link(id).unwrap().runtime.timer.is_none());
    assert!(!driver.clock.is_armed(timer));
}

/// Invariant 2: a parent entry's refcount always equals the number of links
/// bound to it, over a sequence of binds/rebinds/releases, not just one.
#[test]
fn invariant_parent_refcount_tracks_bound_links_through_rebinding() {
    let mut driver = new_driver();
    let links: Vec<LinkId> = (0..4).map(|i| driver.add_link(format!("l{}", i))).collect();

    for &id in &links {
        driver.set_iface(id, "eth0", None).unwrap();
    }
    let parent0 = driver.link(links[0]).unwrap().parent.unwrap();
    assert_eq!(driver.parents().info(parent0).unwrap().refs, 4);

    // rebind one link to a different interface: refcount on eth0 drops by one
    driver.set_iface(links[0], "eth1", None).unwrap();
    assert_eq!(driver.parents().info(parent0).unwrap().refs, 3);
    let parent1 = driver.link(links[0]).unwrap().parent.unwrap();
    assert_ne!(parent0, parent1);
    assert_eq!(driver.parents().info(parent1).unwrap().refs, 1);

    for &id in &links[1..] {
        driver.shutdown_link(id).unwrap();
    }
    assert!(driver.parents().info(parent0).is_none());
    assert!(driver.parents().info(parent1).is_some());
    driver.shutdown_link(links[0]).unwrap();
    assert!(driver.parents().info(parent1).is_none());
}

/// Invariant 3: a listen entry's refcount equals the number of
/// incoming-enabled links referencing it, across enable/disable toggling in
/// any order.
#[test]
fn invariant_listen_refcount_tracks_incoming_enabled_links() {
    let mut driver = new_driver();
    let links: Vec<LinkId> = (0..3).map(|i| driver.add_link(format!("l{}", i))).collect();
    for &id in &links {
        driver.set_iface(id, "eth0", None).unwrap();
        driver.set_service(id, "isp").unwrap();
    }

    driver.enable_incoming(links[1]).unwrap();
    driver.enable_incoming(links[0]).unwrap();
    let listen = driver.link(links[0]).unwrap().listen.unwrap();
    assert_eq!(driver.listens().refcount(listen), 2);

    driver.enable_incoming(links[2]).unwrap();
    assert_eq!(driver.listens().refcount(listen), 3);

    driver.disable_incoming(links[1]).unwrap();
    assert_eq!(driver.listens().refcount(listen), 2);
    driver.disable_incoming(links[0]).unwrap();
    driver.disable_incoming(links[2]).unwrap();
    assert_eq!(driver.listens().find(driver.link(links[0]).unwrap().parent.unwrap(), "isp"), None);
}

/// Invariant 4/5 + round-trip 6: the tag walker never reads past the
/// declared payload end, for every representable (type, len) pair, and
/// `find_tag` recovers exactly what was emitted.
#[test]
fn tag_round_trip_and_bounds_hold_across_many_lengths() {
    for len in [0usize, 1, 2, 3, 4, 16, 63, 64, 255, 256, 1000, 4096, 65531] {
        let value = vec![0x5A; len];
        let mut buf = Vec::new();
        tag::emit(&mut buf, tag::PPPOE_TAG_HOST_UNIQ, &value);
        tag::emit(&mut buf, tag::PPPOE_TAG_AC_COOKIE, b"trailer");

        let found = tag::find_tag(&buf, tag::PPPOE_TAG_HOST_UNIQ).unwrap();
        assert_eq!(found.value, value.as_slice());
        let trailer = tag::find_tag(&buf, tag::PPPOE_TAG_AC_COOKIE).unwrap();
        assert_eq!(trailer.value, b"trailer");
        assert!(tag::find_tag(&buf, tag::PPPOE_TAG_SERVICE_NAME).is_none());

        // every tag the walker could possibly yield ends within the buffer
        for t in tag::TagIter::new(&buf) {
            assert!(t.value.len() <= buf.len());
        }
    }
}

/// Invariant 9 (DSL-Forum sub-TLV overrun): a declared sub-length that
/// exceeds the remaining bytes leaves both fields empty, for several overrun
/// magnitudes, not just one.
#[test]
fn dsl_forum_overrun_always_yields_empty_fields() {
    for claimed_len in [5u8, 20, 100, 250, 255] {
        let mut value = tag::DSL_FORUM_VENDOR_ID.to_be_bytes().to_vec();
        value.push(1); // Agent-Circuit-ID sub-type
        value.push(claimed_len);
        value.extend_from_slice(b"x"); // always fewer bytes than claimed
        let decoded = tag::parse_dsl_forum_subtlvs(&value);
        assert_eq!(decoded, tag::DslForumIds::default());
    }
}

/// Invariant 10: max-payload configuration rejects everything outside
/// [1492, 1510], and accepts the boundary values and 0 (disabled).
#[test]
fn max_payload_boundary_is_exactly_1492_to_1510() {
    let mut driver = new_driver();
    let id = driver.add_link("link0");
    for v in [0u16, 1492, 1500, 1510] {
        assert!(driver.set_max_payload(id, v).is_ok(), "{} should be accepted", v);
    }
    for v in [1u16, 1491, 1511, 65535] {
        assert!(driver.set_max_payload(id, v).is_err(), "{} should be rejected", v);
    }
}
