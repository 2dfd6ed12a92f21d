//! Scenario 1 (first-contact handshake) and scenario 2 (duplicate
//! announcement) from the spec's end-to-end scenarios.

use h42_can_bridge::identity::NodeIdentity;

use crate::support::Harness;

#[test]
fn first_contact_assigns_address_one() {
    let harness = Harness::new();
    let identity = NodeIdentity::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

    let (status, addr) = harness.announce(identity);
    assert_eq!(status, 0);
    assert_eq!(addr, 1);
}

#[test]
fn duplicate_announcement_returns_the_same_address() {
    let harness = Harness::new();
    let identity = NodeIdentity::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

    let (status1, addr1) = harness.announce(identity);
    let (status2, addr2) = harness.announce(identity);

    assert_eq!((status1, addr1), (0, 1));
    assert_eq!((status2, addr2), (0, 1));
}

#[test]
fn distinct_identities_get_sequential_addresses() {
    let harness = Harness::new();
    for i in 0..5u8 {
        let identity = NodeIdentity::new([0, 0, 0, 0, 0, i]);
        let (status, addr) = harness.announce(identity);
        assert_eq!(status, 0);
        assert_eq!(addr, i + 1);
    }
}
