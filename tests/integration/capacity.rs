//! Scenario 3: registry capacity overflow at 254 entries.

use h42_can_bridge::identity::NodeIdentity;

use crate::support::Harness;

#[test]
fn the_255th_distinct_identity_is_rejected() {
    let harness = Harness::new();

    for i in 0..254u16 {
        let bytes = i.to_be_bytes();
        let identity = NodeIdentity::new([0, 0, 0, 0, bytes[0], bytes[1]]);
        let (status, addr) = harness.announce(identity);
        assert_eq!(status, 0, "registration {i} should succeed");
        assert_eq!(addr, (i + 1) as u8);
    }

    let one_too_many = NodeIdentity::new([0xFF; 6]);
    let (status, addr) = harness.announce(one_too_many);
    assert_ne!(status, 0, "the 255th distinct identity must be rejected");
    assert_eq!(addr, 0);
}
