//! Seed scenario 5 (spec §8): force the TEID allocator to its 65,535-entry
//! ceiling, then admit one more UE through a full registration. PDU session
//! establishment's `gnb.teid_allocator.allocate()` call in `setup_n1` must
//! fail with `ResourceError::AllocatorExhausted`, which tears the UE down
//! without ever touching the allocator again.

mod common;

use std::time::Duration;

use gnb_app::context::GnbContext;
use gnb_app::procedures::run_ue;

const AMF_UE_NGAP_ID: u64 = 88;

#[tokio::test]
async fn teid_exhaustion_aborts_pdu_establishment_and_releases_the_ue() {
	let config = common::test_gnb_config(false, common::free_port().await, None);
	let (gtp_tx, _gtp_rx) = tokio::sync::mpsc::unbounded_channel();
	let (n2_tx, mut n2_out) = tokio::sync::mpsc::unbounded_channel();
	let (gnb, _bind_rx) = GnbContext::new(config, gtp_tx, n2_tx);

	for _ in 0..65_535 {
		gnb.teid_allocator.allocate().expect("allocator has room");
	}
	assert_eq!(gnb.teid_allocator.len(), 65_535);

	let (gnb_side, mut ue_side) = common::loopback_pair().await;
	let (ue, n2_rx, modify_rx) = gnb.admit_ran_ue(gnb_side).await.expect("admit ran ue");
	let ran_ue_ngap_id = ue.ran_ue_ngap_id;

	let task = tokio::spawn(run_ue(gnb.clone(), ue.clone(), n2_rx, modify_rx));

	common::drive_registration(&ue, &mut ue_side, &mut n2_out, AMF_UE_NGAP_ID, "001", "01", "0000000002").await;

	// Registration succeeded; setup_n1's very next step is the DL-TEID
	// allocation PDU session establishment needs, which the exhausted
	// allocator must refuse. run_ue's own error path releases the UE and
	// returns instead of parking for deregistration.
	tokio::time::timeout(Duration::from_secs(2), task).await.expect("run_ue returns promptly on setup failure").expect("run_ue task did not panic");

	assert_eq!(gnb.teid_allocator.len(), 65_535, "the failed allocation must not have claimed a TEID");
	assert!(gnb.ran_ues.get_async(&ran_ue_ngap_id).await.is_none(), "run_ue releases the UE after setup_n1 fails");
}
