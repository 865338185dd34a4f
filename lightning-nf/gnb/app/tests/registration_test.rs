//! Seed scenario 1 (spec §8): solo registration against a mock AMF. Drives
//! `procedures::run_ue` end to end through `process_ue_initialization` over a
//! loopback N1 socket, playing the AMF's N2 side by hand — there is no real
//! SCTP association here, just the same `NgapPdu` values the shared N2 reader
//! task (`n2::reader_task`) would otherwise decode and push into the UE's
//! inbox.

mod common;

use std::time::Duration;

use gnb_app::context::GnbContext;
use gnb_app::procedures::run_ue;

const AMF_UE_NGAP_ID: u64 = 77;

#[tokio::test]
async fn solo_registration_sends_exact_ngap_sequence() {
	let config = common::test_gnb_config(false, common::free_port().await, None);
	let (gtp_tx, _gtp_rx) = tokio::sync::mpsc::unbounded_channel();
	let (n2_tx, mut n2_out) = tokio::sync::mpsc::unbounded_channel();
	let (gnb, _bind_rx) = GnbContext::new(config, gtp_tx, n2_tx);

	let (gnb_side, mut ue_side) = common::loopback_pair().await;
	let (ue, n2_rx, modify_rx) = gnb.admit_ran_ue(gnb_side).await.expect("admit ran ue");

	let task = tokio::spawn(run_ue(gnb.clone(), ue.clone(), n2_rx, modify_rx));

	common::drive_registration(&ue, &mut ue_side, &mut n2_out, AMF_UE_NGAP_ID, "001", "01", "0000000001").await;

	// process_ue_initialization has now returned: its cached IMSI is visible,
	// and no further N2 traffic follows within the 1s inter-phase pace before
	// setup_n1 moves on to allocate a DL-TEID for PDU session establishment.
	tokio::time::sleep(Duration::from_millis(200)).await;
	assert_eq!(ue.get_imsi().as_deref(), Some(common::expected_imsi("001", "01", "0000000001").as_str()));
	assert!(n2_out.try_recv().is_err(), "exactly 5 N2 messages: InitialUEMessage, 3x UplinkNASTransport, InitialContextSetupResponse");

	task.abort();
}
