//! Seed scenarios 3 and 4 (spec §8): NR-DC static setup followed by the
//! modify-indication toggle. The secondary leg is a real second
//! [`gnb_app::xn::accept_loop`] rather than a hand-rolled Xn reply, so the
//! fix to the secondary's UL-TEID extraction (`additionalUL-NGU-UP-TNL-Information`,
//! not the primary's own `UL-NGU-UP-TNL-Information`) is exercised for real.

mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use gnb_app::codec::ngap;
use gnb_app::context::GnbContext;
use gnb_app::procedures::run_ue;
use ngap_models::{
	AmfUeNgapId,
	GtpTeid,
	GtpTunnel,
	InitiatingMessage,
	NasPdu,
	NgapPdu,
	PduSessionId,
	PduSessionResourceModifyConfirm,
	PduSessionResourceSetupItemSuReq,
	PduSessionResourceSetupListSuReq,
	PduSessionResourceSetupRequest,
	PduSessionResourceSetupRequestTransfer,
	PduSessionResourceSetupResponse,
	PduSessionResourceSetupResponseTransfer,
	RanUeNgapId,
	SuccessfulOutcome,
	TransportLayerAddress,
	UpTransportLayerInformation,
	UpTransportLayerInformationItem,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const AMF_UE_NGAP_ID: u64 = 99;
const PRIMARY_UL_TEID: u32 = 0x0000_0010;
const SECONDARY_UL_TEID: u32 = 0x0000_0020;

fn gtp_tunnel(teid: u32) -> UpTransportLayerInformation {
	UpTransportLayerInformation::GtpTunnel(GtpTunnel {
		gtp_teid: GtpTeid(teid.to_be_bytes().to_vec()),
		transport_layer_address: TransportLayerAddress(Ipv4Addr::LOCALHOST.octets().to_vec()),
	})
}

fn encode_transfer(transfer: &PduSessionResourceSetupRequestTransfer) -> Vec<u8> {
	use asn1_per::{CodecDataAllocator, PerCodec};
	let mut allocator = <PduSessionResourceSetupRequestTransfer as PerCodec>::Allocator::new_codec_data();
	transfer.encode(&mut allocator).expect("transfer encodes");
	allocator.into_bytes()
}

/// Builds the session-1 setup request transfer the master decodes for its
/// own UL-TEID, plus the `additionalUL-NGU-UP-TNL-Information[0]` the
/// secondary gNB reads for its own (§4.7 step 2).
fn session1_transfer() -> Vec<u8> {
	let transfer = PduSessionResourceSetupRequestTransfer {
		ul_ngu_up_tnl_information: gtp_tunnel(PRIMARY_UL_TEID),
		additional_ul_ngu_up_tnl_information: Some(vec![UpTransportLayerInformationItem {
			ngu_up_tnl_information: gtp_tunnel(SECONDARY_UL_TEID),
			..Default::default()
		}]),
		..Default::default()
	};
	encode_transfer(&transfer)
}

fn session2_transfer(ul_teid: u32) -> Vec<u8> {
	let transfer = PduSessionResourceSetupRequestTransfer { ul_ngu_up_tnl_information: gtp_tunnel(ul_teid), ..Default::default() };
	encode_transfer(&transfer)
}

fn setup_request_pdu(ran_ue_ngap_id: u32, pdu_session_id: u8, transfer: Vec<u8>) -> NgapPdu {
	let item = PduSessionResourceSetupItemSuReq {
		pdu_session_id: PduSessionId(pdu_session_id),
		pdu_session_nas_pdu: Some(NasPdu(format!("pdu-session-{pdu_session_id}-accept").into_bytes())),
		pdu_session_resource_setup_request_transfer: transfer,
		..Default::default()
	};
	NgapPdu::InitiatingMessage(InitiatingMessage::PduSessionResourceSetupRequest(PduSessionResourceSetupRequest {
		amf_ue_ngap_id: AmfUeNgapId(AMF_UE_NGAP_ID),
		ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id as u64),
		pdu_session_resource_setup_list_su_req: PduSessionResourceSetupListSuReq(vec![item]),
		..Default::default()
	}))
}

fn decode_setup_response_transfer(bytes: &bytes::Bytes) -> PduSessionResourceSetupResponseTransfer {
	let pdu = ngap::decode_ngap_pdu(bytes).expect("setup response decodes");
	let NgapPdu::SuccessfulOutcome(SuccessfulOutcome::PduSessionResourceSetupResponse(PduSessionResourceSetupResponse {
		pdu_session_resource_setup_list_su_res,
		..
	})) = pdu
	else {
		panic!("expected PDUSessionResourceSetupResponse");
	};
	let item = pdu_session_resource_setup_list_su_res.into_iter().next().expect("one session item in the response");
	PduSessionResourceSetupResponseTransfer::from_bytes(&item.pdu_session_resource_setup_response_transfer).expect("transfer decodes")
}

#[tokio::test]
async fn nrdc_static_setup_then_modify_indication_toggle() {
	let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);

	// Secondary gNB: a real accept_loop, so the fixed UL-TEID extraction is
	// exercised end to end rather than asserted against a canned reply.
	let secondary_config = common::test_gnb_config(false, common::free_port().await, None);
	let (secondary_gtp_tx, _secondary_gtp_rx) = tokio::sync::mpsc::unbounded_channel();
	let (secondary_n2_tx, _secondary_n2_out) = tokio::sync::mpsc::unbounded_channel();
	let (secondary_gnb, _secondary_bind_rx) = GnbContext::new(secondary_config, secondary_gtp_tx, secondary_n2_tx);
	let xn_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind xn listener");
	let xn_port = xn_listener.local_addr().unwrap().port();
	let secondary_shutdown = CancellationToken::new();
	tokio::spawn(gnb_app::xn::accept_loop(xn_listener, secondary_gnb.clone(), loopback, secondary_shutdown.clone()));

	// Master gNB: NR-DC on, dialling the secondary above.
	let master_config = common::test_gnb_config(true, common::free_port().await, Some(xn_port));
	let (master_gtp_tx, _master_gtp_rx) = tokio::sync::mpsc::unbounded_channel();
	let (master_n2_tx, mut n2_out) = tokio::sync::mpsc::unbounded_channel();
	let (master_gnb, _master_bind_rx) = GnbContext::new(master_config, master_gtp_tx, master_n2_tx);

	let (gnb_side, mut ue_side) = common::loopback_pair().await;
	let (ue, n2_rx, modify_rx) = master_gnb.admit_ran_ue(gnb_side).await.expect("admit ran ue");
	let ran_ue_ngap_id = ue.ran_ue_ngap_id;

	tokio::spawn(run_ue(master_gnb.clone(), ue.clone(), n2_rx, modify_rx));

	common::drive_registration(&ue, &mut ue_side, &mut n2_out, AMF_UE_NGAP_ID, "001", "01", "0000000003").await;

	// Session 1: UE requests, AMF answers with a transfer carrying both the
	// primary UL-TEID and the secondary's additional UL-TEID.
	gnb_app::n1::write_frame(&mut ue_side, b"pdu-session-1-establishment-request").await.unwrap();
	common::expect_uplink_nas_transport(&n2_out.recv().await.unwrap());
	ue.n2_inbox.send(setup_request_pdu(ran_ue_ngap_id, 1, session1_transfer())).unwrap();

	let nas_accept_1 = gnb_app::n1::read_frame(&mut ue_side).await.expect("session 1 NAS accept forwarded to N1");
	assert_eq!(&nas_accept_1[..], b"pdu-session-1-accept");

	let response_1 = decode_setup_response_transfer(&n2_out.recv().await.unwrap());
	assert!(response_1.additional_dl_qos_flow_per_tnl_information.is_some(), "session 1 response must carry the secondary's tunnel");

	// Session 2 (NR-DC's second leg): its primary tunnel *is* the secondary's,
	// cached from session 1 — no further Xn round trip.
	gnb_app::n1::write_frame(&mut ue_side, b"pdu-session-2-establishment-request").await.unwrap();
	common::expect_uplink_nas_transport(&n2_out.recv().await.unwrap());
	ue.n2_inbox.send(setup_request_pdu(ran_ue_ngap_id, 2, session2_transfer(PRIMARY_UL_TEID))).unwrap();

	let nas_accept_2 = gnb_app::n1::read_frame(&mut ue_side).await.expect("session 2 NAS accept forwarded to N1");
	assert_eq!(&nas_accept_2[..], b"pdu-session-2-accept");
	let _response_2 = n2_out.recv().await.unwrap();

	// Scenario 4: the console triggers modify-indication directly through the
	// UE's request channel, the same path `management_api::post_ue_nrdc` uses.
	tokio::time::sleep(Duration::from_millis(100)).await;
	let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
	ue.modify_requests.send(reply_tx).expect("UE task is still running");

	let modify_indication = ngap::decode_ngap_pdu(&n2_out.recv().await.unwrap()).expect("modify indication decodes");
	assert!(matches!(modify_indication, NgapPdu::InitiatingMessage(InitiatingMessage::PduSessionResourceModifyIndication(_))));

	ue.n2_inbox
		.send(NgapPdu::SuccessfulOutcome(SuccessfulOutcome::PduSessionResourceModifyConfirm(PduSessionResourceModifyConfirm {
			amf_ue_ngap_id: AmfUeNgapId(AMF_UE_NGAP_ID),
			ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id as u64),
			..Default::default()
		})))
		.unwrap();

	let tunnel_update = gnb_app::n1::read_frame(&mut ue_side).await.expect("tunnel update written to N1");
	assert_eq!(&tunnel_update[..], gnb_app::n1::TUNNEL_UPDATE.as_bytes());

	reply_rx.await.expect("modify-indication reply channel not dropped").expect("modify-indication procedure succeeds");
	assert!(ue.is_nrdc_active(), "the first modify-indication toggle turns NR-DC on");

	secondary_shutdown.cancel();
}
