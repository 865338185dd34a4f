//! Shared fixtures for the gNB's integration tests, mirroring the role
//! `pfcp::mock` plays for the donor's `infinisync/tests/pfcp_test.rs`: a
//! minimal config, a loopback N1 socket pair, and the handful of NAS/NGAP
//! messages a mock AMF or UE needs to drive a procedure end to end.

use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use gnb_app::codec::ngap;
use gnb_app::config::{GnbConfig, GnbIe, PlmnIdIe, SnssaiIe, TaiIe, XnInterfaceIe};
use gnb_app::context::RanUe;
use ngap_models::{AmfUeNgapId, DownlinkNasTransport, InitialContextSetupRequest, InitiatingMessage, NasPdu, NgapPdu, RanUeNgapId, SuccessfulOutcome, UeConfigurationUpdateCommand};
use nf_base::{LoggingConfig, RuntimeConfig, RuntimeType};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

/// A config with every IP bound to loopback and distinct dummy ports; only
/// `nrdc`/`xn_peer` and the management-API port vary per test.
pub fn test_gnb_config(nrdc: bool, xn_port: u16, xn_peer_port: Option<u16>) -> GnbConfig {
	let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
	GnbConfig {
		gnb: GnbIe {
			amf_n2_ip: loopback,
			ran_n2_ip: loopback,
			amf_n2_port: 38412,
			ran_n2_port: 0,
			upf_n3_ip: loopback,
			ran_n3_ip: loopback,
			upf_n3_port: 2152,
			ran_n3_port: 0,
			ran_control_plane_ip: loopback,
			ran_control_plane_port: 0,
			ran_data_plane_ip: loopback,
			ran_data_plane_port: 0,
			management_api_ip: loopback,
			management_api_port: 0,
			ngap_ppid: 0x3c00_0000,
			gnb_id: "gnb-test".to_string(),
			gnb_name: "test-gnb".to_string(),
			plmn_id: PlmnIdIe { mcc: "001".to_string(), mnc: "01".to_string() },
			tai: TaiIe { tac: "000001".to_string(), broadcast_plmn_id: PlmnIdIe { mcc: "001".to_string(), mnc: "01".to_string() } },
			snssai: SnssaiIe { sst: 1, sd: None },
			nrdc,
			xn_interface: XnInterfaceIe { xn_ip: loopback, xn_port },
			xn_peer: xn_peer_port.map(|port| XnInterfaceIe { xn_ip: loopback, xn_port: port }),
		},
		logger: LoggingConfig { enable: false, level: "error".to_string(), report_caller: false },
		runtime: RuntimeConfig { rt_type: RuntimeType::Multi },
	}
}

/// Binds an ephemeral loopback listener, connects to it, and accepts the
/// connection, returning `(accepted, dialed)` — the gNB and UE ends of one
/// N1 socket respectively.
pub async fn loopback_pair() -> (TcpStream, TcpStream) {
	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind loopback listener");
	let addr = listener.local_addr().expect("listener has a local addr");
	let dialed = TcpStream::connect(addr).await.expect("connect to loopback listener");
	let (accepted, _) = listener.accept().await.expect("accept loopback connection");
	(accepted, dialed)
}

/// Returns a free loopback port by binding then immediately dropping a
/// listener — good enough for tests, which bind their own listener on this
/// port moments later.
pub async fn free_port() -> u16 {
	let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("bind ephemeral listener");
	listener.local_addr().expect("listener has a local addr").port()
}

/// A null-scheme `RegistrationRequest`, encoded the way `ue/src/codec/nas.rs`'s
/// `build_registration_request` does, since the gNB crate itself only ever
/// decodes this message (to cache the IMSI), never builds it.
pub fn registration_request_bytes(mcc: &str, mnc: &str, msin: &str) -> Bytes {
	use nas_models::message::GmmMessage;
	use nas_models::types::MobileIdentity;
	let suci = format!("suci-0-{mcc}-{mnc}-0000-0-0-{msin}");
	let mobile_identity = MobileIdentity::Suci(suci.parse().expect("well-formed SUCI"));
	let message = GmmMessage::RegistrationRequest(Box::new(nas_models::message::RegistrationRequest {
		nas_5gs_mobile_identity: mobile_identity.into(),
		ue_security_capability: nas_models::types::UeSecurityCapability { ea: 0b0100_0000, ia: 0b0100_0000, ..Default::default() },
		..Default::default()
	}));
	Bytes::from(message.to_bytes().expect("well-formed registration request"))
}

pub fn expected_imsi(mcc: &str, mnc: &str, msin: &str) -> String {
	format!("imsi-{mcc}{mnc}{msin}")
}

/// Plays the mock AMF's half of §4.4.1 over `ue_side`/`n2_out`: feeds a
/// `RegistrationRequest`, answers the auth/security-mode round trips with
/// opaque placeholder NAS (the gNB never parses these), and acks the
/// `InitialContextSetupRequest`. Returns once the trailing
/// `UEConfigurationUpdateCommand` has been delivered, matching where
/// `process_ue_initialization` itself returns.
pub async fn drive_registration(ue: &RanUe, ue_side: &mut TcpStream, n2_out: &mut UnboundedReceiver<Bytes>, amf_ue_ngap_id: u64, mcc: &str, mnc: &str, msin: &str) {
	let ran_ue_ngap_id = ue.ran_ue_ngap_id as u64;

	gnb_app::n1::write_frame(ue_side, &registration_request_bytes(mcc, mnc, msin)).await.unwrap();
	let initial_ue_message = ngap::decode_ngap_pdu(&n2_out.recv().await.unwrap()).unwrap();
	assert!(matches!(initial_ue_message, NgapPdu::InitiatingMessage(InitiatingMessage::InitialUeMessage(_))));

	ue.n2_inbox
		.send(NgapPdu::InitiatingMessage(InitiatingMessage::DownlinkNasTransport(DownlinkNasTransport {
			amf_ue_ngap_id: AmfUeNgapId(amf_ue_ngap_id),
			ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id),
			nas_pdu: NasPdu(b"authentication-request".to_vec()),
			..Default::default()
		})))
		.unwrap();
	gnb_app::n1::read_frame(ue_side).await.expect("authentication request forwarded to N1");

	gnb_app::n1::write_frame(ue_side, b"authentication-response").await.unwrap();
	expect_uplink_nas_transport(&n2_out.recv().await.unwrap());

	ue.n2_inbox
		.send(NgapPdu::InitiatingMessage(InitiatingMessage::DownlinkNasTransport(DownlinkNasTransport {
			amf_ue_ngap_id: AmfUeNgapId(amf_ue_ngap_id),
			ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id),
			nas_pdu: NasPdu(b"security-mode-command".to_vec()),
			..Default::default()
		})))
		.unwrap();
	gnb_app::n1::read_frame(ue_side).await.expect("security mode command forwarded to N1");

	gnb_app::n1::write_frame(ue_side, b"security-mode-complete").await.unwrap();
	expect_uplink_nas_transport(&n2_out.recv().await.unwrap());

	ue.n2_inbox
		.send(NgapPdu::InitiatingMessage(InitiatingMessage::InitialContextSetupRequest(InitialContextSetupRequest {
			amf_ue_ngap_id: AmfUeNgapId(amf_ue_ngap_id),
			ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id),
			..Default::default()
		})))
		.unwrap();
	let initial_context_setup_response = ngap::decode_ngap_pdu(&n2_out.recv().await.unwrap()).unwrap();
	assert!(matches!(initial_context_setup_response, NgapPdu::SuccessfulOutcome(SuccessfulOutcome::InitialContextSetupResponse(_))));

	gnb_app::n1::write_frame(ue_side, b"registration-complete").await.unwrap();
	expect_uplink_nas_transport(&n2_out.recv().await.unwrap());

	ue.n2_inbox
		.send(NgapPdu::InitiatingMessage(InitiatingMessage::UeConfigurationUpdateCommand(UeConfigurationUpdateCommand {
			amf_ue_ngap_id: AmfUeNgapId(amf_ue_ngap_id),
			ran_ue_ngap_id: RanUeNgapId(ran_ue_ngap_id),
			..Default::default()
		})))
		.unwrap();
}

pub fn expect_uplink_nas_transport(bytes: &Bytes) {
	let pdu = ngap::decode_ngap_pdu(bytes).unwrap();
	assert!(matches!(pdu, NgapPdu::InitiatingMessage(InitiatingMessage::UplinkNasTransport(_))));
}
