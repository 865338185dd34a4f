//! Xn wire-frame round trip: the `uint16BE imsi_len ∥ imsi ∥ payload` layout
//! `XnPdu` uses between a master and a secondary gNB, promised by
//! SPEC_FULL.md's ambient-stack test-tooling section.

use bytes::Bytes;
use gnb_app::xn::XnPdu;

#[test]
fn frame_round_trips_imsi_and_payload() {
	let frame = XnPdu::new("imsi-001010000000001", Bytes::from_static(b"raw NGAP payload"));
	let encoded = frame.encode();

	let decoded = XnPdu::decode(encoded).expect("well-formed frame decodes");
	assert_eq!(decoded.imsi, "imsi-001010000000001");
	assert_eq!(decoded.payload, Bytes::from_static(b"raw NGAP payload"));
}

#[test]
fn frame_survives_an_empty_payload() {
	let frame = XnPdu::new("imsi-001010000000002", Bytes::new());
	let decoded = XnPdu::decode(frame.encode()).expect("well-formed frame decodes");
	assert_eq!(decoded.imsi, "imsi-001010000000002");
	assert!(decoded.payload.is_empty());
}

#[test]
fn decode_rejects_a_length_prefix_longer_than_the_frame() {
	// 2-byte length prefix claiming a 9000-byte imsi, no body at all.
	let malformed = Bytes::from_static(&[0x23, 0x28]);
	let err = XnPdu::decode(malformed).unwrap_err();
	assert!(matches!(err, gnb_app::error::XnError::MalformedFrame(_)));
}
