//! Small, independently-testable wire encodings shared by the NGAP and Xn
//! codecs: PLMN identity, TAC, S-NSSAI and 5G-S-TMSI packing.
//!
//! Unlike the core network functions this workspace was adapted from, the
//! gNB has no SBI surface, so these helpers convert directly between the
//! plain config/context types and the ASN.1 wire types instead of going
//! through an intermediate OpenAPI model.

pub mod five_g_s_tmsi;
pub mod gnb_id;
pub mod plmn;
pub mod snssai;
pub mod tac;

pub use five_g_s_tmsi::build_five_g_s_tmsi;
pub use gnb_id::gnb_id_to_u32_and_bits;
pub use plmn::{ConvertError, plmn_id_to_bytes, plmn_id_to_string, string_to_plmn_id};
pub use snssai::{snssai_sd_to_bytes, snssai_to_ngap};
pub use tac::{bytes_to_tac, tac_to_bytes};
