//! Encode/decode helpers for the two PDU families the gNB speaks: NGAP over
//! N2 and NAS tunnelled inside it. Grounded in the donor's split between
//! `ngap/context/utils.rs` (PER encode/decode around `ngap_models::NgapPdu`)
//! and `nas/gmm.rs` (message-type dispatch over `nas_models::message`).

pub mod convert;
pub mod nas;
pub mod ngap;

pub use convert::ConvertError;
