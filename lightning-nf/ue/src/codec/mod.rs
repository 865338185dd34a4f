//! NAS codec (C1, UE side): builds every NAS message the UE originates and
//! decodes every NAS message it receives. Unlike the gNB, which only ever
//! peeks at the mobile identity of a `RegistrationRequest` it forwards
//! opaquely, the UE is a full NAS endpoint — every message on both sides of
//! the wire is grounded in `nas_models::message::GmmMessage`, the same enum
//! the gNB crate's `codec/nas.rs` decodes against.

pub mod convert;
pub mod nas;
