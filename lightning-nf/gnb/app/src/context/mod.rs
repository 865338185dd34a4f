pub mod gnb_context;
pub mod ran_ue;
pub mod xn_ue;

pub use gnb_context::{DataPlanePeer, GnbContext};
pub use ran_ue::{ModifyRequest, RanUe, UeState};
pub use xn_ue::XnUe;
