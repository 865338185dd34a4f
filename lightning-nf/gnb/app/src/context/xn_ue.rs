//! Per-UE state as seen from the secondary-gNB side of an Xn Dual
//! Connectivity leg. Analogous to [`super::ran_ue::RanUe`] but tracks only
//! what the secondary needs: its own allocated DL-TEID and the UL-TEID the
//! master handed it in the setup-request-transfer.

use std::sync::Mutex;

pub struct XnUe {
	pub imsi: String,
	pub dl_teid: Mutex<Option<u32>>,
	pub ul_teid: Mutex<Option<u32>>,
}

impl XnUe {
	pub fn new(imsi: String) -> Self {
		Self { imsi, dl_teid: Mutex::new(None), ul_teid: Mutex::new(None) }
	}

	pub fn set_dl_teid(&self, teid: u32) {
		*self.dl_teid.lock().expect("XnUe.dl_teid mutex poisoned") = Some(teid);
	}

	pub fn get_dl_teid(&self) -> Option<u32> {
		*self.dl_teid.lock().expect("XnUe.dl_teid mutex poisoned")
	}

	pub fn set_ul_teid(&self, teid: u32) {
		*self.ul_teid.lock().expect("XnUe.ul_teid mutex poisoned") = Some(teid);
	}

	pub fn get_ul_teid(&self) -> Option<u32> {
		*self.ul_teid.lock().expect("XnUe.ul_teid mutex poisoned")
	}

	pub fn release(&self, teid_alloc: &crate::ids::IdAllocator) {
		if let Some(teid) = self.get_dl_teid() {
			teid_alloc.release(teid);
		}
	}
}
