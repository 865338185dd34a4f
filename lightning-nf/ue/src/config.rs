//! UE configuration, mirroring `original_source/model/ue.go`'s
//! `UeConfig{Ue UeIE, Logger LoggerIE}` field set verbatim for every field
//! the original donor UE already had, extended with the handful of fields
//! this engine's §4.8 data plane and NR-DC support need that the donor never
//! implemented (data-plane dial address, TUN name prefix, secondary gNB).

use std::net::IpAddr;

use nf_base::{LoggingConfig, NfConfig, RuntimeConfig};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UeConfig {
	#[validate]
	pub ue: UeIe,
	pub logger: LoggingConfig,
	pub runtime: RuntimeConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UeIe {
	/// Control-plane dial address, the donor's `ranIp`/`ranPort` verbatim.
	pub ran_ip: IpAddr,
	pub ran_port: u16,

	/// Data-plane dial address for PDU session 1. The donor UE never
	/// implemented a data plane; this pairs with the gNB's own
	/// `ranDataPlaneIp`/`ranDataPlanePort` listen address.
	pub ran_data_plane_ip: IpAddr,
	pub ran_data_plane_port: u16,

	#[validate]
	pub plmn_id: PlmnIdIe,
	pub msin: String,

	#[validate]
	pub ciphering_algorithm: CipheringAlgorithmIe,
	#[validate]
	pub integrity_algorithm: IntegrityAlgorithmIe,

	pub access_type: AccessType,

	#[validate]
	pub authentication_subscription: AuthenticationSubscriptionIe,

	/// Bring up a second PDU session (NR-DC) whose data plane is dialled
	/// toward this secondary gNB once the control plane signals `"tunnel
	/// update"`, matching the gNB's own `nrdc`/`xnPeer` pairing.
	#[validate]
	pub nrdc: Option<NrdcIe>,

	/// TUN device base name; session `i` brings up `"{prefix}{i}"`.
	pub tun_name_prefix: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NrdcIe {
	pub secondary_ran_data_plane_ip: IpAddr,
	pub secondary_ran_data_plane_port: u16,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlmnIdIe {
	#[validate(min_length = 3)]
	#[validate(max_length = 3)]
	pub mcc: String,
	#[validate(min_length = 2)]
	#[validate(max_length = 3)]
	pub mnc: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CipheringAlgorithmIe {
	#[default]
	pub nea0: bool,
	pub nea1: bool,
	pub nea2: bool,
	pub nea3: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityAlgorithmIe {
	#[default]
	pub nia0: bool,
	pub nia1: bool,
	pub nia2: bool,
	pub nia3: bool,
}

/// `original_source/model/ue.go`'s `AccessType` field, typed against the
/// free5gc `models.AccessType` string values instead of the donor's bare
/// `models` package import since this engine has no SBI model dependency.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
	#[serde(rename = "3GPP_ACCESS")]
	ThreeGppAccess,
	#[serde(rename = "NON_3GPP_ACCESS")]
	NonThreeGppAccess,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSubscriptionIe {
	pub enc_permanent_key: String,
	pub enc_opc_key: String,
	pub authentication_management_field: String,
	pub sequence_number: String,
}

impl NfConfig for UeConfig {
	fn get_log_config(&self) -> &LoggingConfig {
		&self.logger
	}

	fn get_runtime_config(&self) -> &RuntimeConfig {
		&self.runtime
	}
}

pub struct SerdeValidated<T>(T);

impl<T: Validate> SerdeValidated<T> {
	pub fn new(value: T) -> Result<Self, serde_valid::validation::Errors> {
		value.validate()?;
		Ok(SerdeValidated(value))
	}

	pub fn inner(&self) -> &T {
		&self.0
	}

	pub fn into_inner(self) -> T {
		self.0
	}
}
