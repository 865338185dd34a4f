//! gNB configuration, mirroring `original_source/model/gnb.go`'s
//! `GnbConfig{Gnb GnbIE, Logger LoggerIE}` field set, expressed the donor's
//! way: a YAML document validated with `serde_valid` and only ever
//! constructed through [`SerdeValidated`].

use std::net::IpAddr;

use nf_base::{LoggingConfig, NfConfig, RuntimeConfig};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GnbConfig {
	#[validate]
	pub gnb: GnbIe,
	pub logger: LoggingConfig,
	pub runtime: RuntimeConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GnbIe {
	pub amf_n2_ip: IpAddr,
	pub ran_n2_ip: IpAddr,
	pub amf_n2_port: u16,
	pub ran_n2_port: u16,

	pub upf_n3_ip: IpAddr,
	pub ran_n3_ip: IpAddr,
	pub upf_n3_port: u16,
	pub ran_n3_port: u16,

	pub ran_control_plane_ip: IpAddr,
	pub ran_control_plane_port: u16,
	pub ran_data_plane_ip: IpAddr,
	pub ran_data_plane_port: u16,

	/// Bind address for the management-API HTTP server (C10). The donor's
	/// console server is configured the same way, by a bare `port` field
	/// (`ConsoleConfig.Console.Port`); this engine additionally binds an
	/// explicit IP since the gNB process, unlike the console, is not always
	/// meant to listen on every interface.
	pub management_api_ip: IpAddr,
	pub management_api_port: u16,

	pub ngap_ppid: u32,

	pub gnb_id: String,
	pub gnb_name: String,

	#[validate]
	pub plmn_id: PlmnIdIe,
	#[validate]
	pub tai: TaiIe,
	#[validate]
	pub snssai: SnssaiIe,

	/// Static NR-DC flag: when set, every session-1 PDU establishment
	/// attempts to bring up a secondary Xn leg by dialling `xn_peer`.
	pub nrdc: bool,
	/// This gNB's own Xn listen address, serving the secondary role for
	/// whichever other gNB dials in.
	#[validate]
	pub xn_interface: XnInterfaceIe,
	/// The secondary gNB to dial when `nrdc` is set. Required iff `nrdc`;
	/// a gNB that only ever serves as someone else's secondary leaves this
	/// unset.
	#[validate]
	pub xn_peer: Option<XnInterfaceIe>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct XnInterfaceIe {
	pub xn_ip: IpAddr,
	pub xn_port: u16,
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

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaiIe {
	#[validate(min_length = 6)]
	#[validate(max_length = 6)]
	pub tac: String,
	#[validate]
	pub broadcast_plmn_id: PlmnIdIe,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SnssaiIe {
	pub sst: u8,
	pub sd: Option<String>,
}

impl NfConfig for GnbConfig {
	fn get_log_config(&self) -> &LoggingConfig {
		&self.logger
	}

	fn get_runtime_config(&self) -> &RuntimeConfig {
		&self.runtime
	}
}

/// Refuses to hand out a config value until it has been validated, the
/// donor's `config.rs` pattern.
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
