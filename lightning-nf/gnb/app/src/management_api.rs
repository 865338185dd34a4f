//! The management-API HTTP surface (C10): a small `axum` server exposing gNB
//! info and the NR-DC modify-indication trigger to the external console,
//! grounded in the donor's `sbi::start_server` (graceful-shutdown-via-listener
//! pattern, `TraceLayer` request logging) and in
//! `original_source/console/model/gnb.go`'s `GnbInfo`/`SnssaiIE` JSON shape.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::context::GnbContext;
use crate::error::{ManagementApiError, SupervisorError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnssaiInfo {
	sst: u8,
	sd: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RanUeInfo {
	imsi: String,
	nrdc_indicator: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct XnUeInfo {
	imsi: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GnbInfo {
	gnb_id: String,
	gnb_name: String,
	plmn_id: String,
	snssai: SnssaiInfo,
	ran_ue_list: Vec<RanUeInfo>,
	xn_ue_list: Vec<XnUeInfo>,
}

async fn get_gnb_info(State(gnb): State<Arc<GnbContext>>) -> Json<GnbInfo> {
	let mut ran_ue_list = Vec::new();
	gnb.ran_ues
		.scan_async(|_, ue| {
			if let Some(imsi) = ue.get_imsi() {
				ran_ue_list.push(RanUeInfo { imsi, nrdc_indicator: ue.is_nrdc_active() });
			}
		})
		.await;

	let mut xn_ue_list = Vec::new();
	gnb.xn_ues.scan_async(|imsi, _| xn_ue_list.push(XnUeInfo { imsi: imsi.clone() })).await;

	Json(GnbInfo {
		gnb_id: gnb.config.gnb.gnb_id.clone(),
		gnb_name: gnb.config.gnb.gnb_name.clone(),
		plmn_id: format!("{}{}", gnb.config.gnb.plmn_id.mcc, gnb.config.gnb.plmn_id.mnc),
		snssai: SnssaiInfo { sst: gnb.config.gnb.snssai.sst, sd: gnb.config.gnb.snssai.sd.clone() },
		ran_ue_list,
		xn_ue_list,
	})
}

#[derive(Deserialize)]
struct NrdcRequest {
	imsi: String,
}

async fn run_modify_indication(gnb: &GnbContext, imsi: &str) -> Result<(), ManagementApiError> {
	let ue = gnb.find_ran_ue_by_imsi(imsi).await.ok_or_else(|| ManagementApiError::UeNotFound(imsi.to_string()))?;
	let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
	ue.modify_requests
		.send(reply_tx)
		.map_err(|_| ManagementApiError::Procedure(crate::error::ProcedureError::InvalidState("UE task no longer running")))?;
	reply_rx.await.map_err(|_| ManagementApiError::Procedure(crate::error::ProcedureError::InvalidState("UE task dropped the reply channel")))??;
	Ok(())
}

async fn post_ue_nrdc(State(gnb): State<Arc<GnbContext>>, Json(request): Json<NrdcRequest>) -> StatusCode {
	match run_modify_indication(&gnb, &request.imsi).await {
		Ok(()) => StatusCode::OK,
		Err(ManagementApiError::UeNotFound(_)) => StatusCode::NOT_FOUND,
		Err(e) => {
			warn!(imsi = %request.imsi, error = %e, "modify-indication procedure failed");
			StatusCode::INTERNAL_SERVER_ERROR
		}
	}
}

fn router(gnb: Arc<GnbContext>) -> Router {
	Router::new()
		.route("/api/gnb/info", get(get_gnb_info))
		.route("/api/gnb/ue/nrdc", post(post_ue_nrdc))
		.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
		.with_state(gnb)
}

/// Serves the management API until `shutdown` is cancelled, mirroring the
/// donor's `axum::serve(...).with_graceful_shutdown(...)` call.
pub async fn serve(addr: SocketAddr, gnb: Arc<GnbContext>, shutdown: CancellationToken) -> Result<(), SupervisorError> {
	let listener = TcpListener::bind(addr).await.map_err(|source| crate::error::TransportError::ListenerBindingError { addr, source })?;
	info!(%addr, "management API listening");
	axum::serve(listener, router(gnb))
		.with_graceful_shutdown(async move { shutdown.cancelled().await })
		.await
		.map_err(|source| crate::error::TransportError::ListenerBindingError { addr, source })?;
	Ok(())
}
