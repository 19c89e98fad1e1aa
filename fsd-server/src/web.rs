//! Admin HTTP channel. Both endpoints require a service token minted with
//! the server's HS256 secret and an Administrator network rating.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::jwt::{self, SERVICE_TOKEN_TYPE};
use crate::post_office::KillError;
use crate::server::ServerState;
use crate::wire::pdu::KillRequest;
use crate::wire::{NetworkRating, SERVER_CALLSIGN};

const METERS_TO_NM: f64 = 0.000539957;

#[derive(Serialize)]
struct OnlinePilot {
    callsign: String,
    cid: u32,
    real_name: String,
    network_rating: i32,
    pilot_rating: i32,
    latitude: f64,
    longitude: f64,
    altitude: i32,
    ground_speed: i32,
    transponder: String,
    heading: f64,
    logon_time: chrono::DateTime<chrono::Utc>,
    last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct OnlineController {
    callsign: String,
    cid: u32,
    real_name: String,
    network_rating: i32,
    facility: i32,
    frequency: String,
    latitude: f64,
    longitude: f64,
    altitude: i32,
    visual_range_nm: f64,
    logon_time: chrono::DateTime<chrono::Utc>,
    last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct OnlineUsers {
    pilots: Vec<OnlinePilot>,
    atc: Vec<OnlineController>,
}

#[derive(Deserialize)]
struct KickRequest {
    callsign: String,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/online_users", get(online_users))
        .route("/kick_user", post(kick_user))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Bearer token gate: a valid `fsd_service` token at Administrator rating.
fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = jwt::verify(token, &state.jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;
    if claims.token_type != SERVICE_TOKEN_TYPE
        || claims.network_rating < NetworkRating::Administrator.as_i32()
    {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

async fn online_users(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<OnlineUsers>, StatusCode> {
    authorize(&state, &headers)?;

    let mut pilots = Vec::new();
    let mut atc = Vec::new();
    for session in state.post_office.snapshot() {
        let spatial = session.spatial();
        let profile = &session.profile;
        if profile.is_atc {
            atc.push(OnlineController {
                callsign: profile.callsign.clone(),
                cid: profile.cid,
                real_name: profile.real_name.clone(),
                network_rating: profile.network_rating.as_i32(),
                facility: session.facility(),
                frequency: session.frequency(),
                latitude: spatial.latitude,
                longitude: spatial.longitude,
                altitude: spatial.true_altitude,
                visual_range_nm: spatial.visual_range_m * METERS_TO_NM,
                logon_time: session.logon_time,
                last_updated: spatial.last_updated,
            });
        } else {
            pilots.push(OnlinePilot {
                callsign: profile.callsign.clone(),
                cid: profile.cid,
                real_name: profile.real_name.clone(),
                network_rating: profile.network_rating.as_i32(),
                pilot_rating: profile.pilot_rating,
                latitude: spatial.latitude,
                longitude: spatial.longitude,
                altitude: spatial.true_altitude,
                ground_speed: spatial.ground_speed,
                transponder: spatial.transponder.clone(),
                heading: spatial.heading,
                logon_time: session.logon_time,
                last_updated: spatial.last_updated,
            });
        }
    }
    Ok(Json(OnlineUsers { pilots, atc }))
}

async fn kick_user(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<KickRequest>,
) -> StatusCode {
    if let Err(status) = authorize(&state, &headers) {
        return status;
    }

    let packet = KillRequest {
        from: SERVER_CALLSIGN.into(),
        to: request.callsign.clone(),
        reason: "removed by administrator".into(),
    }
    .serialize();
    match state.post_office.kill(&request.callsign, &packet) {
        Ok(()) => {
            info!(callsign = %request.callsign, "kicked via admin channel");
            StatusCode::NO_CONTENT
        }
        Err(KillError::NotRegistered) => StatusCode::NOT_FOUND,
        Err(KillError::Unavailable) => {
            warn!(callsign = %request.callsign, "kick delivery failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
