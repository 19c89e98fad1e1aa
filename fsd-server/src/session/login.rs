//! The login negotiation: `$DI` out, `$ID` in, `#AP`/`#AA` in, credential
//! check, registration. Each step either advances or ends the connection
//! with a single `$ER`.

use std::sync::Arc;

use tracing::info;

use super::connection::Connection;
use super::{Profile, Session, SessionChannels};
use crate::auth::{companion, generate_initial_challenge, jwt, AuthCompanion};
use crate::server::ServerState;
use crate::wire::pdu::{AddAtc, AddPilot, ClientIdentification, ServerIdentification};
use crate::wire::{
    self, ErrorCode, FsdError, NetworkRating, PacketType, CLIENT_CALLSIGN, SERVER_CALLSIGN,
};

pub struct Login {
    pub session: Arc<Session>,
    pub channels: SessionChannels,
    /// `#AP`/`#AA` join announcement for everyone else.
    pub announcement: String,
}

pub enum LoginError {
    /// Write this and close.
    Rejected(FsdError),
    /// The socket went away mid-negotiation; nothing to say.
    Disconnected,
}

impl From<FsdError> for LoginError {
    fn from(err: FsdError) -> Self {
        Self::Rejected(err)
    }
}

fn rejected(code: ErrorCode, param: &str, callsign: &str) -> LoginError {
    LoginError::Rejected(FsdError::generic(code, param).addressed(callsign))
}

pub async fn negotiate(
    state: &Arc<ServerState>,
    connection: &Arc<Connection>,
) -> Result<Login, LoginError> {
    let server_challenge = generate_initial_challenge();
    let greeting = ServerIdentification {
        from: SERVER_CALLSIGN.into(),
        to: CLIENT_CALLSIGN.into(),
        version: state.config.server_name.clone(),
        initial_challenge: server_challenge.clone(),
    };
    connection.write_packet(greeting.serialize(), true).await;

    let packet = read(connection).await?;
    if wire::classify(&packet) != Some(PacketType::ClientIdentification) {
        return Err(LoginError::Rejected(FsdError::new(
            ErrorCode::Syntax,
            "",
            "expected client identification",
        )));
    }
    let ident = ClientIdentification::parse(&packet)?;
    if !companion::known_client(ident.client_id) {
        return Err(rejected(
            ErrorCode::UnauthorizedSoftware,
            "",
            &ident.from,
        ));
    }

    let packet = read(connection).await?;
    let request = match wire::classify(&packet) {
        Some(PacketType::AddPilot) => Request::from_pilot(AddPilot::parse(&packet)?),
        Some(PacketType::AddAtc) => Request::from_atc(AddAtc::parse(&packet)?),
        _ => {
            return Err(LoginError::Rejected(FsdError::new(
                ErrorCode::Syntax,
                "",
                "expected login request",
            )))
        }
    };

    let callsign = request.callsign.clone();
    if !wire::valid_callsign(&callsign) {
        return Err(rejected(ErrorCode::CallsignInvalid, &callsign, &callsign));
    }
    if ident.from != callsign {
        return Err(rejected(ErrorCode::SourceInvalid, &ident.from, &callsign));
    }
    if ident.cid != request.cid {
        return Err(rejected(ErrorCode::InvalidLogon, "", &callsign));
    }
    if request.protocol_revision != wire::PROTO_REVISION_VELOCITY {
        return Err(rejected(
            ErrorCode::InvalidProtocolRevision,
            "",
            &callsign,
        ));
    }

    // Token logins carry their ratings in the claims; password logins pull
    // them from the directory.
    let (assigned, pilot_rating) = if jwt::looks_like_jwt(&request.token) {
        let claims = jwt::verify(&request.token, &state.jwt_secret)
            .map_err(|_| rejected(ErrorCode::InvalidLogon, "", &callsign))?;
        // Admin-channel and web tokens share the secret but are not logons.
        if claims.token_type != jwt::FSD_TOKEN_TYPE {
            return Err(rejected(ErrorCode::InvalidLogon, "", &callsign));
        }
        if claims.cid != request.cid {
            return Err(rejected(ErrorCode::InvalidLogon, "", &callsign));
        }
        (claims.network_rating, claims.pilot_rating)
    } else {
        let record = state
            .directory
            .authenticate(request.cid, &request.token)
            .ok_or_else(|| rejected(ErrorCode::InvalidLogon, "", &callsign))?;
        (record.network_rating, record.pilot_rating)
    };

    let assigned = NetworkRating::from_i32(assigned)
        .ok_or_else(|| rejected(ErrorCode::InvalidLogon, "", &callsign))?;
    if assigned <= NetworkRating::Suspended {
        return Err(rejected(ErrorCode::CertificateSuspended, "", &callsign));
    }
    let requested = request
        .requested_rating
        .ok_or_else(|| rejected(ErrorCode::InvalidLogon, "", &callsign))?;
    if requested > assigned {
        return Err(rejected(ErrorCode::RequestedLevelTooHigh, "", &callsign));
    }

    let auth_verify = AuthCompanion::new(ident.client_id, &server_challenge)
        .map_err(|_| rejected(ErrorCode::UnauthorizedSoftware, "", &callsign))?;
    let auth_self = AuthCompanion::new(ident.client_id, &ident.initial_challenge)
        .map_err(|_| rejected(ErrorCode::UnauthorizedSoftware, "", &callsign))?;

    let profile = Profile {
        callsign: callsign.clone(),
        cid: request.cid,
        real_name: request.real_name.clone(),
        network_rating: assigned,
        pilot_rating,
        protocol_revision: request.protocol_revision,
        simulator_type: request.simulator_type,
        is_atc: request.is_atc,
        client_id: ident.client_id,
    };
    let (session, channels) = Session::new(Arc::clone(connection), profile, auth_verify, auth_self);

    state
        .post_office
        .register(Arc::clone(&session))
        .map_err(|_| rejected(ErrorCode::CallsignInUse, "", &callsign))?;

    info!(
        callsign = %callsign,
        cid = request.cid,
        atc = request.is_atc,
        rating = assigned.as_i32(),
        peer = %connection.peer_addr(),
        "client logged in"
    );

    Ok(Login {
        session,
        channels,
        announcement: request.announcement(assigned),
    })
}

async fn read(connection: &Connection) -> Result<String, LoginError> {
    connection
        .read_packet()
        .await
        .ok_or(LoginError::Disconnected)
}

enum RequestKind {
    Pilot(AddPilot),
    Atc(AddAtc),
}

struct Request {
    callsign: String,
    cid: u32,
    token: String,
    requested_rating: Option<NetworkRating>,
    protocol_revision: u32,
    simulator_type: i32,
    real_name: String,
    is_atc: bool,
    kind: RequestKind,
}

impl Request {
    fn from_pilot(pdu: AddPilot) -> Self {
        Self {
            callsign: pdu.from.clone(),
            cid: pdu.cid,
            token: pdu.token.clone(),
            requested_rating: pdu.requested_rating,
            protocol_revision: pdu.protocol_revision,
            simulator_type: pdu.simulator_type,
            real_name: pdu.real_name.clone(),
            is_atc: false,
            kind: RequestKind::Pilot(pdu),
        }
    }

    fn from_atc(pdu: AddAtc) -> Self {
        Self {
            callsign: pdu.from.clone(),
            cid: pdu.cid,
            token: pdu.token.clone(),
            requested_rating: pdu.requested_rating,
            protocol_revision: pdu.protocol_revision,
            simulator_type: 0,
            real_name: pdu.real_name.clone(),
            is_atc: true,
            kind: RequestKind::Atc(pdu),
        }
    }

    fn announcement(&self, assigned: NetworkRating) -> String {
        match &self.kind {
            RequestKind::Pilot(pdu) => pdu.serialize_announcement(assigned),
            RequestKind::Atc(pdu) => pdu.serialize_announcement(assigned),
        }
    }
}
