//! Relayed families with small server-side roles: pings, handoffs,
//! simulator traffic, controller coordination and METAR requests.

use std::sync::Arc;

use super::{
    direct_or_error, require_atc, require_facility, verify_source, HandlerResult, Outcome,
};
use crate::post_office::{Address, Mail, MailKind, RecipientFilter};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::{Handoff, MetarRequest, Ping, Pong, ProController, SquawkboxMessage};
use crate::wire::{ErrorCode, FsdError, SERVER_CALLSIGN};

/// `#PC` subtypes exchanged between any two controllers.
const PC_UNPRIVILEGED: &[&str] = &[
    "VER", "ID", "DI", "IC", "IK", "IB", "IO", "OC", "OK", "OB", "OO", "MC", "MK", "MB", "MO",
];

/// `#PC` subtypes that require holding a facility.
const PC_PRIVILEGED: &[&str] = &[
    "IH", "SC", "GD", "TA", "FA", "VT", "BC", "HC", "PT", "DP", "ST",
];

/// `#SB` subtypes the server is willing to relay.
const SB_RELAYED: &[&str] = &["PIR", "FSIPIR", "PI"];

pub fn ping(state: &Arc<ServerState>, session: &Arc<Session>, packet: &str) -> HandlerResult {
    let pdu = Ping::parse(packet)?;
    verify_source(session, &pdu.from)?;
    if pdu.to == SERVER_CALLSIGN {
        return Ok(Outcome::reply(
            Pong {
                from: SERVER_CALLSIGN.into(),
                to: pdu.from,
                timestamp: pdu.timestamp,
            }
            .serialize(),
        ));
    }
    direct_or_error(state, session, &pdu.to, packet)
}

pub fn handoff(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
    accept: bool,
) -> HandlerResult {
    let pdu = Handoff::parse(packet, accept)?;
    verify_source(session, &pdu.from)?;
    require_facility(session)?;
    direct_or_error(state, session, &pdu.to, packet)
}

pub fn squawkbox(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = SquawkboxMessage::parse(packet)?;
    verify_source(session, &pdu.from)?;
    if !SB_RELAYED.contains(&pdu.subtype.as_str()) {
        return Ok(Outcome::none());
    }
    direct_or_error(state, session, &pdu.to, packet)
}

pub fn pro_controller(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = ProController::parse(packet)?;
    verify_source(session, &pdu.from)?;
    require_atc(session)?;

    let subtype = pdu.subtype.as_str();
    if PC_PRIVILEGED.contains(&subtype) {
        if session.facility() <= 0 {
            return Err(FsdError::generic(ErrorCode::InvalidControl, subtype));
        }
    } else if !PC_UNPRIVILEGED.contains(&subtype) {
        return Err(FsdError::new(ErrorCode::Syntax, subtype, "unknown subtype"));
    }

    // A beacon code assignment is also recorded so the server can answer
    // later flight plan queries with it.
    if subtype == "BC" {
        if let Some(rest) = &pdu.rest {
            let mut parts = rest.splitn(2, ':');
            if let (Some(target), Some(code)) = (parts.next(), parts.next()) {
                if let Some(target_session) = state.post_office.find(target) {
                    target_session.set_beacon_code(code.trim_end().to_owned());
                }
            }
        }
    }

    if pdu.to.starts_with('@') {
        return Ok(Outcome::mail(
            Mail::new(Arc::clone(session), MailKind::GeneralProximity, packet)
                .filtered(RecipientFilter::AtcOnly),
        ));
    }
    direct_or_error(state, session, &pdu.to, packet)
}

pub fn metar_request(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = MetarRequest::parse(packet)?;
    verify_source(session, &pdu.from)?;
    if pdu.to != SERVER_CALLSIGN {
        return Ok(Outcome::none());
    }
    if state.metar.submit(Arc::clone(session), pdu.station.clone()).is_err() {
        return Err(FsdError::new(
            ErrorCode::NoWeatherProfile,
            pdu.station,
            "weather service busy",
        ));
    }
    Ok(Outcome::none())
}
