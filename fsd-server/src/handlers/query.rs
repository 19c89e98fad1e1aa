//! `$CQ` / `$CR`: the client query table. Some queries the server answers
//! itself; the rest are relayed with a privilege gate keyed on the query
//! type.

use std::sync::Arc;

use super::{
    direct_or_error, require_atc, require_facility, verify_source, HandlerResult, Outcome,
};
use crate::post_office::{Address, Mail, MailKind, RecipientFilter};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::{ClientQuery, ClientQueryResponse};
use crate::wire::{
    ErrorCode, FsdError, NetworkRating, ATC_QUERY_RECIPIENT, PILOT_QUERY_RECIPIENT,
    SERVER_CALLSIGN,
};

/// Queries any ATC client may relay.
const ATC_QUERIES: &[&str] = &["BY", "HI", "HLP", "NOHLP", "WH", "NEWATIS", "NEWINFO"];

/// Queries that additionally require holding a facility.
const FACILITY_QUERIES: &[&str] = &[
    "IT", "DR", "HT", "TA", "FA", "BC", "SC", "VT", "EST", "GD", "IPC",
];

pub fn client_query(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = ClientQuery::parse(packet)?;
    verify_source(session, &pdu.from)?;

    if pdu.to == SERVER_CALLSIGN {
        return server_query(state, session, &pdu);
    }

    let query = pdu.query_type.as_str();
    if ATC_QUERIES.contains(&query) {
        require_atc(session)?;
    } else if FACILITY_QUERIES.contains(&query) {
        require_facility(session)?;
    } else if query == "INF" {
        // Interrogating another client is a supervisor tool.
        if session.network_rating() < NetworkRating::Supervisor {
            return Err(FsdError::generic(ErrorCode::InvalidControl, ""));
        }
    }

    forward_query(state, session, &pdu.to, packet)
}

pub fn client_query_response(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = ClientQueryResponse::parse(packet)?;
    verify_source(session, &pdu.from)?;
    if pdu.to == SERVER_CALLSIGN {
        // Responses to server-side interrogations are absorbed here.
        return Ok(Outcome::none());
    }
    forward_query(state, session, &pdu.to, packet)
}

/// Queries the server answers in place.
fn server_query(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    pdu: &ClientQuery,
) -> HandlerResult {
    match pdu.query_type.as_str() {
        // Is the named client staffing a position? Facility-0 observers
        // answer N.
        "ATC" => {
            let target = pdu.payload.as_deref().unwrap_or(&pdu.from);
            let target_session = state
                .post_office
                .find(target)
                .ok_or_else(|| FsdError::generic(ErrorCode::NoSuchCallsign, target))?;
            let staffed = target_session.facility() > 0;
            let response = ClientQueryResponse {
                from: SERVER_CALLSIGN.into(),
                to: session.callsign().into(),
                query_type: "ATC".into(),
                payload: Some(format!(
                    "{}:{}",
                    if staffed { "Y" } else { "N" },
                    target
                )),
            };
            Ok(Outcome::reply(response.serialize()))
        }
        "IP" => {
            let response = ClientQueryResponse {
                from: SERVER_CALLSIGN.into(),
                to: session.callsign().into(),
                query_type: "IP".into(),
                payload: Some(session.connection().peer_addr().ip().to_string()),
            };
            Ok(Outcome::reply(response.serialize()))
        }
        // A controller pulling up somebody's flight plan.
        "FP" => {
            require_atc(session)?;
            let target = pdu
                .payload
                .as_deref()
                .ok_or_else(|| FsdError::generic(ErrorCode::Syntax, "missing callsign"))?;
            let target_session = state
                .post_office
                .find(target)
                .ok_or_else(|| FsdError::generic(ErrorCode::NoSuchCallsign, target))?;
            let plan = target_session
                .flight_plan()
                .ok_or_else(|| FsdError::generic(ErrorCode::NoFlightPlan, target))?;
            let mut outcome = Outcome::reply(format!("$FP{}:*A:{}\r\n", target, plan));
            let code = target_session.beacon_code().unwrap_or_else(|| "0".into());
            outcome.replies.push(format!(
                "#PC{}:{}:CCP:BC:{}:{}\r\n",
                SERVER_CALLSIGN,
                session.callsign(),
                target,
                code
            ));
            Ok(outcome)
        }
        _ => Ok(Outcome::none()),
    }
}

/// Relays a query or response: broadcast pseudo-recipients fan out by
/// proximity, anything else goes direct.
fn forward_query(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    to: &str,
    packet: &str,
) -> HandlerResult {
    match to {
        ATC_QUERY_RECIPIENT => Ok(Outcome::mail(
            Mail::new(Arc::clone(session), MailKind::GeneralProximity, packet)
                .filtered(RecipientFilter::AtcOnly),
        )),
        PILOT_QUERY_RECIPIENT => Ok(Outcome::mail(Mail::new(
            Arc::clone(session),
            MailKind::GeneralProximity,
            packet,
        ))),
        _ => direct_or_error(state, session, to, packet),
    }
}
