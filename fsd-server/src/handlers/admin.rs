//! Supervisor kills and voluntary departures.

use std::sync::Arc;

use super::{verify_source, HandlerResult, Outcome};
use crate::post_office::Address;
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::{Delete, KillRequest, TextMessage};
use crate::wire::{ErrorCode, FsdError, NetworkRating, SERVER_CALLSIGN};

pub fn kill_request(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = KillRequest::parse(packet)?;
    verify_source(session, &pdu.from)?;

    // Unprivileged kill attempts are dropped without acknowledgement.
    if session.network_rating() < NetworkRating::Supervisor {
        return Ok(Outcome::none());
    }

    let note = match state.post_office.kill(&pdu.to, packet) {
        Ok(()) => format!("killed {}", pdu.to),
        Err(err) => format!("unable to kill {}: {}", pdu.to, err),
    };
    Ok(Outcome::reply(
        TextMessage {
            from: SERVER_CALLSIGN.into(),
            to: session.callsign().into(),
            message: note,
        }
        .serialize(),
    ))
}

/// `#DP` / `#DA`. The departure announcement itself is broadcast by the
/// connection teardown path, which also covers clients that just drop.
pub fn delete(session: &Arc<Session>, packet: &str, atc: bool) -> HandlerResult {
    let pdu = Delete::parse(packet, atc)?;
    verify_source(session, &pdu.from)?;
    if pdu.cid != session.profile.cid {
        return Err(FsdError::new(
            ErrorCode::Syntax,
            "",
            "CID does not match session",
        ));
    }
    Ok(Outcome {
        replies: Vec::new(),
        mail: Vec::new(),
        disconnect: true,
    })
}
