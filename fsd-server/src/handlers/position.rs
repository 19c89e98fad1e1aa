//! Position reports: the slow `@` report, the high-rate `^`/`#SL`/`#ST`
//! family, and ATC `%` reports. All of them relay the original packet
//! bytes; the server only reads the fields it tracks.

use std::sync::Arc;

use super::{verify_source, HandlerResult, Outcome};
use crate::post_office::{Address, Mail, MailKind, RecipientFilter, METERS_PER_NM};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::{
    AtcPosition, FastPilotPosition, FastPositionKind, PilotPosition, SendFast,
};
use crate::wire::{
    ErrorCode, FacilityType, FsdError, PROTO_REVISION_VELOCITY, SERVER_CALLSIGN,
};

/// Two clients closer than this exchange fast position updates.
const SEND_FAST_THRESHOLD_M: f64 = 5.0 * METERS_PER_NM;

pub fn pilot_position(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = PilotPosition::parse(packet)?;
    verify_source(session, &pdu.from)?;

    session.update_pilot_position(&pdu);
    state
        .post_office
        .set_location(session, pdu.latitude, pdu.longitude);

    let mut outcome = Outcome::none();

    // Send-fast hysteresis, driven by the peer distance measured during the
    // previous report's fan-out.
    if !session.is_atc() && session.protocol_revision() == PROTO_REVISION_VELOCITY {
        let closest = session.closest_velocity_peer_m();
        let enabled = session.send_fast_enabled();
        let toggle = if enabled && closest > SEND_FAST_THRESHOLD_M {
            Some(false)
        } else if !enabled && closest < SEND_FAST_THRESHOLD_M {
            Some(true)
        } else {
            None
        };
        if let Some(enable) = toggle {
            session.set_send_fast(enable);
            outcome.replies.push(
                SendFast {
                    from: SERVER_CALLSIGN.into(),
                    to: session.callsign().into(),
                    enabled: enable,
                }
                .serialize(),
            );
        }
    }

    outcome.mail.push(Mail::new(
        Arc::clone(session),
        MailKind::GeneralProximity,
        packet,
    ));
    Ok(outcome)
}

pub fn fast_position(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
    kind: FastPositionKind,
) -> HandlerResult {
    let pdu = FastPilotPosition::parse(packet, kind)?;
    verify_source(session, &pdu.from)?;

    // Only velocity-capable pilots emit these; anything else is noise.
    if session.is_atc() || session.protocol_revision() != PROTO_REVISION_VELOCITY {
        return Ok(Outcome::none());
    }

    // The fast variant arrives between slow reports and does not move the
    // spatial bookkeeping; the slow and stopped variants replace it.
    if kind != FastPositionKind::Fast {
        session.update_fast_position(pdu.latitude, pdu.longitude);
        state
            .post_office
            .set_location(session, pdu.latitude, pdu.longitude);
    }

    Ok(Outcome::mail(
        Mail::new(Arc::clone(session), MailKind::CloseProximity, packet)
            .filtered(RecipientFilter::VelocityCapable),
    ))
}

pub fn atc_position(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = AtcPosition::parse(packet)?;
    verify_source(session, &pdu.from)?;
    super::require_atc(session)?;

    let facility = FacilityType::from_i32(pdu.facility)
        .ok_or_else(|| FsdError::generic(ErrorCode::Syntax, "invalid facility"))?;

    // A controller claiming a position above their rating is removed.
    if session.network_rating() < facility.minimum_rating() {
        let err = FsdError::generic(ErrorCode::InvalidPositionForRating, "")
            .addressed(session.callsign());
        return Ok(Outcome {
            replies: vec![err.serialize()],
            mail: Vec::new(),
            disconnect: true,
        });
    }

    session.update_atc_position(&pdu);
    state
        .post_office
        .set_location(session, pdu.latitude, pdu.longitude);

    Ok(Outcome::mail(Mail::new(
        Arc::clone(session),
        MailKind::GeneralProximity,
        packet,
    )))
}
