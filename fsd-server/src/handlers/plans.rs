//! Flight plan filing and amendment. Plans are opaque blobs stored on the
//! owning session and fanned out to every controller.

use std::sync::Arc;

use super::{require_facility, verify_source, HandlerResult, Outcome};
use crate::post_office::{Mail, MailKind, RecipientFilter};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::{AmendFlightPlan, FileFlightPlan};
use crate::wire::{ErrorCode, FsdError};

pub fn file(session: &Arc<Session>, packet: &str) -> HandlerResult {
    let pdu = FileFlightPlan::parse(packet)?;
    verify_source(session, &pdu.from)?;

    session.set_flight_plan(pdu.plan.clone());
    Ok(Outcome::mail(
        Mail::new(
            Arc::clone(session),
            MailKind::Broadcast,
            pdu.serialize_relay(),
        )
        .filtered(RecipientFilter::AtcOnly),
    ))
}

pub fn amend(state: &Arc<ServerState>, session: &Arc<Session>, packet: &str) -> HandlerResult {
    let pdu = AmendFlightPlan::parse(packet)?;
    verify_source(session, &pdu.from)?;
    require_facility(session)?;

    let target = state
        .post_office
        .find(&pdu.target)
        .ok_or_else(|| FsdError::generic(ErrorCode::NoSuchCallsign, &pdu.target))?;
    target.set_flight_plan(pdu.plan.clone());

    Ok(Outcome::mail(
        Mail::new(
            Arc::clone(session),
            MailKind::Broadcast,
            pdu.serialize_relay(),
        )
        .filtered(RecipientFilter::AtcOnly),
    ))
}
