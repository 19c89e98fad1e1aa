//! `#TM` routing. The recipient field picks one of five paths: radio
//! transmission to nearby ATC, frequency chatter to everyone nearby,
//! wallop to the supervisors, an all-hands broadcast, or plain DM.

use std::sync::Arc;

use super::{direct_or_error, verify_source, HandlerResult, Outcome};
use crate::post_office::{Address, Mail, MailKind, RecipientFilter};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::pdu::TextMessage;
use crate::wire::{
    NetworkRating, BROADCAST_RECIPIENT, RADIO_RECIPIENT, SERVER_CALLSIGN, WALLOP_RECIPIENT,
};

pub fn text_message(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    packet: &str,
) -> HandlerResult {
    let pdu = TextMessage::parse(packet)?;
    verify_source(session, &pdu.from)?;

    match pdu.to.as_str() {
        RADIO_RECIPIENT => {
            // ATC radio calls reach other nearby controllers only. Pilots
            // cannot transmit here; their radio traffic rides the real
            // frequency recipients below.
            if !session.is_atc() {
                return Ok(Outcome::none());
            }
            Ok(Outcome::mail(
                Mail::new(Arc::clone(session), MailKind::GeneralProximity, packet)
                    .filtered(RecipientFilter::AtcOnly),
            ))
        }
        WALLOP_RECIPIENT => Ok(Outcome::mail(Mail::new(
            Arc::clone(session),
            MailKind::Supervisors,
            packet,
        ))),
        BROADCAST_RECIPIENT => {
            // Only supervisors may address everybody; others are dropped
            // without comment.
            if session.network_rating() < NetworkRating::Supervisor {
                return Ok(Outcome::none());
            }
            Ok(Outcome::mail(Mail::new(
                Arc::clone(session),
                MailKind::Broadcast,
                packet,
            )))
        }
        // Sinks: messages "to" the server or a flight plan window.
        SERVER_CALLSIGN | "FP" => Ok(Outcome::none()),
        to if to.starts_with('@') => {
            // A tuned frequency, e.g. @22800: local chatter for everyone
            // in range.
            Ok(Outcome::mail(Mail::new(
                Arc::clone(session),
                MailKind::GeneralProximity,
                packet,
            )))
        }
        to => direct_or_error(state, session, to, packet),
    }
}
