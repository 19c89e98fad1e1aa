//! Post-login packet handling. Every handler parses, verifies the claimed
//! source against the session, checks its privilege gate, applies side
//! effects, and returns what to write back and what to hand the post
//! office. A returned error becomes a `$ER` to the sender; `disconnect`
//! tears the session down after the replies go out.

mod admin;
mod auth;
mod forward;
mod plans;
mod position;
mod query;
mod text;

use std::sync::Arc;

use crate::post_office::{Address, Mail};
use crate::server::ServerState;
use crate::session::Session;
use crate::wire::{self, ErrorCode, FsdError, PacketType};

#[derive(Default)]
pub struct Outcome {
    /// Serialized packets written straight back to the invoker.
    pub replies: Vec<String>,
    /// Mail handed to the post office after the replies.
    pub mail: Vec<Mail<Session>>,
    /// Close the session once everything above is out.
    pub disconnect: bool,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reply(packet: String) -> Self {
        Self {
            replies: vec![packet],
            ..Self::default()
        }
    }

    pub fn mail(mail: Mail<Session>) -> Self {
        Self {
            mail: vec![mail],
            ..Self::default()
        }
    }
}

pub type HandlerResult = Result<Outcome, FsdError>;

pub fn dispatch(state: &Arc<ServerState>, session: &Arc<Session>, packet: &str) -> HandlerResult {
    use PacketType::*;
    let Some(packet_type) = wire::classify(packet) else {
        return Err(FsdError::new(ErrorCode::Syntax, "", "unknown packet type"));
    };
    match packet_type {
        // A registered client renegotiating identification is a protocol
        // violation.
        ServerIdentification | ClientIdentification | AddPilot | AddAtc => {
            Err(FsdError::generic(ErrorCode::AlreadyRegistered, ""))
        }

        // Inbound-ignored families.
        Pong | SendFast | ProtocolError => Ok(Outcome::none()),

        PilotPosition => position::pilot_position(state, session, packet),
        FastPilotPosition => {
            position::fast_position(state, session, packet, wire::pdu::FastPositionKind::Fast)
        }
        SlowPilotPosition => {
            position::fast_position(state, session, packet, wire::pdu::FastPositionKind::Slow)
        }
        StoppedPilotPosition => {
            position::fast_position(state, session, packet, wire::pdu::FastPositionKind::Stopped)
        }
        AtcPosition => position::atc_position(state, session, packet),

        TextMessage => text::text_message(state, session, packet),

        ClientQuery => query::client_query(state, session, packet),
        ClientQueryResponse => query::client_query_response(state, session, packet),

        AuthChallenge => auth::challenge(session, packet),
        AuthChallengeResponse => auth::challenge_response(session, packet),

        KillRequest => admin::kill_request(state, session, packet),
        DeletePilot => admin::delete(session, packet, false),
        DeleteAtc => admin::delete(session, packet, true),

        FileFlightPlan => plans::file(session, packet),
        AmendFlightPlan => plans::amend(state, session, packet),

        Handoff => forward::handoff(state, session, packet, false),
        HandoffAccept => forward::handoff(state, session, packet, true),
        SquawkboxMessage => forward::squawkbox(state, session, packet),
        ProController => forward::pro_controller(state, session, packet),
        Ping => forward::ping(state, session, packet),
        MetarRequest => forward::metar_request(state, session, packet),
    }
}

/// Every packet must name the session's own callsign as its source.
fn verify_source(session: &Session, from: &str) -> Result<(), FsdError> {
    if from == session.callsign() {
        Ok(())
    } else {
        Err(FsdError::generic(ErrorCode::SourceInvalid, from))
    }
}

/// Direct mail when the recipient exists, `$ER 007` otherwise.
fn direct_or_error(
    state: &ServerState,
    session: &Arc<Session>,
    to: &str,
    packet: &str,
) -> HandlerResult {
    if state.post_office.find(to).is_none() {
        return Err(FsdError::generic(ErrorCode::NoSuchCallsign, to));
    }
    Ok(Outcome::mail(Mail::new(
        Arc::clone(session),
        crate::post_office::MailKind::Direct(to.to_owned()),
        packet,
    )))
}

fn require_atc(session: &Session) -> Result<(), FsdError> {
    if session.is_atc() {
        Ok(())
    } else {
        Err(FsdError::generic(ErrorCode::InvalidControl, ""))
    }
}

/// ATC holding an actual facility (not a plain observer).
fn require_facility(session: &Session) -> Result<(), FsdError> {
    require_atc(session)?;
    if session.facility() > 0 {
        Ok(())
    } else {
        Err(FsdError::generic(ErrorCode::InvalidControl, ""))
    }
}
