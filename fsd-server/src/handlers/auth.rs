//! In-session `$ZC`/`$ZR` auth rounds. The client may challenge the server
//! whenever it likes; every server answer is accompanied by a counter-
//! challenge, and a wrong answer to ours ends the session.

use std::sync::Arc;

use super::{verify_source, HandlerResult, Outcome};
use crate::auth::generate_challenge;
use crate::post_office::Address;
use crate::session::Session;
use crate::wire::pdu::{AuthChallenge, AuthChallengeResponse};
use crate::wire::{ErrorCode, FsdError, SERVER_CALLSIGN};

pub fn challenge(session: &Arc<Session>, packet: &str) -> HandlerResult {
    let pdu = AuthChallenge::parse(packet)?;
    verify_source(session, &pdu.from)?;

    let response = session.answer_challenge(&pdu.challenge);
    let counter = generate_challenge();
    session.set_pending_challenge(counter.clone());

    let mut outcome = Outcome::reply(
        AuthChallengeResponse {
            from: SERVER_CALLSIGN.into(),
            to: session.callsign().into(),
            response,
        }
        .serialize(),
    );
    outcome.replies.push(
        AuthChallenge {
            from: SERVER_CALLSIGN.into(),
            to: session.callsign().into(),
            challenge: counter,
        }
        .serialize(),
    );
    Ok(outcome)
}

pub fn challenge_response(session: &Arc<Session>, packet: &str) -> HandlerResult {
    let pdu = AuthChallengeResponse::parse(packet)?;
    verify_source(session, &pdu.from)?;

    // An answer we never asked for.
    let Some(pending) = session.take_pending_challenge() else {
        return Ok(Outcome::none());
    };

    let expected = session.expected_response(&pending);
    if expected != pdu.response {
        let err = FsdError::generic(ErrorCode::UnauthorizedSoftware, "")
            .addressed(session.callsign());
        return Ok(Outcome {
            replies: vec![err.serialize()],
            mail: Vec::new(),
            disconnect: true,
        });
    }
    session.advance_verify_chain(&pdu.response);
    Ok(Outcome::none())
}
