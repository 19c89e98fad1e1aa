//! Typed PDUs: one parse/serialize pair per packet family.
//!
//! Parsers take the full framed packet (CRLF optional) and return a typed
//! struct or a `$ER`-ready [`FsdError`]. Serializers always append the CRLF.
//! Handlers that relay a packet unchanged forward the original bytes and
//! only use these types for validation and field access.

mod add;
mod auth;
mod ident;
mod misc;
mod position;
mod query;
mod text;

pub use add::{AddAtc, AddPilot, Delete};
pub use auth::{AuthChallenge, AuthChallengeResponse};
pub use ident::{ClientIdentification, ServerIdentification};
pub use misc::{
    Handoff, KillRequest, MetarRequest, MetarResponse, Ping, Pong, ProController,
    SquawkboxMessage,
};
pub use position::{
    pack_pbh, unpack_pbh, AtcPosition, FastPilotPosition, FastPositionKind, PilotPosition,
    SquawkingMode,
};
pub use query::{ClientQuery, ClientQueryResponse};
pub use text::{AmendFlightPlan, FileFlightPlan, SendFast, TextMessage};

use super::{ErrorCode, FsdError, PACKET_DELIMITER};

/// Strips the frame delimiter and the family prefix, failing with a syntax
/// error when the prefix does not match.
fn body<'a>(packet: &'a str, prefix: &str) -> Result<&'a str, FsdError> {
    let trimmed = packet.strip_suffix(PACKET_DELIMITER).unwrap_or(packet);
    trimmed
        .strip_prefix(prefix)
        .ok_or_else(|| syntax("", "invalid packet prefix"))
}

fn syntax(param: &str, message: &str) -> FsdError {
    FsdError::new(ErrorCode::Syntax, param, message)
}

fn parse_i32(field: &str, what: &str) -> Result<i32, FsdError> {
    field.parse().map_err(|_| syntax(field, what))
}

fn parse_u32(field: &str, what: &str) -> Result<u32, FsdError> {
    field.parse().map_err(|_| syntax(field, what))
}

fn parse_f64(field: &str, what: &str) -> Result<f64, FsdError> {
    field.parse().map_err(|_| syntax(field, what))
}

fn require_hex(field: &str, what: &str) -> Result<(), FsdError> {
    if field.is_empty() || field.len() % 2 != 0 || field.len() > 32 {
        return Err(syntax(field, what));
    }
    if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(syntax(field, what));
    }
    Ok(())
}
