use super::{body, syntax, FsdError};
use crate::wire::{FLIGHT_PLAN_RECIPIENT, PACKET_DELIMITER};

/// `#TM` — text message. The recipient field decides the routing: a
/// callsign, a radio frequency pseudo-recipient, `*` or `*S`.
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub from: String,
    pub to: String,
    pub message: String,
}

impl TextMessage {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "#TM")?;
        let fields: Vec<&str> = body.splitn(3, ':').collect();
        if fields.len() != 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            message: fields[2].to_owned(),
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "#TM{}:{}:{}{}",
            self.from, self.to, self.message, PACKET_DELIMITER
        )
    }
}

/// `$SF` — server-to-client toggle for fast position sending.
#[derive(Debug, Clone)]
pub struct SendFast {
    pub from: String,
    pub to: String,
    pub enabled: bool,
}

impl SendFast {
    pub fn serialize(&self) -> String {
        format!(
            "$SF{}:{}:{}{}",
            self.from,
            self.to,
            u8::from(self.enabled),
            PACKET_DELIMITER
        )
    }
}

/// `$FP` — a filed flight plan. Everything after the recipient is kept as
/// an opaque blob; the server stores and relays it without interpreting
/// the route fields.
#[derive(Debug, Clone)]
pub struct FileFlightPlan {
    pub from: String,
    pub to: String,
    pub plan: String,
}

impl FileFlightPlan {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$FP")?;
        let fields: Vec<&str> = body.splitn(3, ':').collect();
        if fields.len() != 3 || fields[2].is_empty() {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            plan: fields[2].to_owned(),
        })
    }

    /// The fan-out copy sent to every ATC position.
    pub fn serialize_relay(&self) -> String {
        format!(
            "$FP{}:{}:{}{}",
            self.from, FLIGHT_PLAN_RECIPIENT, self.plan, PACKET_DELIMITER
        )
    }
}

/// `$AM` — an ATC amendment of somebody's flight plan.
#[derive(Debug, Clone)]
pub struct AmendFlightPlan {
    pub from: String,
    pub to: String,
    pub target: String,
    pub plan: String,
}

impl AmendFlightPlan {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$AM")?;
        let fields: Vec<&str> = body.splitn(4, ':').collect();
        if fields.len() != 4 || fields[3].is_empty() {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            target: fields[2].to_owned(),
            plan: fields[3].to_owned(),
        })
    }

    pub fn serialize_relay(&self) -> String {
        format!(
            "$AM{}:{}:{}:{}{}",
            self.from, FLIGHT_PLAN_RECIPIENT, self.target, self.plan, PACKET_DELIMITER
        )
    }
}
