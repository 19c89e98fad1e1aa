use super::{body, syntax, FsdError};
use crate::wire::PACKET_DELIMITER;

/// `$!!` — a supervisor removing a client from the network.
#[derive(Debug, Clone)]
pub struct KillRequest {
    pub from: String,
    pub to: String,
    pub reason: String,
}

impl KillRequest {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$!!")?;
        let fields: Vec<&str> = body.splitn(3, ':').collect();
        if fields.len() < 2 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            reason: fields.get(2).map(|s| (*s).to_owned()).unwrap_or_default(),
        })
    }

    pub fn serialize(&self) -> String {
        if self.reason.is_empty() {
            format!("$!!{}:{}{}", self.from, self.to, PACKET_DELIMITER)
        } else {
            format!(
                "$!!{}:{}:{}{}",
                self.from, self.to, self.reason, PACKET_DELIMITER
            )
        }
    }
}

/// `$PI` — keepalive ping; answered with `$PO` carrying the same payload.
#[derive(Debug, Clone)]
pub struct Ping {
    pub from: String,
    pub to: String,
    pub timestamp: String,
}

impl Ping {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$PI")?;
        let fields: Vec<&str> = body.splitn(3, ':').collect();
        if fields.len() != 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            timestamp: fields[2].to_owned(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pong {
    pub from: String,
    pub to: String,
    pub timestamp: String,
}

impl Pong {
    pub fn serialize(&self) -> String {
        format!(
            "$PO{}:{}:{}{}",
            self.from, self.to, self.timestamp, PACKET_DELIMITER
        )
    }
}

/// `$AX` — METAR request; the third field is always the literal `METAR`.
#[derive(Debug, Clone)]
pub struct MetarRequest {
    pub from: String,
    pub to: String,
    pub station: String,
}

impl MetarRequest {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$AX")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 4 {
            return Err(syntax("", "invalid parameter count"));
        }
        if fields[2] != "METAR" {
            return Err(syntax(fields[2], "third parameter must be METAR"));
        }
        let station = fields[3];
        if station.is_empty()
            || station.len() > 4
            || !station.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(syntax(station, "invalid station"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            station: station.to_owned(),
        })
    }
}

/// `$AR` — METAR response, server to client.
#[derive(Debug, Clone)]
pub struct MetarResponse {
    pub from: String,
    pub to: String,
    pub metar: String,
}

impl MetarResponse {
    pub fn serialize(&self) -> String {
        format!(
            "$AR{}:{}:METAR:{}{}",
            self.from, self.to, self.metar, PACKET_DELIMITER
        )
    }
}

/// `$HO` / `$HA` — control handoff offer and acceptance between ATC.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub accept: bool,
    pub from: String,
    pub to: String,
    pub target: String,
}

impl Handoff {
    pub fn parse(packet: &str, accept: bool) -> Result<Self, FsdError> {
        let body = body(packet, if accept { "$HA" } else { "$HO" })?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            accept,
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            target: fields[2].to_owned(),
        })
    }
}

/// `#PC` — inter-controller coordination. The protocol field is always
/// `CCP`; the subtype decides whether a facility is required to send it.
#[derive(Debug, Clone)]
pub struct ProController {
    pub from: String,
    pub to: String,
    pub subtype: String,
    /// Anything after the subtype, unsplit.
    pub rest: Option<String>,
}

impl ProController {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "#PC")?;
        let fields: Vec<&str> = body.splitn(5, ':').collect();
        if fields.len() < 4 {
            return Err(syntax("", "invalid parameter count"));
        }
        if fields[2] != "CCP" {
            return Err(syntax(fields[2], "third parameter must be CCP"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            subtype: fields[3].to_owned(),
            rest: fields.get(4).map(|s| (*s).to_owned()),
        })
    }
}

/// `#SB` — simulator-to-simulator traffic (plane info, pireps). Relayed
/// directly for the whitelisted subtypes.
#[derive(Debug, Clone)]
pub struct SquawkboxMessage {
    pub from: String,
    pub to: String,
    pub subtype: String,
}

impl SquawkboxMessage {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "#SB")?;
        let fields: Vec<&str> = body.splitn(4, ':').collect();
        if fields.len() < 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            subtype: fields[2].to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_reason_optional() {
        let kr = KillRequest::parse("$!!SUP:N123\r\n").unwrap();
        assert_eq!(kr.reason, "");
        let kr = KillRequest::parse("$!!SUP:N123:language: rule 1\r\n").unwrap();
        assert_eq!(kr.reason, "language: rule 1");
        assert_eq!(kr.serialize(), "$!!SUP:N123:language: rule 1\r\n");
    }

    #[test]
    fn ping_pong() {
        let pi = Ping::parse("$PIN123:SERVER:1234567890\r\n").unwrap();
        let po = Pong {
            from: "SERVER".into(),
            to: pi.from,
            timestamp: pi.timestamp,
        };
        assert_eq!(po.serialize(), "$POSERVER:N123:1234567890\r\n");
    }

    #[test]
    fn metar_request_validates_station() {
        assert!(MetarRequest::parse("$AXN123:SERVER:METAR:KBOS\r\n").is_ok());
        assert!(MetarRequest::parse("$AXN123:SERVER:TAF:KBOS\r\n").is_err());
        assert!(MetarRequest::parse("$AXN123:SERVER:METAR:TOOLONG\r\n").is_err());
    }

    #[test]
    fn procontroller_requires_ccp() {
        let pc = ProController::parse("#PCBOS_TWR:BOS_GND:CCP:PT:N123\r\n").unwrap();
        assert_eq!(pc.subtype, "PT");
        assert_eq!(pc.rest.as_deref(), Some("N123"));
        assert!(ProController::parse("#PCBOS_TWR:BOS_GND:XXX:PT\r\n").is_err());
    }

    #[test]
    fn squawkbox_subtype() {
        let sb = SquawkboxMessage::parse("#SBN123:N456:PIR:details\r\n").unwrap();
        assert_eq!(sb.subtype, "PIR");
    }
}
