use super::{body, parse_i32, parse_u32, require_hex, syntax, FsdError};
use crate::wire::PACKET_DELIMITER;

/// `$DI` — sent by the server as the first packet on a connection.
#[derive(Debug, Clone)]
pub struct ServerIdentification {
    pub from: String,
    pub to: String,
    pub version: String,
    pub initial_challenge: String,
}

impl ServerIdentification {
    pub fn serialize(&self) -> String {
        format!(
            "$DI{}:{}:{}:{}{}",
            self.from, self.to, self.version, self.initial_challenge, PACKET_DELIMITER
        )
    }

    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$DI")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 4 {
            return Err(syntax("", "invalid parameter count"));
        }
        require_hex(fields[3], "invalid initial challenge")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            version: fields[2].to_owned(),
            initial_challenge: fields[3].to_owned(),
        })
    }
}

/// `$ID` — the client identifying its software and seeding the auth chain.
#[derive(Debug, Clone)]
pub struct ClientIdentification {
    pub from: String,
    pub to: String,
    pub client_id: u16,
    pub client_name: String,
    pub major_version: i32,
    pub minor_version: i32,
    pub cid: u32,
    pub sys_uid: String,
    pub initial_challenge: String,
}

impl ClientIdentification {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$ID")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 9 {
            return Err(syntax("", "invalid parameter count"));
        }
        if fields[2].len() != 4 {
            return Err(syntax(fields[2], "invalid client id"));
        }
        let client_id = u16::from_str_radix(fields[2], 16)
            .map_err(|_| syntax(fields[2], "invalid client id"))?;
        require_hex(fields[8], "invalid initial challenge")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            client_id,
            client_name: fields[3].to_owned(),
            major_version: parse_i32(fields[4], "invalid major version")?,
            minor_version: parse_i32(fields[5], "invalid minor version")?,
            cid: parse_u32(fields[6], "invalid CID")?,
            sys_uid: fields[7].to_owned(),
            initial_challenge: fields[8].to_owned(),
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "$ID{}:{}:{:04x}:{}:{}:{}:{}:{}:{}{}",
            self.from,
            self.to,
            self.client_id,
            self.client_name,
            self.major_version,
            self.minor_version,
            self.cid,
            self.sys_uid,
            self.initial_challenge,
            PACKET_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_identification_round_trip() {
        let pdu = ServerIdentification {
            from: "SERVER".into(),
            to: "CLIENT".into(),
            version: "openskies 0.1".into(),
            initial_challenge: "6f70656e73646169".into(),
        };
        let wire = pdu.serialize();
        assert_eq!(wire, "$DISERVER:CLIENT:openskies 0.1:6f70656e73646169\r\n");
        let parsed = ServerIdentification::parse(&wire).unwrap();
        assert_eq!(parsed.initial_challenge, pdu.initial_challenge);
    }

    #[test]
    fn client_identification_parses_hex_id() {
        let pdu = ClientIdentification::parse(
            "$IDN123:SERVER:88e4:vPilot:3:8:1000000:WIN-1234:30984979d8caed23\r\n",
        )
        .unwrap();
        assert_eq!(pdu.client_id, 0x88e4);
        assert_eq!(pdu.cid, 1000000);
        assert_eq!(pdu.initial_challenge, "30984979d8caed23");
    }

    #[test]
    fn client_identification_rejects_bad_challenge() {
        assert!(ClientIdentification::parse(
            "$IDN123:SERVER:88e4:vPilot:3:8:1000000:WIN-1234:zzzz\r\n"
        )
        .is_err());
        assert!(ClientIdentification::parse("$IDN123:SERVER:88e4:vPilot:3:8\r\n").is_err());
    }
}
