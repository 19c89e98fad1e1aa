use super::{body, parse_i32, parse_u32, syntax, FsdError};
use crate::wire::{NetworkRating, PACKET_DELIMITER, SERVER_CALLSIGN};

/// `#AP` — pilot login request.
#[derive(Debug, Clone)]
pub struct AddPilot {
    pub from: String,
    pub to: String,
    pub cid: u32,
    pub token: String,
    pub requested_rating: Option<NetworkRating>,
    pub protocol_revision: u32,
    pub simulator_type: i32,
    pub real_name: String,
}

impl AddPilot {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "#AP")?;
        let fields: Vec<&str> = body.splitn(8, ':').collect();
        if fields.len() != 8 {
            return Err(syntax("", "invalid parameter count"));
        }
        let rating = parse_i32(fields[4], "invalid network rating")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            cid: parse_u32(fields[2], "invalid CID")?,
            token: fields[3].to_owned(),
            requested_rating: NetworkRating::from_i32(rating),
            protocol_revision: parse_u32(fields[5], "invalid protocol revision")?,
            simulator_type: parse_i32(fields[6], "invalid simulator type")?,
            real_name: fields[7].to_owned(),
        })
    }

    /// The join announcement relayed to everyone else, with the credential
    /// field blanked.
    pub fn serialize_announcement(&self, rating: NetworkRating) -> String {
        format!(
            "#AP{}:{}:{}::{}:{}:{}:{}{}",
            self.from,
            SERVER_CALLSIGN,
            self.cid,
            rating.as_i32(),
            self.protocol_revision,
            self.simulator_type,
            self.real_name,
            PACKET_DELIMITER
        )
    }
}

/// `#AA` — ATC login request.
#[derive(Debug, Clone)]
pub struct AddAtc {
    pub from: String,
    pub to: String,
    pub real_name: String,
    pub cid: u32,
    pub token: String,
    pub requested_rating: Option<NetworkRating>,
    pub protocol_revision: u32,
}

impl AddAtc {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "#AA")?;
        let fields: Vec<&str> = body.splitn(7, ':').collect();
        if fields.len() != 7 {
            return Err(syntax("", "invalid parameter count"));
        }
        let rating = parse_i32(fields[5], "invalid network rating")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            real_name: fields[2].to_owned(),
            cid: parse_u32(fields[3], "invalid CID")?,
            token: fields[4].to_owned(),
            requested_rating: NetworkRating::from_i32(rating),
            protocol_revision: parse_u32(fields[6], "invalid protocol revision")?,
        })
    }

    pub fn serialize_announcement(&self, rating: NetworkRating) -> String {
        format!(
            "#AA{}:{}:{}:{}::{}:{}{}",
            self.from,
            SERVER_CALLSIGN,
            self.real_name,
            self.cid,
            rating.as_i32(),
            self.protocol_revision,
            PACKET_DELIMITER
        )
    }
}

/// `#DP` / `#DA` — a client leaving the network.
#[derive(Debug, Clone)]
pub struct Delete {
    pub atc: bool,
    pub from: String,
    pub cid: u32,
}

impl Delete {
    pub fn parse(packet: &str, atc: bool) -> Result<Self, FsdError> {
        let body = body(packet, if atc { "#DA" } else { "#DP" })?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 2 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            atc,
            from: fields[0].to_owned(),
            cid: parse_u32(fields[1], "invalid CID")?,
        })
    }

    /// Broadcast form, with the server as the middle field.
    pub fn serialize(&self) -> String {
        format!(
            "{}{}:{}:{}{}",
            if self.atc { "#DA" } else { "#DP" },
            self.from,
            SERVER_CALLSIGN,
            self.cid,
            PACKET_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_pilot_parses_and_announces() {
        let pdu =
            AddPilot::parse("#APN123:SERVER:1000000:secret-token:1:101:1:Jane Doe KBOS\r\n")
                .unwrap();
        assert_eq!(pdu.cid, 1000000);
        assert_eq!(pdu.token, "secret-token");
        assert_eq!(pdu.requested_rating, Some(NetworkRating::Observer));
        assert_eq!(pdu.protocol_revision, 101);
        assert_eq!(pdu.real_name, "Jane Doe KBOS");
        assert_eq!(
            pdu.serialize_announcement(NetworkRating::Observer),
            "#APN123:SERVER:1000000::1:101:1:Jane Doe KBOS\r\n"
        );
    }

    #[test]
    fn add_atc_parses() {
        let pdu = AddAtc::parse("#AABOS_TWR:SERVER:John Roe:1000001:pw:3:101\r\n").unwrap();
        assert_eq!(pdu.real_name, "John Roe");
        assert_eq!(pdu.requested_rating, Some(NetworkRating::Student2));
        assert_eq!(
            pdu.serialize_announcement(NetworkRating::Student2),
            "#AABOS_TWR:SERVER:John Roe:1000001::3:101\r\n"
        );
    }

    #[test]
    fn add_pilot_keeps_unknown_rating_as_none() {
        let pdu = AddPilot::parse("#APN123:SERVER:1000000:pw:99:101:1:Jane\r\n").unwrap();
        assert_eq!(pdu.requested_rating, None);
    }

    #[test]
    fn delete_parses_and_broadcasts() {
        let pdu = Delete::parse("#DPN123:1000000\r\n", false).unwrap();
        assert_eq!(pdu.cid, 1000000);
        assert_eq!(pdu.serialize(), "#DPN123:SERVER:1000000\r\n");
        assert!(Delete::parse("#DAN123:1000000\r\n", false).is_err());
        assert!(Delete::parse("#DAN123:1000000\r\n", true).is_ok());
    }
}
