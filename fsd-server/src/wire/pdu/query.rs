use super::{body, syntax, FsdError};
use crate::wire::PACKET_DELIMITER;

/// `$CQ` — client query. The payload is optional and may itself contain
/// colons, so it is split off lazily.
#[derive(Debug, Clone)]
pub struct ClientQuery {
    pub from: String,
    pub to: String,
    pub query_type: String,
    pub payload: Option<String>,
}

impl ClientQuery {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$CQ")?;
        let fields: Vec<&str> = body.splitn(4, ':').collect();
        if fields.len() < 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        if fields[2].is_empty() || fields[2].len() > 16 {
            return Err(syntax(fields[2], "invalid query type"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            query_type: fields[2].to_owned(),
            payload: fields.get(3).map(|s| (*s).to_owned()),
        })
    }

    pub fn serialize(&self) -> String {
        match &self.payload {
            Some(payload) => format!(
                "$CQ{}:{}:{}:{}{}",
                self.from, self.to, self.query_type, payload, PACKET_DELIMITER
            ),
            None => format!(
                "$CQ{}:{}:{}{}",
                self.from, self.to, self.query_type, PACKET_DELIMITER
            ),
        }
    }
}

/// `$CR` — response to a client query, same shape as the query.
#[derive(Debug, Clone)]
pub struct ClientQueryResponse {
    pub from: String,
    pub to: String,
    pub query_type: String,
    pub payload: Option<String>,
}

impl ClientQueryResponse {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$CR")?;
        let fields: Vec<&str> = body.splitn(4, ':').collect();
        if fields.len() < 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            query_type: fields[2].to_owned(),
            payload: fields.get(3).map(|s| (*s).to_owned()),
        })
    }

    pub fn serialize(&self) -> String {
        match &self.payload {
            Some(payload) => format!(
                "$CR{}:{}:{}:{}{}",
                self.from, self.to, self.query_type, payload, PACKET_DELIMITER
            ),
            None => format!(
                "$CR{}:{}:{}{}",
                self.from, self.to, self.query_type, PACKET_DELIMITER
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_and_without_payload() {
        let q = ClientQuery::parse("$CQN123:SERVER:IP\r\n").unwrap();
        assert_eq!(q.query_type, "IP");
        assert!(q.payload.is_none());
        assert_eq!(q.serialize(), "$CQN123:SERVER:IP\r\n");

        let q = ClientQuery::parse("$CQBOS_TWR:SERVER:ATC:N456\r\n").unwrap();
        assert_eq!(q.payload.as_deref(), Some("N456"));
    }

    #[test]
    fn query_payload_keeps_colons() {
        let q = ClientQuery::parse("$CQBOS_TWR:@94835:NEWATIS:ATIS A:122.8\r\n").unwrap();
        assert_eq!(q.payload.as_deref(), Some("ATIS A:122.8"));
    }

    #[test]
    fn response_round_trip() {
        let r = ClientQueryResponse::parse("$CRSERVER:N123:ATC:Y:BOS_TWR\r\n").unwrap();
        assert_eq!(r.payload.as_deref(), Some("Y:BOS_TWR"));
        assert_eq!(r.serialize(), "$CRSERVER:N123:ATC:Y:BOS_TWR\r\n");
    }
}
