use super::{body, require_hex, syntax, FsdError};
use crate::wire::PACKET_DELIMITER;

/// `$ZC` — an auth challenge. Either side may send one at any time after
/// login; the peer must answer with a matching `$ZR`.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub from: String,
    pub to: String,
    pub challenge: String,
}

impl AuthChallenge {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$ZC")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        require_hex(fields[2], "invalid challenge")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            challenge: fields[2].to_owned(),
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "$ZC{}:{}:{}{}",
            self.from, self.to, self.challenge, PACKET_DELIMITER
        )
    }
}

/// `$ZR` — the response half of an auth round.
#[derive(Debug, Clone)]
pub struct AuthChallengeResponse {
    pub from: String,
    pub to: String,
    pub response: String,
}

impl AuthChallengeResponse {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "$ZR")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 3 {
            return Err(syntax("", "invalid parameter count"));
        }
        require_hex(fields[2], "invalid challenge response")?;
        Ok(Self {
            from: fields[0].to_owned(),
            to: fields[1].to_owned(),
            response: fields[2].to_owned(),
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "$ZR{}:{}:{}{}",
            self.from, self.to, self.response, PACKET_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_requires_hex() {
        assert!(AuthChallenge::parse("$ZCN123:SERVER:de6acb8e\r\n").is_ok());
        assert!(AuthChallenge::parse("$ZCN123:SERVER:nothex!!\r\n").is_err());
        assert!(AuthChallenge::parse("$ZCN123:SERVER\r\n").is_err());
    }

    #[test]
    fn response_round_trip() {
        let zr =
            AuthChallengeResponse::parse("$ZRSERVER:N123:f8ee97157f66455ed6108fccef6ccf5f\r\n")
                .unwrap();
        assert_eq!(zr.response, "f8ee97157f66455ed6108fccef6ccf5f");
        assert_eq!(
            zr.serialize(),
            "$ZRSERVER:N123:f8ee97157f66455ed6108fccef6ccf5f\r\n"
        );
    }
}
