//! Protocol-level errors, sent to clients as `$ER` packets.

use thiserror::Error;

use super::{PACKET_DELIMITER, SERVER_CALLSIGN};

/// Numeric error codes carried in `$ER` packets, zero-padded to three
/// digits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CallsignInUse,
    CallsignInvalid,
    AlreadyRegistered,
    Syntax,
    SourceInvalid,
    InvalidLogon,
    NoSuchCallsign,
    NoFlightPlan,
    NoWeatherProfile,
    InvalidProtocolRevision,
    RequestedLevelTooHigh,
    ServerFull,
    CertificateSuspended,
    InvalidControl,
    InvalidPositionForRating,
    UnauthorizedSoftware,
    AuthChallengeTimeout,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        use ErrorCode::*;
        match self {
            CallsignInUse => 1,
            CallsignInvalid => 2,
            AlreadyRegistered => 3,
            Syntax => 4,
            SourceInvalid => 5,
            InvalidLogon => 6,
            NoSuchCallsign => 7,
            NoFlightPlan => 8,
            NoWeatherProfile => 9,
            InvalidProtocolRevision => 10,
            RequestedLevelTooHigh => 11,
            ServerFull => 12,
            CertificateSuspended => 13,
            InvalidControl => 14,
            InvalidPositionForRating => 15,
            UnauthorizedSoftware => 16,
            AuthChallengeTimeout => 17,
        }
    }

    pub fn default_message(self) -> &'static str {
        use ErrorCode::*;
        match self {
            CallsignInUse => "callsign in use",
            CallsignInvalid => "callsign invalid",
            AlreadyRegistered => "already registered",
            Syntax => "syntax error",
            SourceInvalid => "invalid source in packet",
            InvalidLogon => "invalid logon",
            NoSuchCallsign => "no such callsign",
            NoFlightPlan => "no flight plan",
            NoWeatherProfile => "no weather profile",
            InvalidProtocolRevision => "invalid protocol revision",
            RequestedLevelTooHigh => "requested level too high",
            ServerFull => "no more connections",
            CertificateSuspended => "certificate suspended",
            InvalidControl => "invalid control operation",
            InvalidPositionForRating => "rating too low for position",
            UnauthorizedSoftware => "unauthorized client software",
            AuthChallengeTimeout => "authentication response timeout",
        }
    }
}

/// A protocol error addressed to a client. `serialize` renders the `$ER`
/// packet; `Display` is for logs.
#[derive(Debug, Clone, Error)]
#[error("fsd error {:03} to {to}: {message} ({param})", code.code())]
pub struct FsdError {
    pub from: String,
    pub to: String,
    pub code: ErrorCode,
    pub param: String,
    pub message: String,
}

impl FsdError {
    /// An error from the server to a not-yet-known recipient. Callers that
    /// know the peer's callsign should chain [`FsdError::addressed`].
    pub fn new(code: ErrorCode, param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            from: SERVER_CALLSIGN.to_owned(),
            to: "unknown".to_owned(),
            code,
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn generic(code: ErrorCode, param: impl Into<String>) -> Self {
        Self::new(code, param, code.default_message())
    }

    pub fn addressed(mut self, to: &str) -> Self {
        self.to = to.to_owned();
        self
    }

    pub fn serialize(&self) -> String {
        format!(
            "$ER{}:{}:{:03}:{}:{}{}",
            self.from,
            self.to,
            self.code.code(),
            self.param,
            self.message,
            PACKET_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_zero_padded() {
        let err = FsdError::generic(ErrorCode::CallsignInUse, "").addressed("N123");
        assert_eq!(err.serialize(), "$ERSERVER:N123:001::callsign in use\r\n");
    }

    #[test]
    fn keeps_param_and_message() {
        let err = FsdError::new(ErrorCode::NoSuchCallsign, "BOS_GND", "no such callsign")
            .addressed("N456");
        assert_eq!(
            err.serialize(),
            "$ERSERVER:N456:007:BOS_GND:no such callsign\r\n"
        );
    }
}
