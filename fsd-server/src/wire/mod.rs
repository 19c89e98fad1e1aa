//! FSD wire protocol: framing constants, packet classification and the
//! rating/facility vocabulary shared by every layer above.
//!
//! Packets are single CRLF-terminated lines of colon-delimited fields. The
//! first one-to-three bytes select the packet family; everything after is
//! family-specific and parsed by the typed PDUs in [`pdu`].

pub mod error;
pub mod pdu;

pub use error::{ErrorCode, FsdError};

/// Field separator inside a packet.
pub const DELIMITER: char = ':';
/// Every packet ends with exactly one CRLF.
pub const PACKET_DELIMITER: &str = "\r\n";
/// Hard cap on a single framed packet, delimiter included.
pub const MAX_PACKET_LEN: usize = 1536;

pub const SERVER_CALLSIGN: &str = "SERVER";
pub const CLIENT_CALLSIGN: &str = "CLIENT";

/// Text messages to this recipient are radio transmissions, relayed to
/// nearby ATC positions only.
pub const RADIO_RECIPIENT: &str = "@49999";
/// Client queries to this recipient fan out to nearby ATC.
pub const ATC_QUERY_RECIPIENT: &str = "@94835";
/// Client queries to this recipient fan out to everyone nearby.
pub const PILOT_QUERY_RECIPIENT: &str = "@94386";
/// Wallop: text to every connected supervisor.
pub const WALLOP_RECIPIENT: &str = "*S";
/// Text to every connected client (supervisors only may send this).
pub const BROADCAST_RECIPIENT: &str = "*";
/// Flight plan fan-out pseudo recipient.
pub const FLIGHT_PLAN_RECIPIENT: &str = "*A";

/// The only protocol revision this server accepts at login. Clients at this
/// revision understand fast position updates and `$SF` toggles.
pub const PROTO_REVISION_VELOCITY: u32 = 101;

/// Network rating, ordered. Comparisons rely on declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkRating {
    Inactive,
    Suspended,
    Observer,
    Student1,
    Student2,
    Student3,
    Controller1,
    Controller2,
    Controller3,
    Instructor1,
    Instructor2,
    Instructor3,
    Supervisor,
    Administrator,
}

impl NetworkRating {
    pub fn from_i32(value: i32) -> Option<Self> {
        use NetworkRating::*;
        Some(match value {
            -1 => Inactive,
            0 => Suspended,
            1 => Observer,
            2 => Student1,
            3 => Student2,
            4 => Student3,
            5 => Controller1,
            6 => Controller2,
            7 => Controller3,
            8 => Instructor1,
            9 => Instructor2,
            10 => Instructor3,
            11 => Supervisor,
            12 => Administrator,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        use NetworkRating::*;
        match self {
            Inactive => -1,
            Suspended => 0,
            Observer => 1,
            Student1 => 2,
            Student2 => 3,
            Student3 => 4,
            Controller1 => 5,
            Controller2 => 6,
            Controller3 => 7,
            Instructor1 => 8,
            Instructor2 => 9,
            Instructor3 => 10,
            Supervisor => 11,
            Administrator => 12,
        }
    }
}

/// ATC facility type, from the `%` position packet and the `#AA` login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityType {
    Observer,
    FlightService,
    Delivery,
    Ground,
    Tower,
    Approach,
    Center,
}

impl FacilityType {
    pub fn from_i32(value: i32) -> Option<Self> {
        use FacilityType::*;
        Some(match value {
            0 => Observer,
            1 => FlightService,
            2 => Delivery,
            3 => Ground,
            4 => Tower,
            5 => Approach,
            6 => Center,
            _ => return None,
        })
    }

    pub fn as_i32(self) -> i32 {
        use FacilityType::*;
        match self {
            Observer => 0,
            FlightService => 1,
            Delivery => 2,
            Ground => 3,
            Tower => 4,
            Approach => 5,
            Center => 6,
        }
    }

    /// Minimum network rating allowed to staff this facility.
    pub fn minimum_rating(self) -> NetworkRating {
        use FacilityType::*;
        match self {
            Observer => NetworkRating::Observer,
            FlightService | Center => NetworkRating::Controller1,
            Delivery | Ground => NetworkRating::Student1,
            Tower => NetworkRating::Student2,
            Approach => NetworkRating::Student3,
        }
    }
}

/// Packet families, keyed off the leading prefix bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    PilotPosition,
    FastPilotPosition,
    SlowPilotPosition,
    StoppedPilotPosition,
    AtcPosition,
    AddPilot,
    AddAtc,
    DeletePilot,
    DeleteAtc,
    TextMessage,
    SquawkboxMessage,
    ProController,
    ServerIdentification,
    ClientIdentification,
    ClientQuery,
    ClientQueryResponse,
    AuthChallenge,
    AuthChallengeResponse,
    KillRequest,
    FileFlightPlan,
    AmendFlightPlan,
    Ping,
    Pong,
    Handoff,
    HandoffAccept,
    MetarRequest,
    SendFast,
    ProtocolError,
}

/// Classifies a framed packet by prefix. Returns `None` for prefixes this
/// server does not speak.
pub fn classify(packet: &str) -> Option<PacketType> {
    use PacketType::*;
    match packet.as_bytes().first()? {
        b'@' => return Some(PilotPosition),
        b'^' => return Some(FastPilotPosition),
        b'%' => return Some(AtcPosition),
        b'#' | b'$' => {}
        _ => return None,
    }
    // get() rather than a byte slice: a multibyte char can straddle index 3.
    Some(match packet.get(..3)? {
        "#SL" => SlowPilotPosition,
        "#ST" => StoppedPilotPosition,
        "#AP" => AddPilot,
        "#AA" => AddAtc,
        "#DP" => DeletePilot,
        "#DA" => DeleteAtc,
        "#TM" => TextMessage,
        "#SB" => SquawkboxMessage,
        "#PC" => ProController,
        "$DI" => ServerIdentification,
        "$ID" => ClientIdentification,
        "$CQ" => ClientQuery,
        "$CR" => ClientQueryResponse,
        "$ZC" => AuthChallenge,
        "$ZR" => AuthChallengeResponse,
        "$!!" => KillRequest,
        "$FP" => FileFlightPlan,
        "$AM" => AmendFlightPlan,
        "$PI" => Ping,
        "$PO" => Pong,
        "$HO" => Handoff,
        "$HA" => HandoffAccept,
        "$AX" => MetarRequest,
        "$SF" => SendFast,
        "$ER" => ProtocolError,
        _ => return None,
    })
}

impl PacketType {
    pub fn prefix(self) -> &'static str {
        use PacketType::*;
        match self {
            PilotPosition => "@",
            FastPilotPosition => "^",
            AtcPosition => "%",
            SlowPilotPosition => "#SL",
            StoppedPilotPosition => "#ST",
            AddPilot => "#AP",
            AddAtc => "#AA",
            DeletePilot => "#DP",
            DeleteAtc => "#DA",
            TextMessage => "#TM",
            SquawkboxMessage => "#SB",
            ProController => "#PC",
            ServerIdentification => "$DI",
            ClientIdentification => "$ID",
            ClientQuery => "$CQ",
            ClientQueryResponse => "$CR",
            AuthChallenge => "$ZC",
            AuthChallengeResponse => "$ZR",
            KillRequest => "$!!",
            FileFlightPlan => "$FP",
            AmendFlightPlan => "$AM",
            Ping => "$PI",
            Pong => "$PO",
            Handoff => "$HO",
            HandoffAccept => "$HA",
            MetarRequest => "$AX",
            SendFast => "$SF",
            ProtocolError => "$ER",
        }
    }
}

/// Callsign rules for registration: 2..=10 chars of uppercase alphanumerics
/// plus `-` and `_`, and none of the reserved names.
pub fn valid_callsign(callsign: &str) -> bool {
    if callsign.len() < 2 || callsign.len() > 10 {
        return false;
    }
    if !callsign
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return false;
    }
    !matches!(callsign, SERVER_CALLSIGN | CLIENT_CALLSIGN | "FP")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_prefix() {
        assert_eq!(classify("@N:N123:1200"), Some(PacketType::PilotPosition));
        assert_eq!(classify("^N123:45.0"), Some(PacketType::FastPilotPosition));
        assert_eq!(classify("#SLN123:45.0"), Some(PacketType::SlowPilotPosition));
        assert_eq!(classify("%BOS_TWR:118700"), Some(PacketType::AtcPosition));
        assert_eq!(classify("$!!SUP:N123"), Some(PacketType::KillRequest));
        assert_eq!(classify("$ZZnope"), None);
        assert_eq!(classify("!bogus"), None);
        assert_eq!(classify(""), None);
        assert_eq!(classify("#A"), None);
    }

    #[test]
    fn classify_tolerates_multibyte_garbage() {
        // A two-byte char straddling the prefix boundary must not panic.
        assert_eq!(classify("#a\u{e9}:x"), None);
        assert_eq!(classify("$\u{e9}\u{e9}"), None);
        assert_eq!(classify("\u{2708}"), None);
    }

    #[test]
    fn rating_order() {
        assert!(NetworkRating::Supervisor > NetworkRating::Controller1);
        assert!(NetworkRating::Observer > NetworkRating::Suspended);
        assert_eq!(NetworkRating::from_i32(-1), Some(NetworkRating::Inactive));
        assert_eq!(NetworkRating::from_i32(12), Some(NetworkRating::Administrator));
        assert_eq!(NetworkRating::from_i32(13), None);
        for v in -1..=12 {
            assert_eq!(NetworkRating::from_i32(v).unwrap().as_i32(), v);
        }
    }

    #[test]
    fn facility_gates() {
        assert_eq!(
            FacilityType::Tower.minimum_rating(),
            NetworkRating::Student2
        );
        assert!(NetworkRating::Observer < FacilityType::Center.minimum_rating());
        assert!(NetworkRating::Controller1 >= FacilityType::Center.minimum_rating());
        assert!(NetworkRating::Observer >= FacilityType::Observer.minimum_rating());
    }

    #[test]
    fn callsign_rules() {
        assert!(valid_callsign("N123"));
        assert!(valid_callsign("BOS_TWR"));
        assert!(valid_callsign("DAL1-A"));
        assert!(!valid_callsign("A"));
        assert!(!valid_callsign("LONGCALLSIGN"));
        assert!(!valid_callsign("n123"));
        assert!(!valid_callsign("SERVER"));
        assert!(!valid_callsign("FP"));
        assert!(!valid_callsign("@94835"));
    }
}
