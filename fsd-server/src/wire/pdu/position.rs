use super::{body, parse_f64, parse_i32, parse_u32, syntax, FsdError};
use crate::wire::PACKET_DELIMITER;

/// Packs pitch, bank and heading (degrees) into the 32-bit wire integer:
/// three 10-bit fields at bit offsets 22, 12 and 2, low two bits reserved.
/// Lossy by design, about a third of a degree of granularity.
pub fn pack_pbh(pitch: f64, bank: f64, heading: f64) -> u32 {
    fn wrap_negative(degrees: f64) -> u32 {
        let mut unit = degrees / -360.0;
        if unit < 0.0 {
            unit += 1.0;
        }
        (unit * 1024.0) as u32 & 0x3ff
    }
    let p = wrap_negative(pitch);
    let b = wrap_negative(bank);
    let h = (heading / 360.0 * 1024.0) as u32 & 0x3ff;
    (p << 22) | (b << 12) | (h << 2)
}

/// Inverse of [`pack_pbh`]; pitch and bank come back in [-180, 180).
pub fn unpack_pbh(packed: u32) -> (f64, f64, f64) {
    fn unwrap_negative(raw: u32) -> f64 {
        let mut degrees = raw as f64 / 1024.0 * -360.0;
        if degrees <= -180.0 {
            degrees += 360.0;
        }
        degrees
    }
    let pitch = unwrap_negative((packed >> 22) & 0x3ff);
    let bank = unwrap_negative((packed >> 12) & 0x3ff);
    let heading = ((packed >> 2) & 0x3ff) as f64 / 1024.0 * 360.0;
    (pitch, bank, heading)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquawkingMode {
    Standby,
    Normal,
    Ident,
}

impl SquawkingMode {
    fn parse(field: &str) -> Result<Self, FsdError> {
        match field {
            "S" => Ok(Self::Standby),
            "N" => Ok(Self::Normal),
            "Y" => Ok(Self::Ident),
            _ => Err(syntax(field, "invalid squawking mode")),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Standby => "S",
            Self::Normal => "N",
            Self::Ident => "Y",
        }
    }
}

/// `@` — the slow (5 second cadence) pilot position report.
#[derive(Debug, Clone)]
pub struct PilotPosition {
    pub squawking_mode: SquawkingMode,
    pub from: String,
    pub squawk_code: String,
    pub rating: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub true_altitude: i32,
    pub ground_speed: i32,
    pub packed_pbh: u32,
    pub pressure_delta: i32,
}

impl PilotPosition {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "@")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 10 {
            return Err(syntax("", "invalid parameter count"));
        }
        // Transponder codes are octal.
        if fields[2].len() > 4 || !fields[2].bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Err(syntax(fields[2], "invalid squawk code"));
        }
        let latitude = parse_f64(fields[4], "invalid latitude")?;
        let longitude = parse_f64(fields[5], "invalid longitude")?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(syntax(fields[4], "position out of range"));
        }
        Ok(Self {
            squawking_mode: SquawkingMode::parse(fields[0])?,
            from: fields[1].to_owned(),
            squawk_code: fields[2].to_owned(),
            rating: parse_i32(fields[3], "invalid rating")?,
            latitude,
            longitude,
            true_altitude: parse_i32(fields[6], "invalid altitude")?,
            ground_speed: parse_i32(fields[7], "invalid ground speed")?,
            packed_pbh: parse_u32(fields[8], "invalid pitch/bank/heading")?,
            pressure_delta: parse_i32(fields[9], "invalid pressure delta")?,
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "@{}:{}:{}:{}:{:.6}:{:.6}:{}:{}:{}:{}{}",
            self.squawking_mode.as_str(),
            self.from,
            self.squawk_code,
            self.rating,
            self.latitude,
            self.longitude,
            self.true_altitude,
            self.ground_speed,
            self.packed_pbh,
            self.pressure_delta,
            PACKET_DELIMITER
        )
    }

    pub fn heading(&self) -> f64 {
        unpack_pbh(self.packed_pbh).2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPositionKind {
    /// `^` — full velocity update, sent several times a second.
    Fast,
    /// `#SL` — reduced cadence while slow.
    Slow,
    /// `#ST` — parked; velocities omitted.
    Stopped,
}

impl FastPositionKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Fast => "^",
            Self::Slow => "#SL",
            Self::Stopped => "#ST",
        }
    }
}

/// `^` / `#SL` / `#ST` — high-rate position updates. Relayed byte-for-byte,
/// so only the fields the server itself needs are pulled out.
#[derive(Debug, Clone)]
pub struct FastPilotPosition {
    pub kind: FastPositionKind,
    pub from: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl FastPilotPosition {
    pub fn parse(packet: &str, kind: FastPositionKind) -> Result<Self, FsdError> {
        let body = body(packet, kind.prefix())?;
        let fields: Vec<&str> = body.split(':').collect();
        let expected = match kind {
            FastPositionKind::Stopped => 7,
            _ => 13,
        };
        if fields.len() != expected {
            return Err(syntax("", "invalid parameter count"));
        }
        let latitude = parse_f64(fields[1], "invalid latitude")?;
        let longitude = parse_f64(fields[2], "invalid longitude")?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(syntax(fields[1], "position out of range"));
        }
        Ok(Self {
            kind,
            from: fields[0].to_owned(),
            latitude,
            longitude,
        })
    }
}

/// `%` — ATC position report.
#[derive(Debug, Clone)]
pub struct AtcPosition {
    pub from: String,
    pub frequency: String,
    pub facility: i32,
    pub visual_range_nm: u32,
    pub rating: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: i32,
}

impl AtcPosition {
    pub fn parse(packet: &str) -> Result<Self, FsdError> {
        let body = body(packet, "%")?;
        let fields: Vec<&str> = body.split(':').collect();
        if fields.len() != 8 {
            return Err(syntax("", "invalid parameter count"));
        }
        let latitude = parse_f64(fields[5], "invalid latitude")?;
        let longitude = parse_f64(fields[6], "invalid longitude")?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(syntax(fields[5], "position out of range"));
        }
        Ok(Self {
            from: fields[0].to_owned(),
            frequency: fields[1].to_owned(),
            facility: parse_i32(fields[2], "invalid facility type")?,
            visual_range_nm: parse_u32(fields[3], "invalid visual range")?,
            rating: parse_i32(fields[4], "invalid rating")?,
            latitude,
            longitude,
            altitude: parse_i32(fields[7], "invalid altitude")?,
        })
    }

    pub fn serialize(&self) -> String {
        format!(
            "%{}:{}:{}:{}:{}:{:.6}:{:.6}:{}{}",
            self.from,
            self.frequency,
            self.facility,
            self.visual_range_nm,
            self.rating,
            self.latitude,
            self.longitude,
            self.altitude,
            PACKET_DELIMITER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbh_round_trip_within_tolerance() {
        for &(pitch, bank, heading) in &[
            (0.0, 0.0, 0.0),
            (2.5, -1.25, 336.0),
            (-15.0, 30.0, 359.5),
            (10.0, -45.0, 180.0),
            (-89.0, 89.0, 1.0),
        ] {
            let (p, b, h) = unpack_pbh(pack_pbh(pitch, bank, heading));
            assert!((p - pitch).abs() < 1.0, "pitch {pitch} came back as {p}");
            assert!((b - bank).abs() < 1.0, "bank {bank} came back as {b}");
            let dh = (h - heading).abs() % 360.0;
            assert!(
                dh.min(360.0 - dh) < 1.0,
                "heading {heading} came back as {h}"
            );
        }
    }

    #[test]
    fn pbh_reserves_low_bits() {
        assert_eq!(pack_pbh(10.0, 10.0, 10.0) & 0b11, 0);
    }

    #[test]
    fn pilot_position_round_trip() {
        let wire = "@N:N123:1200:1:45.000000:45.000000:16:0:4177408112:336\r\n";
        let pdu = PilotPosition::parse(wire).unwrap();
        assert_eq!(pdu.squawking_mode, SquawkingMode::Normal);
        assert_eq!(pdu.from, "N123");
        assert_eq!(pdu.latitude, 45.0);
        assert_eq!(pdu.packed_pbh, 4177408112);
        assert_eq!(pdu.serialize(), wire);
    }

    #[test]
    fn pilot_position_rejects_out_of_range() {
        assert!(
            PilotPosition::parse("@N:N123:1200:1:95.000000:45.000000:16:0:0:336\r\n").is_err()
        );
        assert!(
            PilotPosition::parse("@N:N123:99999:1:45.000000:45.000000:16:0:0:336\r\n").is_err()
        );
        // Squawk digits are octal.
        assert!(
            PilotPosition::parse("@N:N123:1280:1:45.000000:45.000000:16:0:0:336\r\n").is_err()
        );
        assert!(
            PilotPosition::parse("@N:N123:7777:1:45.000000:45.000000:16:0:0:336\r\n").is_ok()
        );
        assert!(PilotPosition::parse("@X:N123:1200:1:45.0:45.0:16:0:0:336\r\n").is_err());
    }

    #[test]
    fn fast_position_field_counts() {
        let fast = "^N123:45.000000:45.000000:1500.00:1480.00:0:10.0000:0.0000:0.0000:0.0000:0.0000:0.0000:0.00\r\n";
        let pdu = FastPilotPosition::parse(fast, FastPositionKind::Fast).unwrap();
        assert_eq!(pdu.from, "N123");
        let stopped = "#STN123:45.000000:45.000000:1500.00:1480.00:0:0.00\r\n";
        assert!(FastPilotPosition::parse(stopped, FastPositionKind::Stopped).is_ok());
        assert!(FastPilotPosition::parse(stopped, FastPositionKind::Slow).is_err());
    }

    #[test]
    fn atc_position_parses() {
        let pdu =
            AtcPosition::parse("%BOS_TWR:118700:4:50:3:42.365000:-71.010000:0\r\n").unwrap();
        assert_eq!(pdu.facility, 4);
        assert_eq!(pdu.visual_range_nm, 50);
        assert_eq!(pdu.longitude, -71.01);
    }
}
