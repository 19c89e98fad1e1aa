//! A logged-in client: identity fixed at login, mutable spatial and
//! flight-plan state, the per-session auth chain, and the two inbound
//! lanes (mailbox and kill) feeding its event loop.

pub mod connection;
pub mod event_loop;
pub mod login;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::auth::AuthCompanion;
use crate::post_office::{geohash, Address, METERS_PER_NM};
use crate::wire::pdu::{unpack_pbh, AtcPosition, PilotPosition};
use crate::wire::NetworkRating;
use connection::Connection;

/// Mailbox depth; beyond this, packets to a slow client are dropped.
const MAILBOX_DEPTH: usize = 32;

/// Pilots are visible at a fixed range; ATC declare theirs in `%`.
const PILOT_VISUAL_RANGE_NM: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct SpatialState {
    pub latitude: f64,
    pub longitude: f64,
    pub true_altitude: i32,
    pub ground_speed: i32,
    pub heading: f64,
    pub transponder: String,
    pub visual_range_m: f64,
    pub last_updated: DateTime<Utc>,
}

impl SpatialState {
    fn empty(visual_range_m: f64) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            true_altitude: 0,
            ground_speed: 0,
            heading: 0.0,
            transponder: String::new(),
            visual_range_m,
            last_updated: Utc::now(),
        }
    }
}

/// Everything login learned about the client, fixed for the session.
pub struct Profile {
    pub callsign: String,
    pub cid: u32,
    pub real_name: String,
    pub network_rating: NetworkRating,
    pub pilot_rating: i32,
    pub protocol_revision: u32,
    pub simulator_type: i32,
    pub is_atc: bool,
    pub client_id: u16,
}

/// Receiver halves owned by the event loop.
pub struct SessionChannels {
    pub mailbox_rx: mpsc::Receiver<String>,
    pub kill_rx: mpsc::Receiver<String>,
}

pub struct Session {
    connection: Arc<Connection>,
    pub profile: Profile,
    pub logon_time: DateTime<Utc>,

    /// Predicts the client's answers to our `$ZC` challenges.
    auth_verify: Mutex<AuthCompanion>,
    /// Answers the client's own challenges.
    auth_self: Mutex<AuthCompanion>,
    /// Challenge we sent and have not yet had answered.
    pending_challenge: Mutex<Option<String>>,

    spatial: RwLock<SpatialState>,
    geohash: AtomicU32,
    closest_velocity_peer: AtomicU64,
    send_fast: AtomicBool,

    facility: AtomicI32,
    frequency: Mutex<String>,

    flight_plan: Mutex<Option<String>>,
    beacon_code: Mutex<Option<String>>,

    mailbox_tx: mpsc::Sender<String>,
    kill_tx: mpsc::Sender<String>,
}

impl Session {
    pub fn new(
        connection: Arc<Connection>,
        profile: Profile,
        auth_verify: AuthCompanion,
        auth_self: AuthCompanion,
    ) -> (Arc<Self>, SessionChannels) {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(MAILBOX_DEPTH);
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let session = Arc::new(Self {
            connection,
            profile,
            logon_time: Utc::now(),
            auth_verify: Mutex::new(auth_verify),
            auth_self: Mutex::new(auth_self),
            pending_challenge: Mutex::new(None),
            spatial: RwLock::new(SpatialState::empty(PILOT_VISUAL_RANGE_NM * METERS_PER_NM)),
            geohash: AtomicU32::new(geohash::UNPLACED),
            closest_velocity_peer: AtomicU64::new(f64::INFINITY.to_bits()),
            send_fast: AtomicBool::new(false),
            facility: AtomicI32::new(0),
            frequency: Mutex::new(String::new()),
            flight_plan: Mutex::new(None),
            beacon_code: Mutex::new(None),
            mailbox_tx,
            kill_tx,
        });
        (session, SessionChannels { mailbox_rx, kill_rx })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn spatial(&self) -> SpatialState {
        self.spatial.read().clone()
    }

    pub fn update_pilot_position(&self, pdu: &PilotPosition) {
        let (_, _, heading) = unpack_pbh(pdu.packed_pbh);
        let mut spatial = self.spatial.write();
        spatial.latitude = pdu.latitude;
        spatial.longitude = pdu.longitude;
        spatial.true_altitude = pdu.true_altitude;
        spatial.ground_speed = pdu.ground_speed;
        spatial.heading = heading;
        spatial.transponder = pdu.squawk_code.clone();
        spatial.visual_range_m = PILOT_VISUAL_RANGE_NM * METERS_PER_NM;
        spatial.last_updated = Utc::now();
    }

    pub fn update_atc_position(&self, pdu: &AtcPosition) {
        self.facility.store(pdu.facility, Ordering::Relaxed);
        *self.frequency.lock() = pdu.frequency.clone();
        let mut spatial = self.spatial.write();
        spatial.latitude = pdu.latitude;
        spatial.longitude = pdu.longitude;
        spatial.true_altitude = pdu.altitude;
        spatial.visual_range_m = f64::from(pdu.visual_range_nm) * METERS_PER_NM;
        spatial.last_updated = Utc::now();
    }

    pub fn update_fast_position(&self, latitude: f64, longitude: f64) {
        let mut spatial = self.spatial.write();
        spatial.latitude = latitude;
        spatial.longitude = longitude;
        spatial.last_updated = Utc::now();
    }

    pub fn facility(&self) -> i32 {
        self.facility.load(Ordering::Relaxed)
    }

    pub fn set_facility(&self, facility: i32) {
        self.facility.store(facility, Ordering::Relaxed);
    }

    pub fn frequency(&self) -> String {
        self.frequency.lock().clone()
    }

    pub fn flight_plan(&self) -> Option<String> {
        self.flight_plan.lock().clone()
    }

    pub fn set_flight_plan(&self, plan: String) {
        *self.flight_plan.lock() = Some(plan);
    }

    pub fn beacon_code(&self) -> Option<String> {
        self.beacon_code.lock().clone()
    }

    pub fn set_beacon_code(&self, code: String) {
        *self.beacon_code.lock() = Some(code);
    }

    pub fn send_fast_enabled(&self) -> bool {
        self.send_fast.load(Ordering::Relaxed)
    }

    pub fn set_send_fast(&self, enabled: bool) {
        self.send_fast.store(enabled, Ordering::Relaxed);
    }

    /// Distance to the nearest velocity-capable pilot as of the last
    /// general proximity fan-out. Infinite until one has been seen.
    pub fn closest_velocity_peer_m(&self) -> f64 {
        f64::from_bits(self.closest_velocity_peer.load(Ordering::Relaxed))
    }

    pub fn take_pending_challenge(&self) -> Option<String> {
        self.pending_challenge.lock().take()
    }

    pub fn set_pending_challenge(&self, challenge: String) {
        *self.pending_challenge.lock() = Some(challenge);
    }

    /// Expected response to `challenge` from the verifying chain.
    pub fn expected_response(&self, challenge: &str) -> String {
        self.auth_verify.lock().response_to(challenge)
    }

    pub fn advance_verify_chain(&self, response: &str) {
        self.auth_verify.lock().update_state(response);
    }

    /// Answers a challenge from the client and advances the answering
    /// chain past the round.
    pub fn answer_challenge(&self, challenge: &str) -> String {
        let mut auth = self.auth_self.lock();
        let response = auth.response_to(challenge);
        auth.update_state(&response);
        response
    }
}

impl Address for Session {
    fn callsign(&self) -> &str {
        &self.profile.callsign
    }

    fn network_rating(&self) -> NetworkRating {
        self.profile.network_rating
    }

    fn is_atc(&self) -> bool {
        self.profile.is_atc
    }

    fn protocol_revision(&self) -> u32 {
        self.profile.protocol_revision
    }

    fn geohash(&self) -> u32 {
        self.geohash.load(Ordering::Relaxed)
    }

    fn set_geohash(&self, hash: u32) {
        self.geohash.store(hash, Ordering::Relaxed);
    }

    fn position(&self) -> (f64, f64) {
        let spatial = self.spatial.read();
        (spatial.latitude, spatial.longitude)
    }

    fn send_packet(&self, packet: &str) {
        // Slow consumers lose packets rather than stalling the sender.
        if self.mailbox_tx.try_send(packet.to_owned()).is_err() {
            tracing::trace!(callsign = %self.profile.callsign, "mailbox full, dropping packet");
        }
    }

    fn send_kill(&self, packet: &str) -> bool {
        self.kill_tx.try_send(packet.to_owned()).is_ok()
    }

    fn note_closest_velocity_peer(&self, meters: f64) {
        self.closest_velocity_peer
            .store(meters.to_bits(), Ordering::Relaxed);
    }
}
