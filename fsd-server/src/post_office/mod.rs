//! The post office: who is online, where they are, and how packets reach
//! them. Sessions register under their callsign, report positions that
//! place them in geohash buckets, and hand outbound mail here for
//! direct, broadcast or proximity delivery.

pub mod geohash;
pub mod registry;
pub mod world;

use std::sync::Arc;

use thiserror::Error;

use crate::wire::{NetworkRating, PROTO_REVISION_VELOCITY};
use geohash::{BUCKET_PRECISION, CLOSE_PRECISION, UNPLACED};
use registry::{KeyInUse, Registry};
use world::World;

pub const METERS_PER_NM: f64 = 1852.0;

/// What the post office needs from a registered client. Implemented by the
/// live session; tests register lightweight fakes.
pub trait Address: Send + Sync + 'static {
    fn callsign(&self) -> &str;
    fn network_rating(&self) -> NetworkRating;
    fn is_atc(&self) -> bool;
    fn protocol_revision(&self) -> u32;

    /// Full-resolution geohash, or [`geohash::UNPLACED`] before the first
    /// position report. Only [`PostOffice::set_location`] writes this.
    fn geohash(&self) -> u32;
    fn set_geohash(&self, hash: u32);
    fn position(&self) -> (f64, f64);

    /// Queues a packet for ordinary delivery; may drop when the recipient
    /// is backed up.
    fn send_packet(&self, packet: &str);

    /// Removal lane: deliver `packet` and disconnect. False when the
    /// client's removal lane is already occupied or gone.
    fn send_kill(&self, packet: &str) -> bool;

    /// Distance in meters to the nearest velocity-capable pilot, observed
    /// during the latest general proximity fan-out.
    fn note_closest_velocity_peer(&self, meters: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientFilter {
    Any,
    AtcOnly,
    /// Only clients on the velocity protocol revision.
    VelocityCapable,
}

#[derive(Debug, Clone)]
pub enum MailKind {
    /// To one callsign; silently dropped if they left in the meantime.
    Direct(String),
    /// To every registered client.
    Broadcast,
    /// To the sender's 15-bit geohash cell and its eight neighbors.
    GeneralProximity,
    /// To the sender's 25-bit cell and its eight neighbors.
    CloseProximity,
    /// To every connected supervisor and administrator.
    Supervisors,
}

pub struct Mail<A> {
    pub source: Arc<A>,
    pub kind: MailKind,
    pub filter: RecipientFilter,
    pub packet: String,
}

impl<A> Mail<A> {
    pub fn new(source: Arc<A>, kind: MailKind, packet: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            filter: RecipientFilter::Any,
            packet: packet.into(),
        }
    }

    pub fn filtered(mut self, filter: RecipientFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KillError {
    #[error("callsign not registered")]
    NotRegistered,
    #[error("client unavailable")]
    Unavailable,
}

pub struct PostOffice<A> {
    registry: Registry<A>,
    supervisors: Registry<A>,
    world: World<A>,
}

impl<A> Default for PostOffice<A> {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            supervisors: Registry::new(),
            world: World::new(),
        }
    }
}

impl<A: Address> PostOffice<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callsign. Main registry first, then the supervisor
    /// registry, so nobody can be seen as a supervisor without being
    /// registered.
    pub fn register(&self, address: Arc<A>) -> Result<(), KeyInUse> {
        let callsign = address.callsign().to_owned();
        self.registry.store(&callsign, Arc::clone(&address))?;
        if address.network_rating() >= NetworkRating::Supervisor {
            // Cannot collide: the main registry already arbitrated the key.
            let _ = self.supervisors.store(&callsign, address);
        }
        Ok(())
    }

    /// Removes a client, supervisor registry first (mirror of register),
    /// and empties their world bucket slot.
    pub fn deregister(&self, address: &Arc<A>) {
        self.supervisors.delete(address.callsign());
        self.registry.delete(address.callsign());
        let hash = address.geohash();
        if hash != UNPLACED {
            self.world
                .bucket(geohash::truncate(hash, BUCKET_PRECISION))
                .remove(address);
        }
    }

    pub fn find(&self, callsign: &str) -> Option<Arc<A>> {
        self.registry.load(callsign)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<A>> {
        self.registry.snapshot()
    }

    /// Moves an address to a new position, rebucketing only when the
    /// 15-bit cell actually changed.
    pub fn set_location(&self, address: &Arc<A>, latitude: f64, longitude: f64) {
        let new_hash = geohash::encode(latitude, longitude);
        let old_hash = address.geohash();
        if old_hash != UNPLACED
            && geohash::truncate(old_hash, BUCKET_PRECISION)
                == geohash::truncate(new_hash, BUCKET_PRECISION)
        {
            address.set_geohash(new_hash);
            return;
        }
        if old_hash != UNPLACED {
            self.world
                .bucket(geohash::truncate(old_hash, BUCKET_PRECISION))
                .remove(address);
        }
        address.set_geohash(new_hash);
        self.world
            .bucket(geohash::truncate(new_hash, BUCKET_PRECISION))
            .insert(Arc::clone(address));
    }

    pub fn send_mail(&self, mail: &Mail<A>) {
        match &mail.kind {
            MailKind::Direct(to) => {
                if let Some(recipient) = self.registry.load(to) {
                    recipient.send_packet(&mail.packet);
                }
            }
            MailKind::Broadcast => {
                for recipient in self.registry.snapshot() {
                    if Arc::ptr_eq(&recipient, &mail.source) {
                        continue;
                    }
                    if accepts(&recipient, mail.filter) {
                        recipient.send_packet(&mail.packet);
                    }
                }
            }
            MailKind::Supervisors => {
                for recipient in self.supervisors.snapshot() {
                    if !Arc::ptr_eq(&recipient, &mail.source) {
                        recipient.send_packet(&mail.packet);
                    }
                }
            }
            MailKind::GeneralProximity => self.send_proximity(mail, BUCKET_PRECISION),
            MailKind::CloseProximity => self.send_proximity(mail, CLOSE_PRECISION),
        }
    }

    /// Delivers to everyone in the source's `precision`-bit cell and the
    /// eight surrounding cells. For velocity-capable pilot senders this is
    /// also where the closest-peer distance feeding the send-fast
    /// hysteresis is measured.
    fn send_proximity(&self, mail: &Mail<A>, precision: u8) {
        let source_hash = mail.source.geohash();
        if source_hash == UNPLACED {
            return;
        }
        let track_velocity_peers = precision == BUCKET_PRECISION
            && !mail.source.is_atc()
            && mail.source.protocol_revision() == PROTO_REVISION_VELOCITY;
        let source_position = mail.source.position();
        let mut closest = f64::INFINITY;

        let cell = geohash::truncate(source_hash, precision);
        let mut deliver_cell = |target_cell: u32| {
            let bucket = self
                .world
                .bucket(target_cell >> (precision - BUCKET_PRECISION));
            bucket.for_each(|recipient| {
                if Arc::ptr_eq(recipient, &mail.source) {
                    return;
                }
                if geohash::truncate(recipient.geohash(), precision) != target_cell {
                    return;
                }
                if track_velocity_peers
                    && !recipient.is_atc()
                    && recipient.protocol_revision() == PROTO_REVISION_VELOCITY
                {
                    let distance = distance_meters(source_position, recipient.position());
                    if distance < closest {
                        closest = distance;
                    }
                }
                if accepts(recipient, mail.filter) {
                    recipient.send_packet(&mail.packet);
                }
            });
        };

        deliver_cell(cell);
        for neighbor in geohash::neighbors(cell, precision) {
            if neighbor != cell {
                deliver_cell(neighbor);
            }
        }

        if track_velocity_peers {
            mail.source.note_closest_velocity_peer(closest);
        }
    }

    /// Sends `packet` down the target's removal lane.
    pub fn kill(&self, callsign: &str, packet: &str) -> Result<(), KillError> {
        let target = self
            .registry
            .load(callsign)
            .ok_or(KillError::NotRegistered)?;
        if target.send_kill(packet) {
            Ok(())
        } else {
            Err(KillError::Unavailable)
        }
    }
}

fn accepts<A: Address>(recipient: &Arc<A>, filter: RecipientFilter) -> bool {
    match filter {
        RecipientFilter::Any => true,
        RecipientFilter::AtcOnly => recipient.is_atc(),
        RecipientFilter::VelocityCapable => {
            recipient.protocol_revision() == PROTO_REVISION_VELOCITY
        }
    }
}

/// Great-circle distance in meters.
pub fn distance_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
