use std::sync::Arc;

use parking_lot::RwLock;

use super::geohash::BUCKET_PRECISION;

pub const BUCKET_COUNT: usize = 1 << BUCKET_PRECISION;

/// One spatial bucket: the addresses whose 15-bit geohash maps here.
/// Membership changes take the write lock; delivery iterates under the
/// read lock.
pub struct Bucket<A> {
    slots: RwLock<Vec<Arc<A>>>,
}

impl<A> Default for Bucket<A> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }
}

impl<A> Bucket<A> {
    pub fn insert(&self, address: Arc<A>) {
        self.slots.write().push(address);
    }

    /// Removes by identity, swap-with-last. Gives memory back once the
    /// bucket is mostly slack, so a flash crowd does not pin its peak
    /// allocation forever.
    pub fn remove(&self, address: &Arc<A>) {
        let mut slots = self.slots.write();
        if let Some(index) = slots.iter().position(|slot| Arc::ptr_eq(slot, address)) {
            slots.swap_remove(index);
            if slots.capacity() > slots.len().saturating_mul(2) {
                slots.shrink_to_fit();
            }
        }
    }

    pub fn for_each(&self, mut f: impl FnMut(&Arc<A>)) {
        for slot in self.slots.read().iter() {
            f(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

/// The whole planet as a flat array of buckets, indexed by 15-bit geohash.
pub struct World<A> {
    buckets: Vec<Bucket<A>>,
}

impl<A> Default for World<A> {
    fn default() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| Bucket::default()).collect(),
        }
    }
}

impl<A> World<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, hash15: u32) -> &Bucket<A> {
        &self.buckets[hash15 as usize & (BUCKET_COUNT - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_is_by_identity() {
        let bucket: Bucket<u32> = Bucket::default();
        let a = Arc::new(7u32);
        let b = Arc::new(7u32);
        bucket.insert(Arc::clone(&a));
        bucket.insert(Arc::clone(&b));
        bucket.remove(&a);
        assert_eq!(bucket.len(), 1);
        let mut left = Vec::new();
        bucket.for_each(|slot| left.push(Arc::clone(slot)));
        assert!(Arc::ptr_eq(&left[0], &b));
        // Removing something absent is a no-op.
        bucket.remove(&a);
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn remove_compacts_slack() {
        let bucket: Bucket<u32> = Bucket::default();
        let members: Vec<_> = (0..64).map(|i| Arc::new(i as u32)).collect();
        for member in &members {
            bucket.insert(Arc::clone(member));
        }
        for member in members.iter().take(60) {
            bucket.remove(member);
        }
        assert_eq!(bucket.len(), 4);
        assert!(bucket.slots.read().capacity() <= 8);
    }

    #[test]
    fn world_indexes_by_low_bits() {
        let world: World<u32> = World::new();
        world.bucket(3).insert(Arc::new(1));
        assert_eq!(world.bucket(3).len(), 1);
        assert!(world.bucket(4).is_empty());
    }
}
