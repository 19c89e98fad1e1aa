//! Integer geohash over WGS84 lat/lon: alternating longitude/latitude
//! bisection, most significant bit first, longitude first. The full 30-bit
//! hash resolves to roughly a 0.005 x 0.01 degree cell; right-shifting
//! coarsens it, and the 15-bit truncation doubles as the world bucket index.

/// Bits in a full-resolution hash.
pub const FULL_PRECISION: u8 = 30;
/// Bucket index precision; also the "general proximity" search precision.
pub const BUCKET_PRECISION: u8 = 15;
/// Search precision for close-proximity (fast position) traffic.
pub const CLOSE_PRECISION: u8 = 25;

/// Sentinel for an address that has not reported a position yet.
pub const UNPLACED: u32 = u32::MAX;

pub fn encode(latitude: f64, longitude: f64) -> u32 {
    let mut lat = (-90.0, 90.0);
    let mut lon = (-180.0, 180.0);
    let mut hash = 0u32;
    for step in 0..FULL_PRECISION {
        hash <<= 1;
        let range = if step % 2 == 0 { &mut lon } else { &mut lat };
        let value = if step % 2 == 0 { longitude } else { latitude };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            hash |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
    }
    hash
}

/// Truncates a full-resolution hash to `precision` bits.
pub fn truncate(hash: u32, precision: u8) -> u32 {
    hash >> (FULL_PRECISION - precision)
}

/// Center of the cell described by a `precision`-bit hash.
pub fn decode_center(hash: u32, precision: u8) -> (f64, f64) {
    let mut lat = (-90.0, 90.0);
    let mut lon = (-180.0, 180.0);
    for step in 0..precision {
        let bit = (hash >> (precision - 1 - step)) & 1;
        let range = if step % 2 == 0 { &mut lon } else { &mut lat };
        let mid = (range.0 + range.1) / 2.0;
        if bit == 1 {
            range.0 = mid;
        } else {
            range.1 = mid;
        }
    }
    ((lat.0 + lat.1) / 2.0, (lon.0 + lon.1) / 2.0)
}

/// Extent of one cell at `precision` bits, degrees of (latitude, longitude).
fn cell_extent(precision: u8) -> (f64, f64) {
    let lon_bits = precision.div_ceil(2);
    let lat_bits = precision / 2;
    (
        180.0 / (1u64 << lat_bits) as f64,
        360.0 / (1u64 << lon_bits) as f64,
    )
}

/// The eight cells surrounding a `precision`-bit cell, clockwise from the
/// north. Longitude wraps at the antimeridian; latitude clamps at the
/// poles, where some neighbors collapse into the same cell.
pub fn neighbors(hash: u32, precision: u8) -> [u32; 8] {
    let (lat, lon) = decode_center(hash, precision);
    let (dlat, dlon) = cell_extent(precision);
    const DIRECTIONS: [(f64, f64); 8] = [
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
        (-1.0, 1.0),
        (-1.0, 0.0),
        (-1.0, -1.0),
        (0.0, -1.0),
        (1.0, -1.0),
    ];
    DIRECTIONS.map(|(y, x)| {
        let nlat = (lat + y * dlat).clamp(-90.0, 90.0);
        let mut nlon = lon + x * dlon;
        if nlon >= 180.0 {
            nlon -= 360.0;
        } else if nlon < -180.0 {
            nlon += 360.0;
        }
        truncate(encode(nlat, nlon), precision)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_stable_and_local() {
        let a = encode(45.0, 45.0);
        let b = encode(45.0, 45.0);
        assert_eq!(a, b);
        // Nearby positions share the coarse prefix, far ones do not.
        let near = encode(45.001, 45.001);
        assert_eq!(truncate(a, BUCKET_PRECISION), truncate(near, BUCKET_PRECISION));
        let far = encode(-45.0, -45.0);
        assert_ne!(truncate(a, BUCKET_PRECISION), truncate(far, BUCKET_PRECISION));
    }

    #[test]
    fn bucket_index_fits() {
        for &(lat, lon) in &[(0.0, 0.0), (89.9, 179.9), (-89.9, -179.9), (45.0, 45.0)] {
            assert!(truncate(encode(lat, lon), BUCKET_PRECISION) < (1 << BUCKET_PRECISION));
        }
    }

    #[test]
    fn decode_center_inverts_encode() {
        for &(lat, lon) in &[(42.365, -71.01), (0.0, 0.0), (-33.95, 151.18)] {
            let (dlat, dlon) = decode_center(encode(lat, lon), FULL_PRECISION);
            assert!((dlat - lat).abs() < 0.01, "{lat} decoded to {dlat}");
            assert!((dlon - lon).abs() < 0.02, "{lon} decoded to {dlon}");
        }
    }

    #[test]
    fn neighbors_are_adjacent_and_distinct() {
        let hash = truncate(encode(45.0, 45.0), BUCKET_PRECISION);
        let ring = neighbors(hash, BUCKET_PRECISION);
        for n in ring {
            assert_ne!(n, hash);
            assert!(n < (1 << BUCKET_PRECISION));
        }
        // Away from poles all eight are distinct.
        let mut sorted = ring.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
    }

    #[test]
    fn neighbors_wrap_longitude() {
        let hash = truncate(encode(0.0, 179.99), BUCKET_PRECISION);
        let ring = neighbors(hash, BUCKET_PRECISION);
        let west_side = truncate(encode(0.0, -179.99), BUCKET_PRECISION);
        assert!(ring.contains(&west_side));
    }
}
