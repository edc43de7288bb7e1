//! Tile coordinate model
//!
//! Tile addresses are packed into 32 bits so that millions of them can be
//! held and compared cheaply while grouping per-tile features. The packing
//! also defines the canonical output order of the pipeline: ascending packed
//! value visits zooms low to high, columns west to east, and rows inside a
//! column in the archive's storage order.

mod bounds;
mod extents;

pub use bounds::LatLonBounds;
pub use extents::{TileExtents, ZoomExtent};

use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;

/// Highest zoom level a packed coordinate can carry.
pub const MAX_ZOOM: u8 = 14;

const XY_MASK: u32 = (1 << 14) - 1;

/// A (z, x, y) tile address packed into 32 bits.
///
/// Layout: the high nibble holds a remapped zoom code, bits 14..27 hold x,
/// and bits 0..13 hold the complemented row `(2^z - 1) - y`. The zoom remap
/// (z < 8 stored as z + 8, z >= 8 as z - 8) puts the sign bit on low zooms,
/// so comparing packed values as `i32` yields zoom-major order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    encoded: u32,
}

impl TileCoord {
    /// Creates a coordinate from x, y and zoom.
    ///
    /// `x` wraps modulo `2^z` (negative values included) since the world is
    /// cyclic east-west; `y` clamps to `[0, 2^z - 1]`.
    pub fn of_xyz(x: i32, y: i32, z: u8) -> Self {
        debug_assert!(z <= MAX_ZOOM, "zoom {} out of range", z);
        let max = 1i32 << z;
        let x = x.rem_euclid(max);
        let y = y.clamp(0, max - 1);
        let z_code = u32::from(if z < 8 { z + 8 } else { z - 8 });
        Self {
            encoded: (z_code << 28) | ((x as u32) << 14) | ((max - 1 - y) as u32),
        }
    }

    /// Reconstructs a coordinate from its packed form.
    pub fn decode(encoded: u32) -> Self {
        Self { encoded }
    }

    /// The packed 32-bit form.
    #[inline]
    pub fn encoded(&self) -> u32 {
        self.encoded
    }

    /// Zoom level, 0..=14.
    #[inline]
    pub fn z(&self) -> u8 {
        let z_code = (self.encoded >> 28) as u8;
        if z_code >= 8 {
            z_code - 8
        } else {
            z_code + 8
        }
    }

    /// Column, 0 at the antimeridian heading east.
    #[inline]
    pub fn x(&self) -> u32 {
        (self.encoded >> 14) & XY_MASK
    }

    /// Row, 0 at the north edge heading south.
    #[inline]
    pub fn y(&self) -> u32 {
        ((1u32 << self.z()) - 1) - (self.encoded & XY_MASK)
    }

    /// Row under the TMS convention: `(2^z - 1) - y`.
    ///
    /// This equals the complemented row stored in the low bits, which is why
    /// ascending packed order matches the archive's row order.
    #[inline]
    pub fn tms_y(&self) -> u32 {
        self.encoded & XY_MASK
    }

    /// Latitude/longitude of this tile's northwest corner.
    pub fn lat_lon(&self) -> (f64, f64) {
        let n = f64::from(1u32 << self.z());
        let lon = self.x() as f64 / n * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * (self.y() as f64 / n)))
            .sinh()
            .atan()
            .to_degrees();
        (lat, lon)
    }

    /// An openstreetmap.org deep link centered on this tile's northwest
    /// corner, for progress logs.
    pub fn osm_debug_url(&self) -> String {
        let (lat, lon) = self.lat_lon();
        format!(
            "https://www.openstreetmap.org/#map={}/{}/{}",
            self.z(),
            format_degrees(lat),
            format_degrees(lon)
        )
    }
}

/// Formats an angle with at most five fractional digits, trailing zeros
/// trimmed.
fn format_degrees(value: f64) -> String {
    let mut s = format!("{:.5}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

impl Ord for TileCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        // Signed comparison: the zoom remap places z 0..=7 in the negative
        // range so low zooms sort first.
        (self.encoded as i32).cmp(&(other.encoded as i32))
    }
}

impl PartialOrd for TileCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{x={} y={} z={}}}", self.x(), self.y(), self.z())
    }
}

impl fmt::Debug for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileCoord({}/{}/{})", self.z(), self.x(), self.y())
    }
}
