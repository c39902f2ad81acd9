//! Spatial cache of recent noise estimates
//!
//! When a ray has too few noise gates to estimate the noise
//! on its own, we borrow the estimate from a recent ray which
//! pointed in nearly the same direction. The
//! [`SpatialNoiseCache`] is a grid over (elevation, azimuth)
//! which remembers the last estimate made in each bin.

use std::sync::Mutex;

use crate::moments::{Channel, ChannelValues};

/// Number of elevation bins
pub const GRID_SIZE_EL: usize = 720;

/// Number of azimuth bins
pub const GRID_SIZE_AZ: usize = 720;

/// Elevation bin width (deg)
pub const GRID_RES_EL: f64 = 360.0 / GRID_SIZE_EL as f64;

/// Azimuth bin width (deg)
pub const GRID_RES_AZ: f64 = 360.0 / GRID_SIZE_AZ as f64;

/// Neighbor search order as `(d_el, d_az)` bin offsets
///
/// Starts at the center bin, then the four edge neighbors,
/// then the four corners, then the ring two bins out. The
/// first hit in this order is taken as the nearest.
pub const SEARCH_KERNEL: [(isize, isize); 25] = [
    (0, 0),
    (0, -1),
    (0, 1),
    (1, 0),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, -1),
    (-1, 1),
    (0, -2),
    (0, 2),
    (1, -2),
    (1, 2),
    (2, 0),
    (2, -1),
    (2, 1),
    (2, -2),
    (2, 2),
    (-1, -2),
    (-1, 2),
    (-2, 0),
    (-2, -1),
    (-2, 1),
    (-2, -2),
    (-2, 2),
];

/// Bin in the spatial grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridIndex {
    el: usize,
    az: usize,
}

impl GridIndex {
    /// Bin containing the given pointing angles (deg)
    ///
    /// Angles of any sign or magnitude are wrapped into the grid.
    pub fn from_angles(elevation: f64, azimuth: f64) -> Self {
        Self {
            el: wrap_bin((elevation / GRID_RES_EL) as isize, GRID_SIZE_EL),
            az: wrap_bin((azimuth / GRID_RES_AZ) as isize, GRID_SIZE_AZ),
        }
    }

    /// Bin from indices, wrapped into the grid
    pub fn new(el: isize, az: isize) -> Self {
        Self {
            el: wrap_bin(el, GRID_SIZE_EL),
            az: wrap_bin(az, GRID_SIZE_AZ),
        }
    }

    /// Elevation bin, `[0, GRID_SIZE_EL)`
    pub fn el(&self) -> usize {
        self.el
    }

    /// Azimuth bin, `[0, GRID_SIZE_AZ)`
    pub fn az(&self) -> usize {
        self.az
    }

    /// Neighboring bin at the given offset, wrapping at the edges
    pub fn offset(&self, d_el: isize, d_az: isize) -> Self {
        Self::new(self.el as isize + d_el, self.az as isize + d_az)
    }

    fn flat(&self) -> usize {
        self.el * GRID_SIZE_AZ + self.az
    }
}

fn wrap_bin(idx: isize, size: usize) -> usize {
    idx.rem_euclid(size as isize) as usize
}

/// Grid of the most recent noise estimate in each direction
///
/// Each bin holds a [`ChannelValues`] of noise power (dBm).
/// A channel value of exactly `0.0` means "never set." All
/// access goes through an internal mutex, so the cache may be
/// shared between threads. The last writer to a bin wins.
#[derive(Debug)]
pub struct SpatialNoiseCache {
    grid: Mutex<Vec<ChannelValues>>,
}

impl SpatialNoiseCache {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            grid: Mutex::new(vec![ChannelValues::default(); GRID_SIZE_EL * GRID_SIZE_AZ]),
        }
    }

    /// Stored values at `idx`, if any channel has been set
    pub fn get(&self, idx: GridIndex) -> Option<ChannelValues> {
        let entry = self.lock()[idx.flat()];
        if entry == ChannelValues::default() {
            None
        } else {
            Some(entry)
        }
    }

    /// Overwrite all channels at `idx`
    pub fn set(&self, idx: GridIndex, vals: ChannelValues) {
        self.lock()[idx.flat()] = vals;
    }

    /// Overwrite only the given `channels` at `idx`
    ///
    /// Other channels in the bin keep their old values.
    pub fn store(&self, idx: GridIndex, channels: &[Channel], vals: &ChannelValues) {
        let mut grid = self.lock();
        let entry = &mut grid[idx.flat()];
        for &chan in channels {
            entry[chan] = vals[chan];
        }
    }

    /// Nearest stored values with `primary` set
    ///
    /// Searches outward from `idx` in [`SEARCH_KERNEL`] order,
    /// up to two bins away in each direction. Returns the first
    /// bin whose `primary` channel has been set, or `None`.
    pub fn find_closest(&self, idx: GridIndex, primary: Channel) -> Option<ChannelValues> {
        let grid = self.lock();
        SEARCH_KERNEL
            .iter()
            .map(|&(d_el, d_az)| grid[idx.offset(d_el, d_az).flat()])
            .find(|entry| entry[primary] != 0.0)
    }

    /// Forget every stored value
    pub fn clear(&self) {
        self.lock().fill(ChannelValues::default());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ChannelValues>> {
        self.grid
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for SpatialNoiseCache {
    fn default() -> Self {
        Self::new()
    }
}
