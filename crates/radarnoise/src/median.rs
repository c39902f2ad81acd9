//! Median noise estimates
//!
//! Noise power is estimated as the median power of the gates
//! which were classified as noise. [`compute_median()`] does
//! this for one batch of values. The [`RunningMedian`] collects
//! noise gates across many rays and re-estimates each time
//! its buffer fills.

use arrayvec::ArrayVec;
use strum::IntoEnumIterator;

use crate::moments::{Channel, ChannelValues, GateMoments, MISSING};

/// Median of `vals`
///
/// For an even number of values, returns the *upper* of the two
/// middle values, i.e., element `len / 2` after sorting. Returns
/// [`MISSING`] if `vals` is empty.
pub fn compute_median(vals: &[f64]) -> f64 {
    match vals.len() {
        0 => MISSING,
        1 => vals[0],
        len => {
            let mut sorted = vals.to_vec();
            sorted.sort_by(f64::total_cmp);
            sorted[len / 2]
        }
    }
}

/// Running median of noise power
///
/// Holds one fixed-capacity buffer per channel and a single fill
/// counter shared by all channels. Noise gates are appended until
/// the buffers reach capacity. At that point the median of each
/// buffer becomes the new noise estimate for its channel and the
/// counter returns to zero. The estimate therefore updates once
/// per `window` noise gates, however many rays that takes.
///
/// Every gate occupies one slot in all four buffers. Channels
/// which are not active for that gate, and [`MISSING`] powers,
/// hold a `MISSING` placeholder and are left out of the median.
/// When rays of different polarization modes are mixed, each
/// channel is therefore estimated from however many of its own
/// values the window held. A channel with no values in the
/// window keeps its previous estimate.
///
/// A `RunningMedian` is normally held inside a
/// [`SharedNoiseState`](crate::SharedNoiseState), which guards
/// it with a mutex.
#[derive(Clone, Debug)]
pub struct RunningMedian {
    window: usize,
    count: usize,
    vals: [Vec<f64>; 4],
    estimate: [Option<f64>; 4],
}

impl RunningMedian {
    /// Default buffer capacity (gates)
    pub const DEFAULT_WINDOW: usize = 2500;

    /// New running median with capacity `window` gates
    ///
    /// A zero window is raised to one.
    pub fn new(window: usize) -> Self {
        let window = usize::max(window, 1);
        Self {
            window,
            count: 0,
            vals: std::array::from_fn(|_| vec![MISSING; window]),
            estimate: [None; 4],
        }
    }

    /// Buffer capacity (gates)
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of gates buffered since the last estimate
    pub fn count(&self) -> usize {
        self.count
    }

    /// Change buffer capacity
    ///
    /// If the capacity actually changes, buffered gates are
    /// discarded and the fill count returns to zero. Existing
    /// estimates are kept. Returns `true` if the capacity
    /// changed.
    pub fn set_window(&mut self, window: usize) -> bool {
        let window = usize::max(window, 1);
        if window == self.window {
            return false;
        }

        self.window = window;
        for buf in &mut self.vals {
            buf.clear();
            buf.resize(window, MISSING);
        }
        self.count = 0;
        true
    }

    /// Latest estimate for `chan` (dBm), if one has been made
    pub fn estimate(&self, chan: Channel) -> Option<f64> {
        self.estimate[chan as usize]
    }

    /// Latest estimates for all channels
    ///
    /// Channels without an estimate report [`MISSING`].
    pub fn estimates(&self) -> ChannelValues {
        ChannelValues {
            hc: self.estimate[Channel::Hc as usize].unwrap_or(MISSING),
            vc: self.estimate[Channel::Vc as usize].unwrap_or(MISSING),
            hx: self.estimate[Channel::Hx as usize].unwrap_or(MISSING),
            vx: self.estimate[Channel::Vx as usize].unwrap_or(MISSING),
        }
    }

    /// Append one noise gate
    ///
    /// The lag-0 power of each of the `channels` is buffered.
    /// Returns `true` if the buffer filled and the estimates
    /// were recomputed.
    pub fn push(&mut self, channels: &[Channel], gate: &GateMoments) -> bool {
        self.append(channels, gate).is_some()
    }

    /// Append every flagged gate
    ///
    /// Gates where `noise_flag` is set are pushed in order.
    /// Returns the channels whose estimates were updated by
    /// the last buffer fill, or nothing if the buffer did not
    /// fill.
    pub fn extend(
        &mut self,
        channels: &[Channel],
        gates: &[GateMoments],
        noise_flag: &[bool],
    ) -> ArrayVec<Channel, 4> {
        let mut updated = ArrayVec::new();
        for (gate, _) in gates.iter().zip(noise_flag).filter(|(_, flag)| **flag) {
            if let Some(chans) = self.append(channels, gate) {
                updated = chans;
            }
        }
        updated
    }

    // Buffer one gate; on a full buffer, re-estimate and
    // return the channels which received a new estimate
    fn append(&mut self, channels: &[Channel], gate: &GateMoments) -> Option<ArrayVec<Channel, 4>> {
        for chan in Channel::iter() {
            self.vals[chan as usize][self.count] = if channels.contains(&chan) {
                gate.lag0_db(chan)
            } else {
                MISSING
            };
        }
        self.count += 1;

        if self.count < self.window {
            return None;
        }

        let mut updated = ArrayVec::new();
        for chan in Channel::iter() {
            let valid: Vec<f64> = self.vals[chan as usize]
                .iter()
                .copied()
                .filter(|v| *v != MISSING)
                .collect();
            let median = compute_median(&valid);
            if median != MISSING {
                self.estimate[chan as usize] = Some(median);
                updated.push(chan);
            }
        }
        self.count = 0;
        Some(updated)
    }
}

impl Default for RunningMedian {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
