//! Sliding-window features for noise detection
//!
//! For every gate along a ray, [`RayFeatures`] computes
//! statistics over a kernel of neighboring gates:
//!
//! * *phase-change error*: how far the unwrapped phase strays
//!   from a straight line drawn between the kernel endpoints.
//!   Coherent targets have a nearly linear phase progression
//!   (i.e., a steady Doppler velocity). Noise does not.
//! * *dBm standard deviation*: power is noisy when noise is
//!   all there is.
//! * *NCP mean*: noise is incoherent from pulse to pulse.
//!
//! Features which cannot be computed are left at [`MISSING`].

use crate::moments::{GateMoments, MISSING};
use crate::phase::accumulate_phase;

/// Per-gate features for one ray
///
/// The arrays are resized and recomputed on every call to
/// [`compute()`](#method.compute). They belong to a single
/// ray and are never shared.
#[derive(Clone, Debug, Default)]
pub struct RayFeatures {
    start_gate: Vec<usize>,
    end_gate: Vec<usize>,
    accum_phase_change: Vec<f64>,
    phase_change_error: Vec<f64>,
    dbm_sdev: Vec<f64>,
    ncp_mean: Vec<f64>,
}

impl RayFeatures {
    /// Compute features for every gate in `gates`
    ///
    /// `n_gates_kernel` is the requested kernel width. It is
    /// forced odd (rounding up) so that the kernel can be
    /// centered on a gate.
    ///
    /// The unwrapped phase is always computed. If the ray is
    /// shorter than the kernel, nothing else is, and this
    /// method returns `false`.
    pub fn compute(&mut self, gates: &[GateMoments], n_gates_kernel: usize) -> bool {
        let n_gates = gates.len();
        self.reset(n_gates);

        accumulate_phase(
            gates.iter().map(|g| g.phase_for_noise),
            &mut self.accum_phase_change,
        );

        let kernel_half = n_gates_kernel / 2;
        let kernel_size = kernel_half * 2 + 1;
        if n_gates < kernel_size {
            return false;
        }

        for igate in 0..n_gates {
            let (start, end) = kernel_bounds(igate, kernel_half, n_gates);
            self.start_gate[igate] = start;
            self.end_gate[igate] = end;
            self.phase_change_error[igate] =
                phase_change_error(&self.accum_phase_change[start..=end]);
            self.dbm_sdev[igate] = dbm_sdev(gates[start..=end].iter().map(|g| g.dbm_for_noise));
            self.ncp_mean[igate] = ncp_mean(gates[start..=end].iter().map(|g| g.ncp));
        }

        true
    }

    /// Number of gates in the last computation
    pub fn len(&self) -> usize {
        self.accum_phase_change.len()
    }

    /// True if no gates have been computed
    pub fn is_empty(&self) -> bool {
        self.accum_phase_change.is_empty()
    }

    /// Kernel start gate, per gate
    pub fn start_gate(&self) -> &[usize] {
        &self.start_gate
    }

    /// Kernel end gate (inclusive), per gate
    pub fn end_gate(&self) -> &[usize] {
        &self.end_gate
    }

    /// Unwrapped phase (deg)
    pub fn accum_phase_change(&self) -> &[f64] {
        &self.accum_phase_change
    }

    /// Phase-change error (deg)
    pub fn phase_change_error(&self) -> &[f64] {
        &self.phase_change_error
    }

    /// Power standard deviation (dB)
    pub fn dbm_sdev(&self) -> &[f64] {
        &self.dbm_sdev
    }

    /// Mean NCP
    pub fn ncp_mean(&self) -> &[f64] {
        &self.ncp_mean
    }

    fn reset(&mut self, n_gates: usize) {
        for arr in [&mut self.start_gate, &mut self.end_gate] {
            arr.clear();
            arr.resize(n_gates, 0);
        }
        for arr in [
            &mut self.phase_change_error,
            &mut self.dbm_sdev,
            &mut self.ncp_mean,
        ] {
            arr.clear();
            arr.resize(n_gates, MISSING);
        }
    }
}

/// Kernel bounds around gate `igate`
///
/// Returns the inclusive range `(start, end)` of width
/// `2 * kernel_half + 1`, centered on `igate` and shifted
/// inward at either end of the ray. Requires
/// `n_gates >= 2 * kernel_half + 1`.
pub fn kernel_bounds(igate: usize, kernel_half: usize, n_gates: usize) -> (usize, usize) {
    let width = 2 * kernel_half + 1;
    let start = igate
        .saturating_sub(kernel_half)
        .min(n_gates.saturating_sub(width));
    (start, start + width - 1)
}

/// Mean absolute deviation from a two-point line
///
/// A line is drawn from the first to the last element of
/// `phase`. Returns the mean absolute difference between
/// each interior element and that line, or [`MISSING`] if
/// there are no interior elements.
pub fn phase_change_error(phase: &[f64]) -> f64 {
    if phase.len() < 3 {
        return MISSING;
    }

    let first = phase[0];
    let last = phase[phase.len() - 1];
    let slope = (last - first) / (phase.len() - 1) as f64;

    let interior = &phase[1..phase.len() - 1];
    let sum_abs_error: f64 = interior
        .iter()
        .enumerate()
        .map(|(i, ph)| (ph - (first + slope * (i + 1) as f64)).abs())
        .sum();

    sum_abs_error / interior.len() as f64
}

/// Standard deviation of valid dBm values
///
/// [`MISSING`] inputs are ignored. At least three valid
/// inputs are required; otherwise returns [`MISSING`].
pub fn dbm_sdev<I>(dbm: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (mut count, mut sum, mut sum_sq) = (0usize, 0.0f64, 0.0f64);
    for val in dbm.into_iter().filter(|v| *v != MISSING) {
        count += 1;
        sum += val;
        sum_sq += val * val;
    }

    if count < 3 {
        return MISSING;
    }

    let mean = sum / count as f64;
    let var = sum_sq / count as f64 - mean * mean;
    if var >= 0.0 {
        var.sqrt()
    } else {
        // rounding on a constant input
        0.0
    }
}

/// Mean of valid NCP values
///
/// [`MISSING`] inputs are ignored. Returns [`MISSING`] if
/// there are no valid inputs.
pub fn ncp_mean<I>(ncp: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (count, sum) = ncp
        .into_iter()
        .filter(|v| *v != MISSING)
        .fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v));

    if count == 0 {
        MISSING
    } else {
        sum / count as f64
    }
}
