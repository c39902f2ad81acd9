//! Noise and signal classification
//!
//! The [`Classifier`] fuses the per-gate [features](crate::features)
//! through [interest maps](crate::InterestMap) into a noise interest
//! and a signal interest for each gate. These are thresholded to
//! produce boolean noise and signal flags, which are then cleaned up
//! with a single-gate smoothing pass.
//!
//! The noise flag receives both a gap fill (an unset gate between two
//! set gates becomes set) and a spike removal (a set gate between two
//! unset gates becomes unset). The signal flag receives only the
//! spike removal.

#[cfg(not(test))]
use log::trace;

#[cfg(test)]
use std::println as trace;

use crate::features::RayFeatures;
use crate::interest::{defaults, InterestMap};
use crate::moments::MISSING;

/// Noise flag speckle filter
///
/// Short runs of noise-flagged gates are suspect. For each
/// `(run_length, min_interest)` pair, processed longest run
/// first, runs of at most `run_length` flagged gates have any
/// gate with noise interest below `min_interest` unflagged.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeckleFilter {
    runs: Vec<(usize, f64)>,
}

impl SpeckleFilter {
    /// Speckle filter over the given `(run_length, min_interest)` pairs
    pub fn new(runs: &[(usize, f64)]) -> Self {
        let mut runs = runs.to_vec();
        // longest first; the first entry given for a length wins
        runs.sort_by(|a, b| b.0.cmp(&a.0));
        runs.dedup_by_key(|r| r.0);
        runs.retain(|r| r.0 > 0);
        Self { runs }
    }

    /// Run lengths and thresholds, longest run first
    pub fn runs(&self) -> &[(usize, f64)] {
        &self.runs
    }

    fn apply(&self, flags: &mut [bool], interest: &[f64]) {
        for &(run_len, min_interest) in &self.runs {
            run_speckle_filter(flags, interest, run_len, min_interest);
        }
    }
}

/// Noise flag gap filter
///
/// An unflagged gate becomes flagged if the flagged gates
/// within `span` gates on *both* sides carry enough noise
/// interest. Each side sums `interest / distance` over its
/// flagged gates and must exceed `threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GapFilter {
    span: usize,
    threshold: f64,
}

impl GapFilter {
    // the fill can cascade; cap the passes
    const MAX_PASSES: usize = 4;

    /// Gap filter looking `span` gates each way
    pub fn new(span: usize, threshold: f64) -> Self {
        Self { span, threshold }
    }

    /// Number of gates examined on each side
    pub fn span(&self) -> usize {
        self.span
    }

    /// Weighted interest sum required on each side
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn apply(&self, flags: &mut [bool], interest: &[f64]) {
        let n_gates = flags.len();
        let weights: Vec<f64> = (0..self.span).map(|i| 1.0 / (i as f64 + 1.0)).collect();
        let mut forward = vec![0.0f64; n_gates];
        let mut reverse = vec![0.0f64; n_gates];

        for _pass in 0..Self::MAX_PASSES {
            for igate in 0..n_gates {
                if flags[igate] {
                    continue;
                }
                forward[igate] = weights
                    .iter()
                    .zip((0..igate).rev())
                    .filter(|(_, k)| flags[*k])
                    .map(|(w, k)| w * interest[k])
                    .sum();
                reverse[igate] = weights
                    .iter()
                    .zip(igate + 1..n_gates)
                    .filter(|(_, k)| flags[*k])
                    .map(|(w, k)| w * interest[k])
                    .sum();
            }

            let mut changed = false;
            for igate in 0..n_gates {
                if !flags[igate] && forward[igate] > self.threshold && reverse[igate] > self.threshold
                {
                    flags[igate] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
}

/// Per-gate classification output
#[derive(Clone, Debug, Default)]
pub struct Classification {
    noise_flag: Vec<bool>,
    signal_flag: Vec<bool>,
    noise_interest: Vec<f64>,
    signal_interest: Vec<f64>,
}

impl Classification {
    /// Noise flags
    pub fn noise_flag(&self) -> &[bool] {
        &self.noise_flag
    }

    /// Signal flags
    pub fn signal_flag(&self) -> &[bool] {
        &self.signal_flag
    }

    /// Fused noise interest, or [`MISSING`]
    pub fn noise_interest(&self) -> &[f64] {
        &self.noise_interest
    }

    /// Fused signal interest, or [`MISSING`]
    pub fn signal_interest(&self) -> &[f64] {
        &self.signal_interest
    }

    /// Number of gates flagged as noise
    pub fn noise_count(&self) -> usize {
        self.noise_flag.iter().filter(|f| **f).count()
    }

    fn reset(&mut self, n_gates: usize) {
        for arr in [&mut self.noise_flag, &mut self.signal_flag] {
            arr.clear();
            arr.resize(n_gates, false);
        }
        for arr in [&mut self.noise_interest, &mut self.signal_interest] {
            arr.clear();
            arr.resize(n_gates, MISSING);
        }
    }
}

/// Fuzzy-logic noise/signal classifier
#[derive(Clone, Debug, PartialEq)]
pub struct Classifier {
    pub(crate) phase_change_error_for_noise: InterestMap,
    pub(crate) dbm_sdev_for_noise: InterestMap,
    pub(crate) ncp_mean_for_noise: InterestMap,
    pub(crate) phase_change_error_for_signal: InterestMap,
    pub(crate) dbm_sdev_for_signal: InterestMap,
    pub(crate) threshold_for_noise: f64,
    pub(crate) threshold_for_signal: f64,
    pub(crate) speckle_filter: Option<SpeckleFilter>,
    pub(crate) gap_filter: Option<GapFilter>,
}

impl Classifier {
    /// Classifier with the default interest maps and thresholds
    pub fn new() -> Self {
        Self {
            phase_change_error_for_noise: defaults::phase_change_error_for_noise(),
            dbm_sdev_for_noise: defaults::dbm_sdev_for_noise(),
            ncp_mean_for_noise: defaults::ncp_mean_for_noise(),
            phase_change_error_for_signal: defaults::phase_change_error_for_signal(),
            dbm_sdev_for_signal: defaults::dbm_sdev_for_signal(),
            threshold_for_noise: 0.51,
            threshold_for_signal: 0.51,
            speckle_filter: None,
            gap_filter: None,
        }
    }

    /// Classify every gate
    ///
    /// If `valid` is false, the features could not be computed
    /// and every flag is left unset.
    pub fn classify(&self, features: &RayFeatures, valid: bool, out: &mut Classification) {
        let n_gates = features.len();
        out.reset(n_gates);
        if !valid {
            return;
        }

        for igate in 0..n_gates {
            let pce = features.phase_change_error()[igate];
            let sdev = features.dbm_sdev()[igate];
            let ncp = features.ncp_mean()[igate];

            let noise_interest = fuse(&[
                (&self.phase_change_error_for_noise, pce),
                (&self.dbm_sdev_for_noise, sdev),
                (&self.ncp_mean_for_noise, ncp),
            ]);
            let signal_interest = fuse(&[
                (&self.phase_change_error_for_signal, pce),
                (&self.dbm_sdev_for_signal, sdev),
            ]);

            out.noise_interest[igate] = noise_interest;
            out.signal_interest[igate] = signal_interest;
            out.noise_flag[igate] =
                noise_interest != MISSING && noise_interest > self.threshold_for_noise;

            // signal is the complement of "exceeds the signal threshold"
            out.signal_flag[igate] =
                signal_interest != MISSING && signal_interest <= self.threshold_for_signal;

            trace!(
                "classify: gate {}: pce {:.2} sdev {:.3} ncp {:.3} -> noise {:.3} signal {:.3}",
                igate,
                pce,
                sdev,
                ncp,
                noise_interest,
                signal_interest
            );
        }

        if let Some(speckle) = &self.speckle_filter {
            speckle.apply(&mut out.noise_flag, &out.noise_interest);
        }
        if let Some(gap) = &self.gap_filter {
            gap.apply(&mut out.noise_flag, &out.noise_interest);
        }

        smooth_noise_flags(&mut out.noise_flag);
        smooth_signal_flags(&mut out.signal_flag);
    }

    /// Noise interest threshold
    pub fn threshold_for_noise(&self) -> f64 {
        self.threshold_for_noise
    }

    /// Signal interest threshold
    pub fn threshold_for_signal(&self) -> f64 {
        self.threshold_for_signal
    }

    /// All five interest maps: three for noise, then two for signal
    pub fn interest_maps(&self) -> [&InterestMap; 5] {
        [
            &self.phase_change_error_for_noise,
            &self.dbm_sdev_for_noise,
            &self.ncp_mean_for_noise,
            &self.phase_change_error_for_signal,
            &self.dbm_sdev_for_signal,
        ]
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

// Weighted mean interest over the features which are present
//
// Returns MISSING if no feature is present or the weights
// of the present features sum to zero.
fn fuse(terms: &[(&InterestMap, f64)]) -> f64 {
    let (sum_interest, sum_weight) = terms
        .iter()
        .filter(|(_, val)| *val != MISSING)
        .fold((0.0f64, 0.0f64), |(si, sw), (map, val)| {
            (si + map.interest(*val) * map.weight(), sw + map.weight())
        });

    if sum_weight == 0.0 {
        MISSING
    } else {
        sum_interest / sum_weight
    }
}

/// Set single unset gates surrounded by set gates
///
/// Works in place, from the start of the ray. The end gates
/// are never changed.
pub fn fill_single_gate_gaps(flags: &mut [bool]) {
    for igate in 1..flags.len().saturating_sub(1) {
        if flags[igate - 1] && flags[igate + 1] {
            flags[igate] = true;
        }
    }
}

/// Unset single set gates surrounded by unset gates
///
/// Works in place, from the start of the ray. The end gates
/// are never changed.
pub fn remove_single_gate_spikes(flags: &mut [bool]) {
    for igate in 1..flags.len().saturating_sub(1) {
        if !flags[igate - 1] && !flags[igate + 1] {
            flags[igate] = false;
        }
    }
}

/// Single-gate smoothing for the noise flag: fill, then de-spike
pub fn smooth_noise_flags(flags: &mut [bool]) {
    fill_single_gate_gaps(flags);
    remove_single_gate_spikes(flags);
}

/// Single-gate smoothing for the signal flag: de-spike only
pub fn smooth_signal_flags(flags: &mut [bool]) {
    remove_single_gate_spikes(flags);
}

// Clear low-interest gates in short runs of set flags
fn run_speckle_filter(flags: &mut [bool], interest: &[f64], min_run_len: usize, min_interest: f64) {
    let n_gates = flags.len();
    let mut count = 0usize;

    // a run which reaches the end of the ray is terminated there
    for igate in 0..=n_gates {
        if igate < n_gates && flags[igate] {
            count += 1;
            continue;
        }

        if count > 0 && count <= min_run_len {
            for jgate in igate - count..igate {
                if interest[jgate] < min_interest {
                    flags[jgate] = false;
                }
            }
        }
        count = 0;
    }
}
