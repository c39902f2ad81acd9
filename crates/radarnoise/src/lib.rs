//! # radarnoise: Weather Radar Noise Location
//!
//! This crate finds the range gates along a weather radar ray
//! which contain only receiver noise, and uses them to estimate
//! the noise floor of each receiver channel. It also identifies
//! gates which contain a coherent signal.
//!
//! ## Disclaimer
//!
//! The default interest maps and thresholds are tuned for typical
//! S- and C-band weather radars. Other radars may need their own
//! tuning. Always check the noise flags against your data before
//! trusting the noise bias for calibration work.
//!
//! ## Example
//!
//! Fill in one [`GateMoments`] per range gate from your moments
//! processor. Set any value you don't have to [`MISSING`].
//!
//! ```
//! use radarnoise::{
//!     Calibration, GateMoments, NoiseLocatorBuilder, PolarizationMode, RayProps,
//! };
//!
//! # let read_ray_from_your_radar = || vec![GateMoments::default(); 500];
//! // create a NoiseLocator, one per worker thread
//! let mut locator = NoiseLocatorBuilder::new()
//!     .with_kernel_size(9)                     // feature window, gates
//!     .with_interest_threshold_for_noise(0.51) // noise interest cutoff
//!     .build();
//!
//! // ray median needs 30 noise gates; ask for fewer
//! locator.set_compute_ray_median(20);
//!
//! let mut gates: Vec<GateMoments> = read_ray_from_your_radar();
//! locator.set_ray_props(RayProps {
//!     n_gates: gates.len(),
//!     calib: Calibration::new(-112.0, -112.2, -113.0, -113.1),
//!     elevation: 0.5,
//!     azimuth: 271.3,
//!     ..Default::default()
//! });
//!
//! let est = locator.compute_noise(PolarizationMode::DpSimHv, &mut gates);
//! println!(
//!     "{} noise gates, H bias {:.2} dB",
//!     est.n_noise_gates, est.bias_db.hc
//! );
//!
//! for gate in &gates {
//!     if gate.noise_flag {
//!         // censor, or subtract noise_bias_db_hc from the noise floor
//!     }
//! }
//! ```
//!
//! The locator is created via a
//! [builder](struct.NoiseLocatorBuilder.html).
//!
//! ## Background
//!
//! Noise gates share three properties, each measured over a
//! short window (the *kernel*) of neighboring gates:
//!
//! * the pulse-pair phase does not advance steadily from gate
//!   to gate, so the unwrapped phase strays far from a line;
//! * the received power is steady; and
//! * the normalized coherent power (NCP) is low.
//!
//! Each feature is mapped through a piecewise-linear
//! [interest map](struct.InterestMap.html) to a value between
//! zero and one. The weighted mean of these is the gate's
//! *noise interest*. Gates whose interest exceeds a threshold
//! are flagged as noise. A separate *signal interest* flags
//! gates with steady phase.
//!
//! The noise power in each channel is then the median lag-0
//! power of the noise gates. If a ray has too few of those, a
//! recent estimate from a nearby direction is used instead. A
//! running median across rays is also available. The result is
//! reported as a bias against the receiver calibration. See
//! [`ComputeMethod`].
//!
//! Locators that run in parallel share their cache and running
//! median through a [`SharedNoiseState`].
//!
//! ## Crate features
//!
//! * `chrono`: Convert [ray times](struct.RayTime.html) to
//!   true UTC timestamps. If enabled, `chrono` becomes part of
//!   this crate's public API.
//!

mod builder;
mod cache;
mod classify;
mod features;
mod interest;
mod locator;
mod median;
mod mode;
mod moments;
mod phase;
mod shared;

pub use builder::NoiseLocatorBuilder;
pub use cache::{
    GridIndex, SpatialNoiseCache, GRID_RES_AZ, GRID_RES_EL, GRID_SIZE_AZ, GRID_SIZE_EL,
    SEARCH_KERNEL,
};
pub use classify::{
    fill_single_gate_gaps, remove_single_gate_spikes, smooth_noise_flags, smooth_signal_flags,
    Classification, Classifier, GapFilter, SpeckleFilter,
};
pub use features::{dbm_sdev, kernel_bounds, ncp_mean, phase_change_error, RayFeatures};
pub use interest::{ImPoint, InterestMap, InterestMapErr};
pub use locator::{EstimateSource, NoiseEstimate, NoiseLocator, RayProps, RayTime};
pub use median::{compute_median, RunningMedian};
pub use mode::{ComputeMethod, PolarizationMode};
pub use moments::{Calibration, Channel, ChannelValues, GateMoments, MISSING};
pub use phase::{accumulate_phase, phase_diff_deg};
pub use shared::SharedNoiseState;
