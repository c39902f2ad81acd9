//! Noise locator: classify gates, estimate channel noise

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrayvec::ArrayVec;
#[cfg(feature = "chrono")]
use chrono::{DateTime, TimeZone, Utc};

#[cfg(not(test))]
use log::{debug, warn};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as warn;

use crate::builder::NoiseLocatorBuilder;
use crate::cache::GridIndex;
use crate::classify::{Classification, Classifier};
use crate::features::RayFeatures;
use crate::median::compute_median;
use crate::mode::{ComputeMethod, PolarizationMode};
use crate::moments::{Calibration, Channel, ChannelValues, GateMoments, MISSING, MISSING_CUTOFF};
use crate::shared::SharedNoiseState;

static LOCATOR_ID: AtomicUsize = AtomicUsize::new(0);

/// Time of a ray
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayTime {
    /// Whole seconds since the Unix epoch
    pub secs: i64,

    /// Fractional part, in nanoseconds
    pub nanos: f64,
}

impl RayTime {
    /// Ray time from Unix seconds and nanoseconds
    pub fn new(secs: i64, nanos: f64) -> Self {
        Self { secs, nanos }
    }

    /// Ray time as a UTC timestamp
    ///
    /// Returns `None` if the time is out of range.
    #[cfg(feature = "chrono")]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let nanos = self.nanos.clamp(0.0, 999_999_999.0) as u32;
        Utc.timestamp_opt(self.secs, nanos).single()
    }
}

impl fmt::Display for RayTime {
    #[cfg(feature = "chrono")]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}s", self.secs),
        }
    }

    #[cfg(not(feature = "chrono"))]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09.0}s", self.secs, self.nanos)
    }
}

/// Properties of the ray about to be processed
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RayProps {
    /// Number of gates
    pub n_gates: usize,

    /// Receiver calibration
    pub calib: Calibration,

    /// Ray time
    pub time: RayTime,

    /// Elevation angle (deg)
    pub elevation: f64,

    /// Azimuth angle (deg)
    pub azimuth: f64,
}

/// Where a noise estimate came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EstimateSource {
    /// Median of this ray's noise gates
    RayMedian,

    /// Running median across rays
    RunningMedian,

    /// Median from a recent ray pointing nearby
    Cached,

    /// Not enough information; the calibration is used
    Calibration,
}

/// Result of a noise estimate for one ray
///
/// Only the mode's active channels carry estimates. The other
/// channels report the calibrated noise with zero bias.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseEstimate {
    /// Polarization mode of the ray
    pub mode: PolarizationMode,

    /// Source of the estimate
    pub source: EstimateSource,

    /// Number of gates flagged as noise in this ray
    pub n_noise_gates: usize,

    /// Estimated noise per channel (dBm)
    pub noise_dbm: ChannelValues,

    /// Estimated noise minus calibrated noise, per channel (dB)
    pub bias_db: ChannelValues,
}

/// Locates noise gates and estimates the receiver noise floor
///
/// The `NoiseLocator` accepts one ray of [`GateMoments`] at a
/// time. For each ray it
///
/// 1. computes features over a sliding kernel of gates: the
///    error of the phase progression against a straight line,
///    the standard deviation of the power, and the mean NCP;
/// 2. fuses these through interest maps to flag each gate as
///    noise and/or signal;
/// 3. estimates the noise power in each active receiver channel
///    from the gates flagged as noise; and
/// 4. writes the flags, features, and noise bias back into the
///    gates.
///
/// ```
/// use std::sync::Arc;
/// use radarnoise::{
///     Calibration, EstimateSource, GateMoments, NoiseLocatorBuilder,
///     PolarizationMode, RayProps, SharedNoiseState,
/// };
///
/// let mut locator = NoiseLocatorBuilder::new()
///     .with_shared_state(Arc::new(SharedNoiseState::new()))
///     .build();
///
/// let mut gates = vec![GateMoments::default(); 100];
/// locator.set_ray_props(RayProps {
///     n_gates: gates.len(),
///     calib: Calibration::new(-110.0, -110.0, -111.0, -111.0),
///     elevation: 0.5,
///     azimuth: 121.0,
///     ..Default::default()
/// });
///
/// // all-missing gates carry no information
/// let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
/// assert_eq!(est.source, EstimateSource::Calibration);
/// assert_eq!(gates[0].noise_bias_db_hc, 0.0);
/// ```
///
/// Many locators may run in parallel, one per thread. They
/// share a [`SharedNoiseState`] which holds the spatial noise
/// cache, running median buffers, and the compute method.
#[derive(Debug)]
pub struct NoiseLocator {
    id: usize,
    n_gates_kernel: usize,
    classifier: Classifier,
    equal_bias_in_all_channels: bool,
    debug: bool,
    shared: Arc<SharedNoiseState>,
    ray: RayProps,
    grid_index: GridIndex,
    features: RayFeatures,
    classification: Classification,
    last_estimate: Option<NoiseEstimate>,
}

impl NoiseLocator {
    /// Set the properties of the next ray
    ///
    /// Must be called before [`locate()`](#method.locate) or
    /// [`compute_noise()`](#method.compute_noise).
    pub fn set_ray_props(&mut self, props: RayProps) {
        self.ray = props;
        self.grid_index = GridIndex::from_angles(props.elevation, props.azimuth);
    }

    /// Locate noise and signal gates
    ///
    /// Computes features and flags for the current ray. Results
    /// are available from the accessor methods and may be copied
    /// into the gates with [`add_to_moments()`](#method.add_to_moments).
    ///
    /// If the ray is shorter than the kernel, every feature is
    /// [`MISSING`] and no gate is flagged.
    pub fn locate(&mut self, gates: &[GateMoments]) {
        let n_gates = self.usable_gates(gates.len());
        self.locate_gates(&gates[..n_gates]);
    }

    fn locate_gates(&mut self, gates: &[GateMoments]) {
        let valid = self.features.compute(gates, self.n_gates_kernel);
        self.classifier
            .classify(&self.features, valid, &mut self.classification);
    }

    /// Locate noise and estimate the noise in each channel
    ///
    /// Runs [`locate()`](#method.locate), then estimates the noise
    /// for every active channel of `mode` with the current
    /// [compute method](crate::ComputeMethod). The noise bias is
    /// written to every gate, along with the flags and features.
    ///
    /// This method never fails. When there is too little noise to
    /// go on, the estimate falls back to a nearby cached estimate
    /// and then to the calibration, which gives zero bias.
    pub fn compute_noise(
        &mut self,
        mode: PolarizationMode,
        gates: &mut [GateMoments],
    ) -> NoiseEstimate {
        let n_gates = self.usable_gates(gates.len());
        let gates = &mut gates[..n_gates];

        self.locate_gates(gates);
        let est = self.estimate(mode, gates);

        for gate in gates.iter_mut() {
            for &chan in mode.channels() {
                gate.set_noise_bias_db(chan, est.bias_db[chan]);
            }
        }
        self.add_to_moments(gates);

        if self.debug {
            debug!(
                "noise[{}]: {} el {:.2} az {:.2}: {}: {} noise gates, {:?}, bias {}",
                self.id,
                self.ray.time,
                self.ray.elevation,
                self.ray.azimuth,
                mode,
                est.n_noise_gates,
                est.source,
                format_channels(mode.channels(), &est.bias_db)
            );
        }

        self.last_estimate = Some(est);
        est
    }

    /// Copy flags and features into the gates
    pub fn add_to_moments(&self, gates: &mut [GateMoments]) {
        let f = &self.features;
        let c = &self.classification;
        for (igate, gate) in gates.iter_mut().take(f.len()).enumerate() {
            gate.noise_flag = c.noise_flag()[igate];
            gate.signal_flag = c.signal_flag()[igate];
            gate.accum_phase_change = f.accum_phase_change()[igate];
            gate.phase_change_error = f.phase_change_error()[igate];
            gate.dbm_sdev = f.dbm_sdev()[igate];
            gate.ncp_mean = f.ncp_mean()[igate];
        }
    }

    /// Estimate each ray on its own
    ///
    /// Changes the compute method for every locator which
    /// shares this one's state.
    pub fn set_compute_ray_median(&self, min_gates: usize) {
        self.shared.set_compute_ray_median(min_gates);
    }

    /// Estimate with a running median over `window` noise gates
    ///
    /// Changes the compute method for every locator which
    /// shares this one's state.
    pub fn set_compute_running_median(&self, window: usize) {
        self.shared.set_compute_running_median(window);
    }

    /// Current compute method
    pub fn compute_method(&self) -> ComputeMethod {
        self.shared.compute_method()
    }

    /// Process-unique locator id
    pub fn id(&self) -> usize {
        self.id
    }

    /// Feature kernel size, as configured
    pub fn kernel_size(&self) -> usize {
        self.n_gates_kernel
    }

    /// Same bias in all channels
    pub fn equal_bias_in_all_channels(&self) -> bool {
        self.equal_bias_in_all_channels
    }

    /// Current ray properties
    pub fn ray_props(&self) -> &RayProps {
        &self.ray
    }

    /// Spatial cache bin of the current ray
    pub fn grid_index(&self) -> GridIndex {
        self.grid_index
    }

    /// Shared state
    pub fn shared_state(&self) -> &Arc<SharedNoiseState> {
        &self.shared
    }

    /// Result of the last [`compute_noise()`](#method.compute_noise)
    pub fn last_estimate(&self) -> Option<&NoiseEstimate> {
        self.last_estimate.as_ref()
    }

    /// Noise flag per gate
    pub fn noise_flag(&self) -> &[bool] {
        self.classification.noise_flag()
    }

    /// Signal flag per gate
    pub fn signal_flag(&self) -> &[bool] {
        self.classification.signal_flag()
    }

    /// Fused noise interest per gate
    pub fn noise_interest(&self) -> &[f64] {
        self.classification.noise_interest()
    }

    /// Fused signal interest per gate
    pub fn signal_interest(&self) -> &[f64] {
        self.classification.signal_interest()
    }

    /// Unwrapped phase per gate (deg)
    pub fn accum_phase_change(&self) -> &[f64] {
        self.features.accum_phase_change()
    }

    /// Phase-change error per gate (deg)
    pub fn phase_change_error(&self) -> &[f64] {
        self.features.phase_change_error()
    }

    /// Power standard deviation per gate (dB)
    pub fn dbm_sdev(&self) -> &[f64] {
        self.features.dbm_sdev()
    }

    /// NCP mean per gate
    pub fn ncp_mean(&self) -> &[f64] {
        self.features.ncp_mean()
    }

    /// Kernel start gate, per gate
    pub fn start_gate(&self) -> &[usize] {
        self.features.start_gate()
    }

    /// Kernel end gate (inclusive), per gate
    pub fn end_gate(&self) -> &[usize] {
        self.features.end_gate()
    }

    /// Summary of the detection parameters
    pub fn params_summary(&self) -> String {
        let maps: String = self
            .classifier
            .interest_maps()
            .iter()
            .map(|map| format!("  {}\n", map))
            .collect();

        format!(
            "noise detection [{}]:\n  \
             kernel size: {} gates\n  \
             interest threshold for noise: {}\n  \
             interest threshold for signal: {}\n\
             {}  \
             equal bias in all channels: {}\n  \
             method: {}",
            self.id,
            self.n_gates_kernel,
            self.classifier.threshold_for_noise(),
            self.classifier.threshold_for_signal(),
            maps,
            self.equal_bias_in_all_channels,
            self.compute_method()
        )
    }

    // Estimate noise for the active channels of `mode`
    //
    // Requires that locate() has run on `gates`.
    fn estimate(&self, mode: PolarizationMode, gates: &[GateMoments]) -> NoiseEstimate {
        let channels = mode.channels();
        let calib = &self.ray.calib;
        let flags = self.classification.noise_flag();
        let n_noise_gates = self.classification.noise_count();

        let mut noise = *calib.noise_dbm_all();
        let source = match self.shared.compute_method() {
            ComputeMethod::RayMedian { min_gates } => {
                let n_valid = noise_powers(gates, flags, mode.primary()).len();
                if n_valid > 0 && n_valid >= min_gates {
                    let mut stored = ArrayVec::<Channel, 4>::new();
                    for &chan in channels {
                        let median = compute_median(&noise_powers(gates, flags, chan));
                        if median != MISSING {
                            noise[chan] = median;
                            stored.push(chan);
                        }
                    }
                    self.shared
                        .cache()
                        .store(self.grid_index, &stored, &noise);
                    EstimateSource::RayMedian
                } else if let Some(prev) = self
                    .shared
                    .cache()
                    .find_closest(self.grid_index, mode.primary())
                {
                    for &chan in channels {
                        if prev[chan] != 0.0 {
                            noise[chan] = prev[chan];
                        }
                    }
                    EstimateSource::Cached
                } else {
                    EstimateSource::Calibration
                }
            }
            ComputeMethod::RunningMedian { .. } => {
                let mut running = self.shared.running();
                let updated = running.extend(channels, gates, flags);
                if self.debug && !updated.is_empty() {
                    debug!(
                        "noise[{}]: running median updated: {}",
                        self.id,
                        format_channels(&updated, &running.estimates())
                    );
                }

                let mut used = false;
                for &chan in channels {
                    if let Some(est) = running.estimate(chan) {
                        if est > MISSING_CUTOFF {
                            noise[chan] = est;
                            used = true;
                        }
                    }
                }
                if used {
                    EstimateSource::RunningMedian
                } else {
                    EstimateSource::Calibration
                }
            }
        };

        let mut bias = ChannelValues::default();
        for &chan in channels {
            bias[chan] = noise[chan] - calib.noise_dbm(chan);
        }

        if self.equal_bias_in_all_channels {
            let primary = mode.primary();
            for &chan in &channels[1..] {
                bias[chan] = bias[primary];
                noise[chan] = calib.noise_dbm(chan) + bias[chan];
            }
        }

        NoiseEstimate {
            mode,
            source,
            n_noise_gates,
            noise_dbm: noise,
            bias_db: bias,
        }
    }

    // Number of gates to process, given a slice of `available` gates
    fn usable_gates(&self, available: usize) -> usize {
        if available < self.ray.n_gates {
            warn!(
                "noise[{}]: expected {} gates but only {} given",
                self.id, self.ray.n_gates, available
            );
        }
        usize::min(available, self.ray.n_gates)
    }
}

impl From<&NoiseLocatorBuilder> for NoiseLocator {
    /// Create the noise locator from its Builder
    fn from(cfg: &NoiseLocatorBuilder) -> Self {
        let out = Self {
            id: LOCATOR_ID.fetch_add(1, Ordering::Relaxed) + 1,
            n_gates_kernel: cfg.kernel_size(),
            classifier: cfg.classifier().clone(),
            equal_bias_in_all_channels: cfg.equal_bias_in_all_channels(),
            debug: cfg.debug(),
            shared: cfg.shared_state().clone(),
            ray: RayProps::default(),
            grid_index: GridIndex::default(),
            features: RayFeatures::default(),
            classification: Classification::default(),
            last_estimate: None,
        };

        if out.debug {
            debug!("{}", out.params_summary());
        }
        out
    }
}

// Valid lag-0 powers of `chan` at the noise gates
fn noise_powers(gates: &[GateMoments], noise_flag: &[bool], chan: Channel) -> Vec<f64> {
    gates
        .iter()
        .zip(noise_flag)
        .filter(|(_, flag)| **flag)
        .map(|(gate, _)| gate.lag0_db(chan))
        .filter(|v| *v != MISSING)
        .collect()
}

fn format_channels(channels: &[Channel], vals: &ChannelValues) -> String {
    channels
        .iter()
        .map(|&chan| format!("{} {:.2}", chan, vals[chan]))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;
    use num_complex::Complex;
    use strum::IntoEnumIterator;

    const CAL_HC: f64 = -110.0;
    const CAL_VC: f64 = -109.5;
    const CAL_HX: f64 = -111.0;
    const CAL_VX: f64 = -111.5;

    // noise power in the synthetic rays, 2 dB over calibration
    const NOISE_DBM: f64 = -108.0;

    // phase increments (deg) which look like noise: large and erratic
    const NOISE_STEPS: [f64; 10] = [
        150.0, -120.0, 95.0, -170.0, 60.0, 175.0, -80.0, 130.0, -155.0, 110.0,
    ];

    // small power wobble (dB) around the noise floor
    const NOISE_WOBBLE: [f64; 10] = [0.3, -0.2, 0.1, -0.4, 0.2, 0.0, -0.1, 0.4, -0.3, 0.1];

    fn calib() -> Calibration {
        Calibration::new(CAL_HC, CAL_VC, CAL_HX, CAL_VX)
    }

    fn props(n_gates: usize, el: f64, az: f64) -> RayProps {
        RayProps {
            n_gates,
            calib: calib(),
            time: RayTime::new(1_700_000_000, 250_000_000.0),
            elevation: el,
            azimuth: az,
        }
    }

    fn set_power(gate: &mut GateMoments, dbm: f64) {
        gate.dbm_for_noise = dbm;
        gate.lag0_hc_db = dbm;
        gate.lag0_vc_db = dbm - 0.5;
        gate.lag0_hx_db = dbm - 1.0;
        gate.lag0_vx_db = dbm - 1.5;
    }

    // A ray with noise outside `signal` and a coherent target inside
    fn make_ray(n_gates: usize, signal: std::ops::Range<usize>) -> Vec<GateMoments> {
        let mut phase = 0.0f64;
        (0..n_gates)
            .map(|igate| {
                let mut gate = GateMoments::default();
                if signal.contains(&igate) {
                    phase += 20.0;
                    gate.ncp = 0.9;
                    set_power(&mut gate, NOISE_DBM + 20.0);
                } else {
                    phase += NOISE_STEPS[igate % NOISE_STEPS.len()];
                    gate.ncp = 0.05;
                    set_power(&mut gate, NOISE_DBM + NOISE_WOBBLE[igate % NOISE_WOBBLE.len()]);
                }
                gate.phase_for_noise = Complex::from_polar(1.0, phase.to_radians());
                gate
            })
            .collect()
    }

    fn make_locator(equal_bias: bool) -> (NoiseLocator, Arc<SharedNoiseState>) {
        let state = Arc::new(SharedNoiseState::new());
        let locator = NoiseLocatorBuilder::new()
            .with_shared_state(state.clone())
            .with_equal_bias_in_all_channels(equal_bias)
            .with_debug(true)
            .build();
        (locator, state)
    }

    #[test]
    fn test_locate_noise_and_signal() {
        let (mut locator, _state) = make_locator(false);
        let gates = make_ray(60, 20..40);
        locator.set_ray_props(props(60, 0.5, 10.0));
        locator.locate(&gates);

        // kernels which straddle the target edge see its power jump
        for igate in 0..60 {
            let is_noise = igate <= 16 || igate >= 43;
            assert_eq!(
                locator.noise_flag()[igate],
                is_noise,
                "gate {}: pce {:.1} sdev {:.2} ncp {:.2}",
                igate,
                locator.phase_change_error()[igate],
                locator.dbm_sdev()[igate],
                locator.ncp_mean()[igate]
            );
        }

        // kernel fully inside the target is coherent and steady
        for igate in 24..36 {
            assert!(locator.phase_change_error()[igate] < 1.0e-6);
            assert!(locator.signal_flag()[igate]);
        }
        for igate in 0..16 {
            assert!(!locator.signal_flag()[igate]);
            assert!(locator.noise_interest()[igate] > 0.99);
        }
        for igate in 0..60 {
            assert!(locator.start_gate()[igate] <= igate);
            assert!(locator.end_gate()[igate] >= igate);
        }
    }

    #[test]
    fn test_forty_gate_ray() {
        let (mut locator, _state) = make_locator(false);
        let mut gates = make_ray(40, 10..30);
        locator.set_ray_props(props(40, 0.5, 10.0));
        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);

        let noise: String = gates
            .iter()
            .map(|g| if g.noise_flag { 'N' } else { '.' })
            .collect();
        assert_eq!(noise, "NNNNNNN..........................NNNNNNN");
        assert!(gates[10..30].iter().all(|g| !g.noise_flag));
        assert!(gates[14..26].iter().all(|g| g.signal_flag));

        // too few noise gates for the default ray median
        assert_eq!(est.n_noise_gates, 14);
        assert_eq!(est.source, EstimateSource::Calibration);
        assert_eq!(gates[39].noise_bias_db_hc, 0.0);
    }

    #[test]
    fn test_ray_median_end_to_end() {
        let (mut locator, state) = make_locator(false);
        let mut gates = make_ray(60, 20..40);
        locator.set_ray_props(props(60, 0.5, 10.0));
        locator.set_compute_ray_median(20);

        let est = locator.compute_noise(PolarizationMode::DpAltHvCoCross, &mut gates);
        assert_eq!(est.source, EstimateSource::RayMedian);
        assert_eq!(est.n_noise_gates, 34);
        assert!((est.noise_dbm.hc - NOISE_DBM).abs() < 1.0);
        assert!((est.noise_dbm.vx - (NOISE_DBM - 1.5)).abs() < 1.0);

        // bias is estimate minus calibration, exactly
        for chan in Channel::iter() {
            assert_eq!(est.bias_db[chan], est.noise_dbm[chan] - calib().noise_dbm(chan));
        }

        // written to every gate, with flags
        for (igate, gate) in gates.iter().enumerate() {
            assert_eq!(gate.noise_bias_db_hc, est.bias_db.hc);
            assert_eq!(gate.noise_bias_db_vx, est.bias_db.vx);
            assert_eq!(gate.noise_flag, locator.noise_flag()[igate]);
            assert_eq!(gate.phase_change_error, locator.phase_change_error()[igate]);
        }

        // and remembered for this direction
        let cached = state
            .cache()
            .get(locator.grid_index())
            .expect("expected cached noise");
        assert_eq!(cached, est.noise_dbm);
        assert_eq!(locator.last_estimate(), Some(&est));
    }

    #[test]
    fn test_ray_median_falls_back_to_cache() {
        let (mut locator, _state) = make_locator(false);
        locator.set_compute_ray_median(20);

        // a noisy ray fills the cache
        let mut noisy = make_ray(60, 20..40);
        locator.set_ray_props(props(60, 0.5, 10.0));
        let first = locator.compute_noise(PolarizationMode::DpAltHvCoOnly, &mut noisy);
        assert_eq!(first.source, EstimateSource::RayMedian);

        // an all-target ray half a degree over borrows it
        let mut target = make_ray(60, 0..60);
        locator.set_ray_props(props(60, 0.5, 10.5));
        let second = locator.compute_noise(PolarizationMode::DpAltHvCoOnly, &mut target);
        assert_eq!(second.n_noise_gates, 0);
        assert_eq!(second.source, EstimateSource::Cached);
        assert_eq!(second.noise_dbm.hc, first.noise_dbm.hc);
        assert_eq!(second.noise_dbm.vc, first.noise_dbm.vc);

        // far away, nothing is cached
        locator.set_ray_props(props(60, 10.0, 200.0));
        let third = locator.compute_noise(PolarizationMode::DpAltHvCoOnly, &mut target);
        assert_eq!(third.source, EstimateSource::Calibration);
        assert_eq!(third.bias_db, ChannelValues::default());
        assert_eq!(target[0].noise_bias_db_vc, 0.0);
    }

    #[test]
    fn test_ray_median_needs_primary_power() {
        let (mut locator, state) = make_locator(false);
        locator.set_ray_props(props(60, 0.5, 10.0));

        // plenty of noise gates, but no H power to take a median of
        let mut gates = make_ray(60, 0..0);
        for gate in gates.iter_mut() {
            gate.lag0_hc_db = MISSING;
        }

        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(est.n_noise_gates, 60);
        assert_eq!(est.source, EstimateSource::Calibration);
        assert_eq!(est.noise_dbm.hc, CAL_HC);
        assert_eq!(state.cache().get(locator.grid_index()), None);

        // and the spatial cache is consulted instead
        state.cache().store(
            locator.grid_index().offset(0, 1),
            &[Channel::Hc],
            &ChannelValues::splat(-106.0),
        );
        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(est.source, EstimateSource::Cached);
        assert_eq!(est.noise_dbm.hc, -106.0);
        assert_eq!(gates[0].noise_bias_db_hc, -106.0 - CAL_HC);
    }

    #[test]
    fn test_running_median_mixed_modes() {
        let (mut locator, state) = make_locator(false);
        locator.set_compute_running_median(50);
        locator.set_ray_props(props(60, 0.5, 10.0));

        let mut gates = make_ray(60, 20..40);
        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(est.source, EstimateSource::Calibration);

        // the window fills partway into the V ray
        let mut gates = make_ray(60, 20..40);
        let est = locator.compute_noise(PolarizationMode::SinglePolV, &mut gates);
        assert_eq!(est.source, EstimateSource::RunningMedian);
        assert!((est.noise_dbm.vc - (NOISE_DBM - 0.5)).abs() < 1.0);

        let running = state.running_median_noise();
        assert!((running.hc - NOISE_DBM).abs() < 1.0);
        assert!((running.vc - (NOISE_DBM - 0.5)).abs() < 1.0);
        assert_eq!(running.hx, MISSING);
    }

    #[test]
    fn test_cache_ignores_unset_channels() {
        let (mut locator, state) = make_locator(false);
        locator.set_ray_props(props(60, 1.0, 1.0));

        // only Hc was ever cached here
        state.cache().store(
            locator.grid_index(),
            &[Channel::Hc],
            &ChannelValues::splat(-105.0),
        );

        let mut target = make_ray(60, 0..60);
        let est = locator.compute_noise(PolarizationMode::DpAltHvCoOnly, &mut target);
        assert_eq!(est.source, EstimateSource::Cached);
        assert_eq!(est.noise_dbm.hc, -105.0);
        assert_eq!(est.noise_dbm.vc, CAL_VC);

        // V-primary modes can't use it
        let est = locator.compute_noise(PolarizationMode::DpVOnly, &mut target);
        assert_eq!(est.source, EstimateSource::Calibration);
    }

    #[test]
    fn test_equal_bias() {
        for mode in PolarizationMode::iter() {
            let (mut locator, _state) = make_locator(true);
            locator.set_compute_ray_median(20);
            let mut gates = make_ray(60, 20..40);
            locator.set_ray_props(props(60, 0.5, 10.0));

            let est = locator.compute_noise(mode, &mut gates);
            assert_eq!(est.source, EstimateSource::RayMedian);

            let primary = mode.primary();
            for &chan in mode.channels() {
                assert_eq!(est.bias_db[chan], est.bias_db[primary], "{:?}", mode);
                assert_approx_eq!(
                    est.noise_dbm[chan],
                    calib().noise_dbm(chan) + est.bias_db[primary]
                );
                assert_eq!(gates[7].noise_bias_db(chan), est.bias_db[primary]);
            }
        }
    }

    #[test]
    fn test_running_median_across_rays() {
        let (mut locator, state) = make_locator(false);
        locator.set_compute_running_median(50);
        locator.set_ray_props(props(60, 0.5, 10.0));

        // 34 noise gates per ray: no estimate after the first
        let mut gates = make_ray(60, 20..40);
        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(est.source, EstimateSource::Calibration);
        assert_eq!(state.running_median_count(), 34);
        assert_eq!(gates[0].noise_bias_db_hc, 0.0);

        // 68 gates in: one estimate, 18 buffered toward the next
        let mut gates = make_ray(60, 20..40);
        let est = locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(est.source, EstimateSource::RunningMedian);
        assert_eq!(state.running_median_count(), 18);
        assert!((est.noise_dbm.hc - NOISE_DBM).abs() < 1.0);
        assert_eq!(state.running_median_noise().hc, est.noise_dbm.hc);

        // the spatial cache is untouched in this mode
        assert_eq!(state.cache().get(locator.grid_index()), None);
    }

    #[test]
    fn test_short_ray() {
        let (mut locator, _state) = make_locator(false);
        let mut gates = make_ray(6, 0..0);
        locator.set_ray_props(props(6, 0.5, 10.0));
        let est = locator.compute_noise(PolarizationMode::SinglePolV, &mut gates);

        assert_eq!(est.source, EstimateSource::Calibration);
        assert!(gates.iter().all(|g| !g.noise_flag && !g.signal_flag));
        assert!(gates.iter().all(|g| g.phase_change_error == MISSING));
        assert!(gates.iter().all(|g| g.accum_phase_change != MISSING));
    }

    #[test]
    fn test_fewer_gates_than_expected() {
        let (mut locator, _state) = make_locator(false);
        let mut gates = make_ray(60, 20..40);
        locator.set_ray_props(props(70, 0.5, 10.0));
        locator.compute_noise(PolarizationMode::SinglePolH, &mut gates);
        assert_eq!(locator.noise_flag().len(), 60);
    }

    #[test]
    fn test_params_summary() {
        let (locator, _state) = make_locator(false);
        let summary = locator.params_summary();
        assert!(summary.contains("kernel size: 9 gates"));
        assert!(summary.contains("DbmSdevForSignal (weight 1): (0.75, 1) (0.85, 0.001)"));
        assert!(summary.starts_with(&format!("noise detection [{}]:\n", locator.id())));
        assert!(summary.contains("  NcpMeanForNoise (weight 1): (0.1, 1) (0.2, 0.001)\n"));
        assert!(summary.ends_with(
            "  equal bias in all channels: false\n  method: ray median (min 30 noise gates)"
        ));
        assert_eq!(summary.lines().count(), 11);
    }

    #[test]
    fn test_parallel_locators() {
        let state = Arc::new(SharedNoiseState::new());
        state.set_compute_ray_median(20);

        std::thread::scope(|scope| {
            for ithread in 0..4 {
                let state = state.clone();
                scope.spawn(move || {
                    let mut locator = NoiseLocatorBuilder::new()
                        .with_shared_state(state)
                        .build();
                    for iray in 0..20 {
                        let az = (ithread * 20 + iray) as f64;
                        let mut gates = make_ray(60, 20..40);
                        locator.set_ray_props(props(60, 0.5, az));
                        let est = locator.compute_noise(PolarizationMode::DpSimHv, &mut gates);
                        assert_eq!(est.source, EstimateSource::RayMedian);
                    }
                });
            }
        });

        for az in 0..80 {
            let idx = GridIndex::from_angles(0.5, az as f64);
            assert!(state.cache().get(idx).is_some(), "az {}", az);
        }
    }

    #[test]
    fn test_ray_time() {
        let t = RayTime::new(0, 500_000_000.0);
        #[cfg(feature = "chrono")]
        assert_eq!("1970-01-01T00:00:00.500Z", format!("{}", t));
        #[cfg(not(feature = "chrono"))]
        assert_eq!("0.500000000s", format!("{}", t));
    }
}
