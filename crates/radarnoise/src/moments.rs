//! Per-gate moment records and receiver channels

use std::ops::{Index, IndexMut};

use num_complex::Complex;

/// Missing-data sentinel
///
/// Marks absent input values and features which could
/// not be computed. Compare with `==`; the value is exact.
pub const MISSING: f64 = -9999.0;

// values at or below this are treated as "never computed"
pub(crate) const MISSING_CUTOFF: f64 = -9990.0;

/// Radar receiver channel
///
/// Channels are named for the polarization they receive
/// relative to the transmitted pulse: co-polar (`c`) or
/// cross-polar (`x`).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
    strum_macros::Display,
)]
pub enum Channel {
    /// Horizontal receive, horizontal transmit
    #[strum(serialize = "Hc")]
    Hc,

    /// Vertical receive, vertical transmit
    #[strum(serialize = "Vc")]
    Vc,

    /// Horizontal receive, vertical transmit
    #[strum(serialize = "Hx")]
    Hx,

    /// Vertical receive, horizontal transmit
    #[strum(serialize = "Vx")]
    Vx,
}

/// One `f64` for each receiver channel
///
/// Indexable by [`Channel`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelValues {
    pub hc: f64,
    pub vc: f64,
    pub hx: f64,
    pub vx: f64,
}

impl ChannelValues {
    /// All four channels set to `val`
    pub const fn splat(val: f64) -> Self {
        Self {
            hc: val,
            vc: val,
            hx: val,
            vx: val,
        }
    }
}

impl Index<Channel> for ChannelValues {
    type Output = f64;

    fn index(&self, chan: Channel) -> &f64 {
        match chan {
            Channel::Hc => &self.hc,
            Channel::Vc => &self.vc,
            Channel::Hx => &self.hx,
            Channel::Vx => &self.vx,
        }
    }
}

impl IndexMut<Channel> for ChannelValues {
    fn index_mut(&mut self, chan: Channel) -> &mut f64 {
        match chan {
            Channel::Hc => &mut self.hc,
            Channel::Vc => &mut self.vc,
            Channel::Hx => &mut self.hx,
            Channel::Vx => &mut self.vx,
        }
    }
}

/// Receiver calibration
///
/// Expected noise power for each channel, in dBm, as measured
/// during calibration. Noise estimates are reported as a bias
/// against these values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Calibration {
    noise_dbm: ChannelValues,
}

impl Calibration {
    /// Calibration from per-channel noise levels (dBm)
    pub fn new(hc: f64, vc: f64, hx: f64, vx: f64) -> Self {
        Self {
            noise_dbm: ChannelValues { hc, vc, hx, vx },
        }
    }

    /// Calibrated noise for `chan` (dBm)
    pub fn noise_dbm(&self, chan: Channel) -> f64 {
        self.noise_dbm[chan]
    }

    /// Calibrated noise for all channels (dBm)
    pub fn noise_dbm_all(&self) -> &ChannelValues {
        &self.noise_dbm
    }
}

/// Moments at a single range gate
///
/// The caller fills in the input fields and passes a slice of
/// these, one per gate, to the
/// [`NoiseLocator`](crate::NoiseLocator). The locator writes the
/// output fields back in place.
///
/// Any `f64` input may be set to [`MISSING`] if it is not available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateMoments {
    // inputs
    /// Phasor used to track the phase change from gate to gate
    ///
    /// Usually lag-1 autocorrelation. Only its argument is used.
    pub phase_for_noise: Complex<f64>,

    /// Power used for the dBm standard deviation feature (dBm)
    pub dbm_for_noise: f64,

    /// Normalized coherent power, `[0, 1]`
    pub ncp: f64,

    /// Lag-0 power, H co-polar channel (dBm)
    pub lag0_hc_db: f64,

    /// Lag-0 power, V co-polar channel (dBm)
    pub lag0_vc_db: f64,

    /// Lag-0 power, H cross-polar channel (dBm)
    pub lag0_hx_db: f64,

    /// Lag-0 power, V cross-polar channel (dBm)
    pub lag0_vx_db: f64,

    // outputs
    /// Gate is noise
    pub noise_flag: bool,

    /// Gate is signal
    pub signal_flag: bool,

    /// Unwrapped phase since the first gate (deg)
    pub accum_phase_change: f64,

    /// Mean deviation of phase from a linear trend (deg)
    pub phase_change_error: f64,

    /// Standard deviation of `dbm_for_noise` over the kernel (dB)
    pub dbm_sdev: f64,

    /// Mean of `ncp` over the kernel
    pub ncp_mean: f64,

    /// Noise bias vs calibration, H co-polar (dB)
    pub noise_bias_db_hc: f64,

    /// Noise bias vs calibration, V co-polar (dB)
    pub noise_bias_db_vc: f64,

    /// Noise bias vs calibration, H cross-polar (dB)
    pub noise_bias_db_hx: f64,

    /// Noise bias vs calibration, V cross-polar (dB)
    pub noise_bias_db_vx: f64,
}

impl GateMoments {
    /// Lag-0 power for `chan` (dBm)
    pub fn lag0_db(&self, chan: Channel) -> f64 {
        match chan {
            Channel::Hc => self.lag0_hc_db,
            Channel::Vc => self.lag0_vc_db,
            Channel::Hx => self.lag0_hx_db,
            Channel::Vx => self.lag0_vx_db,
        }
    }

    /// Set lag-0 power for `chan` (dBm)
    pub fn set_lag0_db(&mut self, chan: Channel, val: f64) {
        match chan {
            Channel::Hc => self.lag0_hc_db = val,
            Channel::Vc => self.lag0_vc_db = val,
            Channel::Hx => self.lag0_hx_db = val,
            Channel::Vx => self.lag0_vx_db = val,
        }
    }

    /// Noise bias for `chan` (dB)
    pub fn noise_bias_db(&self, chan: Channel) -> f64 {
        match chan {
            Channel::Hc => self.noise_bias_db_hc,
            Channel::Vc => self.noise_bias_db_vc,
            Channel::Hx => self.noise_bias_db_hx,
            Channel::Vx => self.noise_bias_db_vx,
        }
    }

    pub(crate) fn set_noise_bias_db(&mut self, chan: Channel, val: f64) {
        match chan {
            Channel::Hc => self.noise_bias_db_hc = val,
            Channel::Vc => self.noise_bias_db_vc = val,
            Channel::Hx => self.noise_bias_db_hx = val,
            Channel::Vx => self.noise_bias_db_vx = val,
        }
    }
}

impl Default for GateMoments {
    fn default() -> Self {
        Self {
            phase_for_noise: Complex::new(0.0, 0.0),
            dbm_for_noise: MISSING,
            ncp: MISSING,
            lag0_hc_db: MISSING,
            lag0_vc_db: MISSING,
            lag0_hx_db: MISSING,
            lag0_vx_db: MISSING,
            noise_flag: false,
            signal_flag: false,
            accum_phase_change: MISSING,
            phase_change_error: MISSING,
            dbm_sdev: MISSING,
            ncp_mean: MISSING,
            noise_bias_db_hc: 0.0,
            noise_bias_db_vc: 0.0,
            noise_bias_db_hx: 0.0,
            noise_bias_db_vx: 0.0,
        }
    }
}
