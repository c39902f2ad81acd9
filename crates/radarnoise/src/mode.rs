//! Polarization modes and noise compute methods

use std::fmt;

use crate::median::RunningMedian;
use crate::moments::Channel;

/// Transmit/receive polarization mode
///
/// Each mode has a fixed set of active receiver channels,
/// and one *primary* channel. The primary is the co-polar
/// channel of the transmitted polarization. It decides
/// whether a cached noise estimate is usable and, when
/// equal bias is requested, its bias is applied to all
/// other channels.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
    strum_macros::EnumMessage,
)]
pub enum PolarizationMode {
    /// Single polarization, horizontal
    #[strum(detailed_message = "single pol, H")]
    SinglePolH,

    /// Single polarization, vertical
    #[strum(detailed_message = "single pol, V")]
    SinglePolV,

    /// Alternating H/V transmit, co-polar receivers only
    #[strum(detailed_message = "dual pol, alternating HV, co-polar only")]
    DpAltHvCoOnly,

    /// Alternating H/V transmit, co- and cross-polar receivers
    #[strum(detailed_message = "dual pol, alternating HV, co/cross")]
    DpAltHvCoCross,

    /// Simultaneous H/V transmit
    #[strum(detailed_message = "dual pol, simultaneous HV")]
    DpSimHv,

    /// Dual-pol receive, H transmit only
    #[strum(detailed_message = "dual pol, H transmit only")]
    DpHOnly,

    /// Dual-pol receive, V transmit only
    #[strum(detailed_message = "dual pol, V transmit only")]
    DpVOnly,
}

impl PolarizationMode {
    /// Active receiver channels, primary first
    pub fn channels(&self) -> &'static [Channel] {
        use Channel::*;
        match self {
            PolarizationMode::SinglePolH => &[Hc],
            PolarizationMode::SinglePolV => &[Vc],
            PolarizationMode::DpAltHvCoOnly => &[Hc, Vc],
            PolarizationMode::DpAltHvCoCross => &[Hc, Vc, Hx, Vx],
            PolarizationMode::DpSimHv => &[Hc, Vc],
            PolarizationMode::DpHOnly => &[Hc, Vx],
            PolarizationMode::DpVOnly => &[Vc, Hx],
        }
    }

    /// Co-polar channel of the transmitted polarization
    pub fn primary(&self) -> Channel {
        self.channels()[0]
    }

    /// Human-readable description
    pub fn as_display_str(&self) -> &'static str {
        use strum::EnumMessage;
        self.get_detailed_message().unwrap_or("")
    }
}

impl fmt::Display for PolarizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_str())
    }
}

/// How the noise level is estimated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputeMethod {
    /// Estimate each ray on its own
    ///
    /// The median of the ray's noise gates is used if at least
    /// `min_gates` of them carry a power for the primary channel.
    /// Otherwise a nearby cached
    /// estimate is used, if there is one, or the calibration.
    RayMedian { min_gates: usize },

    /// Estimate across rays
    ///
    /// Noise gates from successive rays are pooled. The estimate
    /// is the median of the last full pool of `window` gates.
    RunningMedian { window: usize },
}

impl ComputeMethod {
    /// Default minimum noise gates for a ray median
    pub const DEFAULT_MIN_GATES_RAY_MEDIAN: usize = 30;

    /// Default running median pool size
    pub const DEFAULT_GATES_RUNNING_MEDIAN: usize = RunningMedian::DEFAULT_WINDOW;
}

impl Default for ComputeMethod {
    fn default() -> Self {
        ComputeMethod::RayMedian {
            min_gates: Self::DEFAULT_MIN_GATES_RAY_MEDIAN,
        }
    }
}

impl fmt::Display for ComputeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeMethod::RayMedian { min_gates } => {
                write!(f, "ray median (min {} noise gates)", min_gates)
            }
            ComputeMethod::RunningMedian { window } => {
                write!(f, "running median ({} gate window)", window)
            }
        }
    }
}
