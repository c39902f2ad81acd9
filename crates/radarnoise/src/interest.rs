//! Fuzzy-logic interest maps
//!
//! An [`InterestMap`] is a piecewise-linear membership function.
//! It maps a feature value, like the phase-change error at a
//! gate, onto an *interest* score between zero and one. Several
//! interest scores are combined, with weights, to decide whether
//! a gate contains noise or signal.
//!
//! ```txt
//!  interest
//!    1.0 |          +--------
//!        |         /
//!        |        /
//!  0.001 |-------+
//!        +------------------- value
//!               40  50
//! ```

use std::fmt;

use thiserror::Error;

/// One control point of an [`InterestMap`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImPoint {
    value: f64,
    interest: f64,
}

impl ImPoint {
    /// Control point mapping `value` to `interest`
    pub const fn new(value: f64, interest: f64) -> Self {
        Self { value, interest }
    }

    /// Feature value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Interest at this point
    pub fn interest(&self) -> f64 {
        self.interest
    }
}

/// Error constructing an [`InterestMap`]
#[derive(Error, Clone, Debug, PartialEq)]
pub enum InterestMapErr {
    /// No control points were given
    #[error("interest map \"{0}\": no control points")]
    Empty(String),

    /// Control point values must strictly increase
    #[error("interest map \"{0}\": point values must be strictly increasing")]
    NotIncreasing(String),

    /// A control point or weight is NaN or infinite
    #[error("interest map \"{0}\": non-finite control point or weight")]
    NonFinite(String),
}

/// Piecewise-linear interest map
///
/// Inputs between two control points are linearly
/// interpolated. Inputs below the first point or above
/// the last point take the interest of that endpoint.
///
/// ```
/// use radarnoise::{ImPoint, InterestMap};
///
/// let map = InterestMap::new(
///     "PhaseChangeErrorForNoise",
///     &[ImPoint::new(40.0, 0.0), ImPoint::new(50.0, 1.0)],
///     1.0,
/// ).expect("bad map");
///
/// assert_eq!(map.interest(0.0), 0.0);
/// assert_eq!(map.interest(45.0), 0.5);
/// assert_eq!(map.interest(90.0), 1.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct InterestMap {
    label: String,
    points: Vec<ImPoint>,
    weight: f64,
}

impl InterestMap {
    /// Create an interest map
    ///
    /// `points` must be non-empty, finite, and sorted by
    /// strictly increasing value. The `weight` is used when
    /// this map's interest is fused with other maps.
    pub fn new<S>(label: S, points: &[ImPoint], weight: f64) -> Result<Self, InterestMapErr>
    where
        S: Into<String>,
    {
        let label = label.into();
        if points.is_empty() {
            return Err(InterestMapErr::Empty(label));
        }
        if !weight.is_finite()
            || points
                .iter()
                .any(|pt| !pt.value.is_finite() || !pt.interest.is_finite())
        {
            return Err(InterestMapErr::NonFinite(label));
        }
        if points.windows(2).any(|pair| pair[1].value <= pair[0].value) {
            return Err(InterestMapErr::NotIncreasing(label));
        }

        Ok(Self {
            label,
            points: points.to_vec(),
            weight,
        })
    }

    /// Interest for the given feature `value`
    pub fn interest(&self, value: f64) -> f64 {
        // non-empty by construction
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if value <= first.value {
            return first.interest;
        }
        if value >= last.value {
            return last.interest;
        }

        for pair in self.points.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if value <= hi.value {
                let frac = (value - lo.value) / (hi.value - lo.value);
                return lo.interest + frac * (hi.interest - lo.interest);
            }
        }

        last.interest
    }

    /// Map name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Control points
    pub fn points(&self) -> &[ImPoint] {
        &self.points
    }

    /// Fusion weight
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl fmt::Display for InterestMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (weight {}):", self.label, self.weight)?;
        for pt in &self.points {
            write!(f, " ({}, {})", pt.value, pt.interest)?;
        }
        Ok(())
    }
}

/// Default interest maps for noise and signal detection
pub(crate) mod defaults {
    use super::{ImPoint, InterestMap};

    pub const PHASE_CHANGE_ERROR_FOR_NOISE: [ImPoint; 2] =
        [ImPoint::new(40.0, 0.001), ImPoint::new(50.0, 1.0)];
    pub const DBM_SDEV_FOR_NOISE: [ImPoint; 2] =
        [ImPoint::new(0.65, 1.0), ImPoint::new(0.75, 0.001)];
    pub const NCP_MEAN_FOR_NOISE: [ImPoint; 2] =
        [ImPoint::new(0.10, 1.0), ImPoint::new(0.20, 0.001)];
    pub const PHASE_CHANGE_ERROR_FOR_SIGNAL: [ImPoint; 2] =
        [ImPoint::new(10.0, 0.001), ImPoint::new(20.0, 1.0)];
    pub const DBM_SDEV_FOR_SIGNAL: [ImPoint; 2] =
        [ImPoint::new(0.75, 1.0), ImPoint::new(0.85, 0.001)];

    // the tables above are known-good
    fn make(label: &str, pts: &[ImPoint]) -> InterestMap {
        InterestMap {
            label: label.to_owned(),
            points: pts.to_vec(),
            weight: 1.0,
        }
    }

    pub fn phase_change_error_for_noise() -> InterestMap {
        make("PhaseChangeErrorForNoise", &PHASE_CHANGE_ERROR_FOR_NOISE)
    }

    pub fn dbm_sdev_for_noise() -> InterestMap {
        make("DbmSdevForNoise", &DBM_SDEV_FOR_NOISE)
    }

    pub fn ncp_mean_for_noise() -> InterestMap {
        make("NcpMeanForNoise", &NCP_MEAN_FOR_NOISE)
    }

    pub fn phase_change_error_for_signal() -> InterestMap {
        make("PhaseChangeErrorForSignal", &PHASE_CHANGE_ERROR_FOR_SIGNAL)
    }

    pub fn dbm_sdev_for_signal() -> InterestMap {
        make("DbmSdevForSignal", &DBM_SDEV_FOR_SIGNAL)
    }
}
