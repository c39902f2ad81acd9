use std::sync::Arc;

use crate::classify::{Classifier, GapFilter, SpeckleFilter};
use crate::interest::InterestMap;
use crate::locator::NoiseLocator;
use crate::shared::SharedNoiseState;

/// Builds a noise locator
///
/// The builder comes with the standard set of interest maps
/// and thresholds, which work well for most S- and C-band
/// weather radars. The default values are *not* part of this
/// crate's API and may be retuned in any minor release. If you
/// care about a setting, configure it here.
///
/// ```
/// use radarnoise::{ImPoint, InterestMap, NoiseLocatorBuilder};
///
/// let ncp_map = InterestMap::new(
///     "NcpMeanForNoise",
///     &[ImPoint::new(0.05, 1.0), ImPoint::new(0.25, 0.001)],
///     2.0,
/// ).expect("bad interest map");
///
/// let locator = NoiseLocatorBuilder::new()
///     .with_kernel_size(11)
///     .with_interest_map_ncp_mean_for_noise(ncp_map)
///     .with_equal_bias_in_all_channels(true)
///     .build();
/// assert_eq!(locator.kernel_size(), 11);
/// ```
///
/// The *compute method* is not a per-locator setting. It belongs
/// to the [`SharedNoiseState`], so that every locator sharing
/// that state agrees on it.
#[derive(Clone, Debug)]
pub struct NoiseLocatorBuilder {
    n_gates_kernel: usize,
    classifier: Classifier,
    equal_bias_in_all_channels: bool,
    debug: bool,
    shared: Arc<SharedNoiseState>,
}

impl NoiseLocatorBuilder {
    /// New builder with default settings
    ///
    /// Locators share the process-wide
    /// [`SharedNoiseState::global()`] unless
    /// [`with_shared_state()`](#method.with_shared_state)
    /// says otherwise.
    pub fn new() -> Self {
        Self {
            n_gates_kernel: 9,
            classifier: Classifier::new(),
            equal_bias_in_all_channels: false,
            debug: false,
            shared: SharedNoiseState::global(),
        }
    }

    /// Build a noise locator
    pub fn build(&self) -> NoiseLocator {
        NoiseLocator::from(self)
    }

    /// Feature kernel size (gates)
    ///
    /// Features are computed over a window of this many
    /// gates. Even sizes are rounded up to the next odd
    /// number. Rays shorter than the kernel are not
    /// classified at all.
    pub fn with_kernel_size(&mut self, n_gates: usize) -> &mut Self {
        self.n_gates_kernel = usize::max(n_gates, 1);
        self
    }

    /// Interest map and weight: phase-change error → noise
    pub fn with_interest_map_phase_change_error_for_noise(
        &mut self,
        map: InterestMap,
    ) -> &mut Self {
        self.classifier.phase_change_error_for_noise = map;
        self
    }

    /// Interest map and weight: dBm standard deviation → noise
    pub fn with_interest_map_dbm_sdev_for_noise(&mut self, map: InterestMap) -> &mut Self {
        self.classifier.dbm_sdev_for_noise = map;
        self
    }

    /// Interest map and weight: NCP mean → noise
    pub fn with_interest_map_ncp_mean_for_noise(&mut self, map: InterestMap) -> &mut Self {
        self.classifier.ncp_mean_for_noise = map;
        self
    }

    /// Interest map and weight: phase-change error → signal
    pub fn with_interest_map_phase_change_error_for_signal(
        &mut self,
        map: InterestMap,
    ) -> &mut Self {
        self.classifier.phase_change_error_for_signal = map;
        self
    }

    /// Interest map and weight: dBm standard deviation → signal
    pub fn with_interest_map_dbm_sdev_for_signal(&mut self, map: InterestMap) -> &mut Self {
        self.classifier.dbm_sdev_for_signal = map;
        self
    }

    /// Noise interest threshold
    ///
    /// Gates whose fused noise interest is *above* this value
    /// are flagged as noise.
    pub fn with_interest_threshold_for_noise(&mut self, thresh: f64) -> &mut Self {
        self.classifier.threshold_for_noise = thresh;
        self
    }

    /// Signal interest threshold
    ///
    /// Gates whose fused signal interest is *at or below* this
    /// value are flagged as signal.
    pub fn with_interest_threshold_for_signal(&mut self, thresh: f64) -> &mut Self {
        self.classifier.threshold_for_signal = thresh;
        self
    }

    /// Apply the same noise bias to every channel
    ///
    /// If enabled, the bias of the mode's primary channel
    /// is copied to all of the other active channels.
    pub fn with_equal_bias_in_all_channels(&mut self, equal: bool) -> &mut Self {
        self.equal_bias_in_all_channels = equal;
        self
    }

    /// Enable the noise flag speckle filter
    pub fn with_speckle_filter(&mut self, filter: SpeckleFilter) -> &mut Self {
        self.classifier.speckle_filter = Some(filter);
        self
    }

    /// Disable the noise flag speckle filter
    pub fn without_speckle_filter(&mut self) -> &mut Self {
        self.classifier.speckle_filter = None;
        self
    }

    /// Enable the noise flag gap filter
    pub fn with_gap_filter(&mut self, filter: GapFilter) -> &mut Self {
        self.classifier.gap_filter = Some(filter);
        self
    }

    /// Disable the noise flag gap filter
    pub fn without_gap_filter(&mut self) -> &mut Self {
        self.classifier.gap_filter = None;
        self
    }

    /// Log parameters and per-ray results at `debug` level
    pub fn with_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    /// Share state with a chosen set of locators
    pub fn with_shared_state(&mut self, shared: Arc<SharedNoiseState>) -> &mut Self {
        self.shared = shared;
        self
    }

    /// Feature kernel size (gates), as requested
    pub fn kernel_size(&self) -> usize {
        self.n_gates_kernel
    }

    /// Classifier settings
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Equal bias in all channels
    pub fn equal_bias_in_all_channels(&self) -> bool {
        self.equal_bias_in_all_channels
    }

    /// Debug logging
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Shared state
    pub fn shared_state(&self) -> &Arc<SharedNoiseState> {
        &self.shared
    }
}

impl std::default::Default for NoiseLocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::interest::ImPoint;

    #[test]
    fn test_builder_defaults() {
        let builder = NoiseLocatorBuilder::default();
        assert_eq!(builder.kernel_size(), 9);
        assert_eq!(builder.classifier().threshold_for_noise(), 0.51);
        assert_eq!(builder.classifier().threshold_for_signal(), 0.51);
        assert!(!builder.equal_bias_in_all_channels());
        assert!(Arc::ptr_eq(
            builder.shared_state(),
            &SharedNoiseState::global()
        ));

        let labels: Vec<&str> = builder
            .classifier()
            .interest_maps()
            .iter()
            .map(|m| m.label())
            .collect();
        assert_eq!(
            labels,
            vec![
                "PhaseChangeErrorForNoise",
                "DbmSdevForNoise",
                "NcpMeanForNoise",
                "PhaseChangeErrorForSignal",
                "DbmSdevForSignal"
            ]
        );
        for map in builder.classifier().interest_maps() {
            assert_eq!(map.weight(), 1.0);
        }
    }

    #[test]
    fn test_builder_setters() {
        let map = InterestMap::new("pce", &[ImPoint::new(30.0, 0.0), ImPoint::new(60.0, 1.0)], 3.0)
            .expect("valid map");
        let mut builder = NoiseLocatorBuilder::new();
        builder
            .with_kernel_size(0)
            .with_interest_map_phase_change_error_for_noise(map.clone())
            .with_interest_threshold_for_noise(0.6)
            .with_gap_filter(GapFilter::new(6, 0.35))
            .with_speckle_filter(SpeckleFilter::new(&[(7, 0.51)]))
            .without_speckle_filter();

        assert_eq!(builder.kernel_size(), 1);
        assert_eq!(builder.classifier().interest_maps()[0], &map);
        assert_eq!(builder.classifier().threshold_for_noise(), 0.6);
        assert_eq!(builder.classifier().gap_filter, Some(GapFilter::new(6, 0.35)));
        assert_eq!(builder.classifier().speckle_filter, None);
    }
}
