//! State shared between noise locators
//!
//! Rays are usually processed by several worker threads at
//! once, each with its own [`NoiseLocator`](crate::NoiseLocator).
//! The locators share three pieces of state, each behind its
//! own lock:
//!
//! 1. the [spatial noise cache](crate::SpatialNoiseCache);
//! 2. the [running median](crate::RunningMedian) buffers; and
//! 3. the [compute method](crate::ComputeMethod).
//!
//! No lock is ever held while another is taken.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;

#[cfg(not(test))]
use log::info;

#[cfg(test)]
use std::println as info;

use crate::cache::SpatialNoiseCache;
use crate::median::RunningMedian;
use crate::mode::ComputeMethod;
use crate::moments::ChannelValues;

lazy_static! {
    static ref PROCESS_STATE: Arc<SharedNoiseState> = Arc::new(SharedNoiseState::new());
}

/// Noise state shared by many locators
///
/// Locators use the process-wide instance from
/// [`global()`](#method.global) unless they are built with
/// their own. Wrap a private instance in an `Arc` to share it
/// among a chosen set of locators.
///
/// ```
/// use std::sync::Arc;
/// use radarnoise::{ComputeMethod, NoiseLocatorBuilder, SharedNoiseState};
///
/// let state = Arc::new(SharedNoiseState::new());
/// let locator = NoiseLocatorBuilder::new()
///     .with_shared_state(state.clone())
///     .build();
///
/// locator.set_compute_running_median(1000);
/// assert_eq!(
///     state.compute_method(),
///     ComputeMethod::RunningMedian { window: 1000 }
/// );
/// ```
#[derive(Debug)]
pub struct SharedNoiseState {
    cache: SpatialNoiseCache,
    running: Mutex<RunningMedian>,
    method: Mutex<ComputeMethod>,
}

impl SharedNoiseState {
    /// New, empty shared state
    ///
    /// The compute method is the default ray median.
    pub fn new() -> Self {
        Self {
            cache: SpatialNoiseCache::new(),
            running: Mutex::new(RunningMedian::default()),
            method: Mutex::new(ComputeMethod::default()),
        }
    }

    /// The process-wide shared state
    pub fn global() -> Arc<SharedNoiseState> {
        PROCESS_STATE.clone()
    }

    /// Spatial noise cache
    pub fn cache(&self) -> &SpatialNoiseCache {
        &self.cache
    }

    /// Current compute method
    pub fn compute_method(&self) -> ComputeMethod {
        *lock(&self.method)
    }

    /// Estimate each ray on its own
    ///
    /// Rays with at least `min_gates` noise gates are estimated
    /// from their own median.
    pub fn set_compute_ray_median(&self, min_gates: usize) {
        let method = ComputeMethod::RayMedian { min_gates };
        *lock(&self.method) = method;
        info!("noise: compute method: {}", method);
    }

    /// Estimate with a running median over `window` noise gates
    ///
    /// If the window size changes, any partially-filled buffer
    /// is discarded.
    pub fn set_compute_running_median(&self, window: usize) {
        let window = usize::max(window, 1);
        let method = ComputeMethod::RunningMedian { window };
        *lock(&self.method) = method;
        info!("noise: compute method: {}", method);

        if lock(&self.running).set_window(window) {
            info!("noise: running median buffers reset to {} gates", window);
        }
    }

    /// Latest running median estimates (dBm)
    ///
    /// Channels which have not yet been estimated report
    /// [`MISSING`](crate::MISSING).
    pub fn running_median_noise(&self) -> ChannelValues {
        lock(&self.running).estimates()
    }

    /// Number of noise gates buffered toward the next running median
    pub fn running_median_count(&self) -> usize {
        lock(&self.running).count()
    }

    /// Lock the running median buffers
    pub(crate) fn running(&self) -> MutexGuard<'_, RunningMedian> {
        lock(&self.running)
    }

    /// Clear the cache and running median, and restore the
    /// default compute method
    pub fn reset(&self) {
        self.cache.clear();
        *lock(&self.running) = RunningMedian::default();
        *lock(&self.method) = ComputeMethod::default();
    }
}

impl Default for SharedNoiseState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
