//! Cooperative cancellation and progress reporting

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::VcsError;

/// Shared handle observed by long-running work.
///
/// Cloning yields another handle to the same state: cancelling any clone
/// cancels them all. Work checks [`check_canceled`](Self::check_canceled) at
/// its own suspension points; nothing is interrupted implicitly.
#[derive(Debug, Clone, Default)]
pub struct ProgressIndicator {
    state: Arc<IndicatorState>,
}

#[derive(Debug, Default)]
struct IndicatorState {
    canceled: AtomicBool,
    fraction: AtomicU64,
}

impl ProgressIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    /// Returns `Err(VcsError::Cancelled)` once [`cancel`](Self::cancel) was called
    pub fn check_canceled(&self) -> Result<(), VcsError> {
        if self.is_canceled() {
            Err(VcsError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Records completion in `[0, 1]`; out-of-range and NaN values are clamped
    pub fn set_fraction(&self, fraction: f64) {
        let clamped = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.state.fraction.store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.state.fraction.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let indicator = ProgressIndicator::new();
        let clone = indicator.clone();
        assert!(clone.check_canceled().is_ok());

        indicator.cancel();
        assert!(clone.is_canceled());
        assert!(matches!(clone.check_canceled(), Err(VcsError::Cancelled)));
    }

    #[test]
    fn test_fraction_is_clamped() {
        let indicator = ProgressIndicator::new();
        assert_eq!(indicator.fraction(), 0.0);
        indicator.set_fraction(0.25);
        assert_eq!(indicator.fraction(), 0.25);
        indicator.set_fraction(3.0);
        assert_eq!(indicator.fraction(), 1.0);
        indicator.set_fraction(f64::NAN);
        assert_eq!(indicator.fraction(), 0.0);
    }
}
