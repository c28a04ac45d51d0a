//! The continuous-query seam: everything the runtime dispatches to.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::types::TemperatureEvent;

/// A continuous query with private window state.
///
/// Implementations guard their own state; `on_event` and `on_tick` may be
/// called concurrently from producer threads and the timer thread.
pub trait Detector: Send + Sync {
  fn name(&self) -> &str;

  /// Push `event` into the window, evaluate, notify on match.
  ///
  /// On `Err` the window must be left as it was before the call.
  fn on_event(&self, event: &TemperatureEvent) -> Result<(), EngineError>;

  /// Period of the time-driven side of this detector, if it has one.
  fn tick_period(&self) -> Option<Duration> {
    None
  }

  fn on_tick(&self, _at: DateTime<Utc>) -> Result<(), EngineError> {
    Ok(())
  }
}

/// Shared guard: detectors refuse readings they cannot evaluate.
pub(crate) fn require_finite(detector: &str, event: &TemperatureEvent) -> Result<(), EngineError> {
  if event.temperature.is_finite() {
    Ok(())
  } else {
    Err(EngineError::evaluation(
      detector,
      format!("non-finite temperature {}", event.temperature),
    ))
  }
}
