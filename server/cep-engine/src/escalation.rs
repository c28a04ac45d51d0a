//! Critical escalation: newest reading at least `multiplier` times the
//! oldest across a full sliding window.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::config;
use crate::detector::{require_finite, Detector};
use crate::error::EngineError;
use crate::subscriber::{deliver, Subscriber};
use crate::types::{CriticalAlert, MatchPayload, TemperatureEvent};
use crate::window::SlidingWindow;

pub const DEFAULT_WINDOW: usize = 4;
pub const DEFAULT_MULTIPLIER: f64 = 1.5;

pub struct CriticalEscalationDetector {
  name: String,
  multiplier: f64,
  window: Mutex<SlidingWindow<TemperatureEvent>>,
  subscriber: Arc<dyn Subscriber>,
}

impl CriticalEscalationDetector {
  pub fn new(
    window_size: usize,
    multiplier: f64,
    subscriber: Arc<dyn Subscriber>,
  ) -> Result<Self, EngineError> {
    config::check_window(window_size)?;
    config::check_multiplier(multiplier)?;
    Ok(Self {
      name: "critical-escalation".to_string(),
      multiplier,
      window: Mutex::new(SlidingWindow::new(window_size)),
      subscriber,
    })
  }

  pub fn with_defaults(subscriber: Arc<dyn Subscriber>) -> Result<Self, EngineError> {
    Self::new(DEFAULT_WINDOW, DEFAULT_MULTIPLIER, subscriber)
  }
}

/// Evaluate a window. Nothing fires until the window is full.
///
/// Comparison is inclusive: `newest >= multiplier * oldest`.
pub fn escalation(
  window: &SlidingWindow<TemperatureEvent>,
  multiplier: f64,
) -> Option<CriticalAlert> {
  if !window.is_full() {
    return None;
  }
  let (oldest, newest) = (window.oldest()?, window.newest()?);
  if newest.temperature >= multiplier * oldest.temperature {
    Some(CriticalAlert {
      oldest: oldest.clone(),
      newest: newest.clone(),
      window: window.snapshot(),
    })
  } else {
    None
  }
}

impl Detector for CriticalEscalationDetector {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_event(&self, event: &TemperatureEvent) -> Result<(), EngineError> {
    require_finite(&self.name, event)?;

    // Held through notification so push/evaluate/notify is atomic per detector.
    let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
    window.push(event.clone());

    if let Some(alert) = escalation(&window, self.multiplier) {
      debug!(
        detector = %self.name,
        oldest = alert.oldest.temperature,
        newest = alert.newest.temperature,
        "escalation matched"
      );
      deliver(self.subscriber.as_ref(), &MatchPayload::Critical(alert));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscriber::MemorySubscriber;
  use chrono::{Duration, TimeZone, Utc};

  fn events(values: &[f64]) -> Vec<TemperatureEvent> {
    let start = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    values
      .iter()
      .enumerate()
      .map(|(i, v)| TemperatureEvent::new(*v, start + Duration::seconds(i as i64)))
      .collect()
  }

  fn run(values: &[f64]) -> Vec<MatchPayload> {
    let sink = Arc::new(MemorySubscriber::new("critical"));
    let detector = CriticalEscalationDetector::with_defaults(sink.clone()).unwrap();
    for e in events(values) {
      detector.on_event(&e).unwrap();
    }
    sink.payloads()
  }

  #[test]
  fn fires_when_newest_reaches_one_and_a_half_times_oldest() {
    let fired = run(&[10.0, 12.0, 14.0, 16.0]);
    assert_eq!(fired.len(), 1);
    match &fired[0] {
      MatchPayload::Critical(alert) => {
        assert_eq!(alert.oldest.temperature, 10.0);
        assert_eq!(alert.newest.temperature, 16.0);
        assert_eq!(alert.window.len(), 4);
      }
      other => panic!("unexpected payload {:?}", other),
    }
  }

  #[test]
  fn does_not_fire_below_multiplier() {
    assert!(run(&[10.0, 11.0, 12.0, 13.0]).is_empty());
  }

  #[test]
  fn comparison_is_inclusive() {
    assert_eq!(run(&[10.0, 10.0, 10.0, 15.0]).len(), 1);
  }

  #[test]
  fn never_fires_before_window_is_full() {
    // 100 >= 1.5 * 10, but only three readings seen.
    assert!(run(&[10.0, 50.0, 100.0]).is_empty());
  }

  #[test]
  fn re_fires_on_every_qualifying_slide() {
    // Windows: [10,20,30,40] fires, [20,30,40,50] fires, [30,40,50,44] does not.
    let fired = run(&[10.0, 20.0, 30.0, 40.0, 50.0, 44.0]);
    assert_eq!(fired.len(), 2);
  }

  #[test]
  fn non_finite_reading_leaves_window_untouched() {
    let sink = Arc::new(MemorySubscriber::new("critical"));
    let detector = CriticalEscalationDetector::with_defaults(sink.clone()).unwrap();
    let evs = events(&[10.0, 12.0, 14.0, 16.0]);
    for e in &evs[..3] {
      detector.on_event(e).unwrap();
    }
    let bad = TemperatureEvent::new(f64::NAN, evs[3].timestamp);
    assert!(matches!(
      detector.on_event(&bad),
      Err(EngineError::DetectorEvaluation { .. })
    ));
    detector.on_event(&evs[3]).unwrap();
    assert_eq!(sink.len(), 1);
  }

  #[test]
  fn rejects_bad_tunables() {
    let sink: Arc<dyn Subscriber> = Arc::new(MemorySubscriber::new("critical"));
    assert!(CriticalEscalationDetector::new(1, 1.5, sink.clone()).is_err());
    assert!(CriticalEscalationDetector::new(4, f64::NAN, sink).is_err());
  }
}
