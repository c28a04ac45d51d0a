//! Consecutive-threshold warning: two readings in a row strictly above T.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::config;
use crate::detector::{require_finite, Detector};
use crate::error::EngineError;
use crate::subscriber::{deliver, Subscriber};
use crate::types::{MatchPayload, TemperatureEvent, WarningAlert};
use crate::window::SlidingWindow;

const PAIR: usize = 2;

pub struct ConsecutiveThresholdDetector {
  name: String,
  threshold: f64,
  window: Mutex<SlidingWindow<TemperatureEvent>>,
  subscriber: Arc<dyn Subscriber>,
}

impl ConsecutiveThresholdDetector {
  pub fn new(threshold: f64, subscriber: Arc<dyn Subscriber>) -> Result<Self, EngineError> {
    config::check_threshold(threshold)?;
    Ok(Self {
      name: "consecutive-threshold".to_string(),
      threshold,
      window: Mutex::new(SlidingWindow::new(PAIR)),
      subscriber,
    })
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }
}

fn over_threshold(window: &SlidingWindow<TemperatureEvent>, threshold: f64) -> Option<WarningAlert> {
  if !window.is_full() {
    return None;
  }
  let (first, second) = (window.oldest()?, window.newest()?);
  if first.temperature > threshold && second.temperature > threshold {
    Some(WarningAlert {
      first: first.clone(),
      second: second.clone(),
    })
  } else {
    None
  }
}

impl Detector for ConsecutiveThresholdDetector {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_event(&self, event: &TemperatureEvent) -> Result<(), EngineError> {
    require_finite(&self.name, event)?;

    let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
    window.push(event.clone());

    if let Some(alert) = over_threshold(&window, self.threshold) {
      debug!(
        detector = %self.name,
        first = alert.first.temperature,
        second = alert.second.temperature,
        "threshold pair matched"
      );
      deliver(self.subscriber.as_ref(), &MatchPayload::Warning(alert));
    }
    Ok(())
  }
}
