//! Synthetic temperature producer for demos and soak runs.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::types::TemperatureEvent;

/// Default number of readings a demo run sends.
pub const DEFAULT_EVENT_COUNT: u64 = 1000;

/// Readings after the burst's starting reading: two climbing steps, then the
/// peak held twice.
const BURST_TAIL: usize = 4;

/// Normal readings drawn uniformly from a range, broken by occasional
/// escalation bursts, with evenly spaced timestamps.
///
/// A burst climbs from the current reading to `burst_peak` (at least 1.6x
/// the start) and holds the peak for two readings, so with the default
/// tunables it trips both the escalation and the consecutive-threshold
/// detectors. The same seed and start instant always yield the same sequence.
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
  rng: StdRng,
  min: f64,
  max: f64,
  burst_chance: f64,
  burst_peak: f64,
  pending: VecDeque<f64>,
  next_at: DateTime<Utc>,
  step: Duration,
  device_id: Option<String>,
}

impl ReadingGenerator {
  pub fn new(seed: u64, start: DateTime<Utc>) -> Self {
    Self {
      rng: StdRng::seed_from_u64(seed),
      min: 20.0,
      max: 100.0,
      burst_chance: 0.02,
      burst_peak: 480.0,
      pending: VecDeque::with_capacity(BURST_TAIL),
      next_at: start,
      step: Duration::milliseconds(300),
      device_id: None,
    }
  }

  /// Range of normal (non-burst) readings.
  pub fn with_range(mut self, min: f64, max: f64) -> Result<Self, EngineError> {
    if !min.is_finite() || !max.is_finite() || min >= max {
      return Err(EngineError::configuration(
        "generator_range",
        format!("need finite min < max, got {}..{}", min, max),
      ));
    }
    self.min = min;
    self.max = max;
    Ok(self)
  }

  /// Probability that a normal reading starts a burst; 0 disables bursts.
  pub fn with_bursts(mut self, chance: f64, peak: f64) -> Result<Self, EngineError> {
    if !(0.0..=1.0).contains(&chance) {
      return Err(EngineError::configuration(
        "generator_burst_chance",
        format!("must be within 0..=1, got {}", chance),
      ));
    }
    if !peak.is_finite() || peak <= 0.0 {
      return Err(EngineError::configuration(
        "generator_burst_peak",
        format!("must be finite and > 0, got {}", peak),
      ));
    }
    self.burst_chance = chance;
    self.burst_peak = peak;
    Ok(self)
  }

  pub fn with_step(mut self, step: Duration) -> Self {
    self.step = step;
    self
  }

  pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
    self.device_id = Some(device_id.into());
    self
  }

  fn queue_burst(&mut self, start: f64) {
    let peak = self.burst_peak.max(start.abs() * 1.6);
    let rise = (peak - start) / 3.0;
    self.pending.push_back(start + rise);
    self.pending.push_back(start + 2.0 * rise);
    self.pending.push_back(peak);
    self.pending.push_back(peak);
  }
}

/// Whole tenths, like a typical probe.
fn tenths(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}

impl Iterator for ReadingGenerator {
  type Item = TemperatureEvent;

  fn next(&mut self) -> Option<Self::Item> {
    let raw = match self.pending.pop_front() {
      Some(v) => v,
      None => {
        let v: f64 = self.rng.gen_range(self.min..self.max);
        if self.burst_chance > 0.0 && self.rng.gen_bool(self.burst_chance) {
          self.queue_burst(v);
        }
        v
      }
    };

    let event = TemperatureEvent {
      device_id: self.device_id.clone(),
      temperature: tenths(raw),
      timestamp: self.next_at,
    };
    self.next_at += self.step;
    Some(event)
  }
}
