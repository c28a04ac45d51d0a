//! Engine configuration with sane defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Tunables for the three detectors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Both readings of a consecutive pair must exceed this to warn.
  pub warning_threshold: f64,
  /// Number of readings in the escalation window (oldest vs newest).
  pub escalation_window: usize,
  /// Newest reading must reach `multiplier * oldest` to be critical.
  pub escalation_multiplier: f64,
  /// Length of one averaging interval, in seconds.
  pub monitor_interval_secs: f64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      warning_threshold: 400.0,
      escalation_window: 4,
      escalation_multiplier: 1.5,
      monitor_interval_secs: 10.0,
    }
  }
}

impl EngineConfig {
  /// Defaults overridden by any `CEP_*` environment variables that are set.
  pub fn from_env() -> Result<Self, EngineError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
    let mut config = Self::default();
    if let Some(v) = lookup("CEP_WARNING_THRESHOLD") {
      config.warning_threshold = parse_var("CEP_WARNING_THRESHOLD", &v)?;
    }
    if let Some(v) = lookup("CEP_ESCALATION_WINDOW") {
      config.escalation_window = parse_var("CEP_ESCALATION_WINDOW", &v)?;
    }
    if let Some(v) = lookup("CEP_ESCALATION_MULTIPLIER") {
      config.escalation_multiplier = parse_var("CEP_ESCALATION_MULTIPLIER", &v)?;
    }
    if let Some(v) = lookup("CEP_MONITOR_INTERVAL_SECS") {
      config.monitor_interval_secs = parse_var("CEP_MONITOR_INTERVAL_SECS", &v)?;
    }
    config.validate()?;
    Ok(config)
  }

  /// Reject any tunable the detectors cannot run with.
  pub fn validate(&self) -> Result<(), EngineError> {
    check_threshold(self.warning_threshold)?;
    check_window(self.escalation_window)?;
    check_multiplier(self.escalation_multiplier)?;
    self.monitor_interval()?;
    Ok(())
  }

  pub fn monitor_interval(&self) -> Result<Duration, EngineError> {
    interval_from_secs(self.monitor_interval_secs)
  }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, EngineError> {
  raw
    .trim()
    .parse()
    .map_err(|_| EngineError::configuration(key, format!("cannot parse {:?}", raw)))
}

pub(crate) fn check_threshold(threshold: f64) -> Result<(), EngineError> {
  if !threshold.is_finite() || threshold <= 0.0 {
    return Err(EngineError::configuration(
      "warning_threshold",
      format!("must be finite and > 0, got {}", threshold),
    ));
  }
  Ok(())
}

pub(crate) fn check_window(window: usize) -> Result<(), EngineError> {
  if window < 2 {
    return Err(EngineError::configuration(
      "escalation_window",
      format!("must hold at least 2 readings, got {}", window),
    ));
  }
  Ok(())
}

pub(crate) fn check_multiplier(multiplier: f64) -> Result<(), EngineError> {
  if !multiplier.is_finite() || multiplier <= 0.0 {
    return Err(EngineError::configuration(
      "escalation_multiplier",
      format!("must be finite and > 0, got {}", multiplier),
    ));
  }
  Ok(())
}

/// Longest accepted monitor interval: one year.
pub const MAX_MONITOR_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn interval_from_secs(secs: f64) -> Result<Duration, EngineError> {
  if !secs.is_finite() || secs <= 0.0 {
    return Err(EngineError::configuration(
      "monitor_interval_secs",
      format!("must be finite and > 0, got {}", secs),
    ));
  }
  let interval = Duration::try_from_secs_f64(secs)
    .map_err(|e| EngineError::configuration("monitor_interval_secs", e.to_string()))?;
  check_interval(interval)?;
  Ok(interval)
}

pub(crate) fn check_interval(interval: Duration) -> Result<(), EngineError> {
  if interval.is_zero() {
    return Err(EngineError::configuration(
      "monitor_interval_secs",
      "rounds to a zero duration",
    ));
  }
  if interval > MAX_MONITOR_INTERVAL {
    return Err(EngineError::configuration(
      "monitor_interval_secs",
      format!(
        "must be at most {}s, got {}s",
        MAX_MONITOR_INTERVAL.as_secs(),
        interval.as_secs_f64()
      ),
    ));
  }
  Ok(())
}
