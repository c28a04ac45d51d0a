//! Core types for the CEP engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound types (JSON contract — what the producer sends)
// ---------------------------------------------------------------------------

/// One inbound reading line. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundReading {
  #[serde(default)]
  pub device_id: Option<String>,
  pub temperature: f64,
  pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Internal event
// ---------------------------------------------------------------------------

/// Canonical temperature reading flowing through the engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureEvent {
  /// Absent means the single logical stream.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub device_id: Option<String>,
  pub temperature: f64,
  pub timestamp: DateTime<Utc>,
}

impl TemperatureEvent {
  pub fn new(temperature: f64, timestamp: DateTime<Utc>) -> Self {
    Self {
      device_id: None,
      temperature,
      timestamp,
    }
  }

  pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
    self.device_id = Some(device_id.into());
    self
  }
}

impl std::fmt::Display for TemperatureEvent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "TemperatureEvent [{}C at {}",
      self.temperature,
      self.timestamp.to_rfc3339()
    )?;
    if let Some(device) = &self.device_id {
      write!(f, " from {}", device)?;
    }
    write!(f, "]")
  }
}

// ---------------------------------------------------------------------------
// Detector kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
  Critical,
  Warning,
  Monitor,
}

impl DetectorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Critical => "critical",
      Self::Warning => "warning",
      Self::Monitor => "monitor",
    }
  }
}

// ---------------------------------------------------------------------------
// Match payloads (what subscribers receive)
// ---------------------------------------------------------------------------

/// Sudden sustained rise across the escalation window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalAlert {
  pub oldest: TemperatureEvent,
  pub newest: TemperatureEvent,
  /// Full window, oldest first.
  pub window: Vec<TemperatureEvent>,
}

/// Two consecutive readings above the warning threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningAlert {
  pub first: TemperatureEvent,
  pub second: TemperatureEvent,
}

/// Mean temperature over one closed monitor interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureAverage {
  pub average: f64,
  pub sample_count: u64,
  pub interval_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatchPayload {
  Critical(CriticalAlert),
  Warning(WarningAlert),
  Monitor(TemperatureAverage),
}

impl MatchPayload {
  pub fn kind(&self) -> DetectorKind {
    match self {
      Self::Critical(_) => DetectorKind::Critical,
      Self::Warning(_) => DetectorKind::Warning,
      Self::Monitor(_) => DetectorKind::Monitor,
    }
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn payload_serializes_with_kind_tag() {
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    let payload = MatchPayload::Monitor(TemperatureAverage {
      average: 20.0,
      sample_count: 3,
      interval_end: ts,
    });
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["kind"], "monitor");
    assert_eq!(json["sample_count"], 3);
    assert_eq!(payload.kind(), DetectorKind::Monitor);
  }

  #[test]
  fn event_display_mentions_device() {
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    let event = TemperatureEvent::new(21.5, ts).with_device("probe-7");
    let shown = event.to_string();
    assert!(shown.contains("21.5C"));
    assert!(shown.contains("probe-7"));
  }
}
