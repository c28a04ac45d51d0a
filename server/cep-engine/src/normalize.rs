//! Normalize and validate inbound readings into canonical events.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::types::{InboundReading, TemperatureEvent};

/// Normalize a raw inbound reading into a validated `TemperatureEvent`.
pub fn normalize(raw: &InboundReading) -> Result<TemperatureEvent, EngineError> {
  if !raw.temperature.is_finite() {
    return Err(EngineError::validation("temperature", "must be a finite number"));
  }

  let timestamp = parse_timestamp(&raw.timestamp)?;

  let device_id = raw
    .device_id
    .as_deref()
    .map(str::trim)
    .filter(|d| !d.is_empty())
    .map(str::to_string);

  Ok(TemperatureEvent {
    device_id,
    temperature: raw.temperature,
    timestamp,
  })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, EngineError> {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return Err(EngineError::validation("timestamp", "must be non-empty"));
  }
  DateTime::parse_from_rfc3339(trimmed)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| EngineError::validation("timestamp", "must be RFC 3339"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(temperature: f64, timestamp: &str, device: Option<&str>) -> InboundReading {
    InboundReading {
      device_id: device.map(str::to_string),
      temperature,
      timestamp: timestamp.into(),
    }
  }

  #[test]
  fn valid_reading_normalizes() {
    let event = normalize(&raw(42.0, "2025-01-15T10:30:00+02:00", Some(" probe-1 "))).unwrap();
    assert_eq!(event.temperature, 42.0);
    assert_eq!(event.device_id.as_deref(), Some("probe-1"));
    assert_eq!(event.timestamp.to_rfc3339(), "2025-01-15T08:30:00+00:00");
  }

  #[test]
  fn blank_device_means_single_stream() {
    let event = normalize(&raw(42.0, "2025-01-15T10:30:00Z", Some("  "))).unwrap();
    assert!(event.device_id.is_none());
  }

  #[test]
  fn bad_timestamp_is_rejected() {
    let err = normalize(&raw(42.0, "yesterday", None)).unwrap_err();
    assert!(err.to_string().contains("timestamp"));
  }

  #[test]
  fn non_finite_temperature_is_rejected() {
    let err = normalize(&raw(f64::NAN, "2025-01-15T10:30:00Z", None)).unwrap_err();
    assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "temperature"));
  }
}
