//! Notification sinks bound to detectors.
//!
//! Every detector owns exactly one subscriber and calls it synchronously on
//! the dispatching thread. Failures (returned errors or panics) stop at
//! [`deliver`] and never reach the detector's state.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::error::EngineError;
use crate::types::MatchPayload;

pub trait Subscriber: Send + Sync {
  /// Used for diagnostics only.
  fn name(&self) -> &str;

  /// Must not block indefinitely; the caller's thread waits on it.
  fn on_match(&self, payload: &MatchPayload) -> Result<(), EngineError>;
}

/// Invoke `subscriber`, logging and swallowing any failure.
///
/// Returns `false` when the subscriber failed.
pub fn deliver(subscriber: &dyn Subscriber, payload: &MatchPayload) -> bool {
  let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_match(payload)));
  let err = match outcome {
    Ok(Ok(())) => return true,
    Ok(Err(e)) => EngineError::subscriber(subscriber.name(), e.to_string()),
    Err(panic) => EngineError::subscriber(subscriber.name(), panic_message(panic.as_ref())),
  };
  warn!(kind = payload.kind().as_str(), error = %err, "subscriber failed; match dropped");
  false
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    format!("panicked: {}", s)
  } else if let Some(s) = panic.downcast_ref::<String>() {
    format!("panicked: {}", s)
  } else {
    "panicked".to_string()
  }
}

// ---------------------------------------------------------------------------
// Bundled subscribers
// ---------------------------------------------------------------------------

/// Reports matches through `tracing`.
#[derive(Debug, Clone)]
pub struct LogSubscriber {
  name: String,
}

impl LogSubscriber {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl Subscriber for LogSubscriber {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_match(&self, payload: &MatchPayload) -> Result<(), EngineError> {
    match payload {
      MatchPayload::Critical(alert) => warn!(
        subscriber = %self.name,
        oldest = alert.oldest.temperature,
        newest = alert.newest.temperature,
        window = alert.window.len(),
        "CRITICAL: sudden escalating temperature rise"
      ),
      MatchPayload::Warning(alert) => warn!(
        subscriber = %self.name,
        first = alert.first.temperature,
        second = alert.second.temperature,
        "WARNING: consecutive readings above threshold"
      ),
      MatchPayload::Monitor(avg) => info!(
        subscriber = %self.name,
        average = avg.average,
        samples = avg.sample_count,
        interval_end = %avg.interval_end.to_rfc3339(),
        "average temperature"
      ),
    }
    Ok(())
  }
}

/// Writes each payload as one JSON line.
pub struct JsonLinesSubscriber<W: Write + Send> {
  name: String,
  out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSubscriber<W> {
  pub fn new(name: impl Into<String>, out: W) -> Self {
    Self {
      name: name.into(),
      out: Mutex::new(out),
    }
  }
}

impl<W: Write + Send> Subscriber for JsonLinesSubscriber<W> {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_match(&self, payload: &MatchPayload) -> Result<(), EngineError> {
    let mut line = serde_json::to_vec(payload)?;
    line.push(b'\n');
    // Single write so lines from concurrent detectors never interleave.
    let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
    out.write_all(&line)?;
    out.flush()?;
    Ok(())
  }
}

/// Keeps every payload it receives, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySubscriber {
  name: String,
  received: Mutex<Vec<MatchPayload>>,
}

impl MemorySubscriber {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      received: Mutex::new(Vec::new()),
    }
  }

  pub fn payloads(&self) -> Vec<MatchPayload> {
    self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn len(&self) -> usize {
    self.received.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Subscriber for MemorySubscriber {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_match(&self, payload: &MatchPayload) -> Result<(), EngineError> {
    self
      .received
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(payload.clone());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::TemperatureAverage;
  use chrono::{TimeZone, Utc};

  fn payload() -> MatchPayload {
    MatchPayload::Monitor(TemperatureAverage {
      average: 20.0,
      sample_count: 3,
      interval_end: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 10).unwrap(),
    })
  }

  struct Failing;

  impl Subscriber for Failing {
    fn name(&self) -> &str {
      "failing"
    }

    fn on_match(&self, _payload: &MatchPayload) -> Result<(), EngineError> {
      Err(EngineError::subscriber("failing", "sink unavailable"))
    }
  }

  struct Panicking;

  impl Subscriber for Panicking {
    fn name(&self) -> &str {
      "panicking"
    }

    fn on_match(&self, _payload: &MatchPayload) -> Result<(), EngineError> {
      panic!("boom");
    }
  }

  #[test]
  fn deliver_reports_success() {
    let sink = MemorySubscriber::new("mem");
    assert!(deliver(&sink, &payload()));
    assert_eq!(sink.payloads(), vec![payload()]);
  }

  #[test]
  fn deliver_swallows_errors_and_panics() {
    assert!(!deliver(&Failing, &payload()));
    assert!(!deliver(&Panicking, &payload()));
  }

  #[test]
  fn json_lines_writes_one_line_per_match() {
    let sink = JsonLinesSubscriber::new("json", Vec::new());
    sink.on_match(&payload()).unwrap();
    sink.on_match(&payload()).unwrap();
    let out = sink.out.into_inner().unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["kind"], "monitor");
    assert_eq!(first["average"], 20.0);
  }
}
