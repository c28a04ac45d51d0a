//! Structured error types for the CEP engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// Invalid tunable supplied at construction. Fatal to startup.
  #[error("configuration: {field}: {reason}")]
  Configuration { field: String, reason: String },

  /// Inbound reading failed validation before reaching the runtime.
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("detector {detector}: {reason}")]
  DetectorEvaluation { detector: String, reason: String },

  #[error("subscriber {subscriber}: {reason}")]
  SubscriberDispatch { subscriber: String, reason: String },

  #[error("engine stopped")]
  EngineStopped,

  #[error("engine not started")]
  NotStarted,

  #[error("engine already started")]
  AlreadyStarted,

  #[error("registration closed: engine already started")]
  RegistrationClosed,

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn configuration(field: &str, reason: impl Into<String>) -> Self {
    Self::Configuration {
      field: field.to_string(),
      reason: reason.into(),
    }
  }

  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn evaluation(detector: &str, reason: impl Into<String>) -> Self {
    Self::DetectorEvaluation {
      detector: detector.to_string(),
      reason: reason.into(),
    }
  }

  pub fn subscriber(subscriber: &str, reason: impl Into<String>) -> Self {
    Self::SubscriberDispatch {
      subscriber: subscriber.to_string(),
      reason: reason.into(),
    }
  }
}
