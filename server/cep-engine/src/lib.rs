//! Temperature CEP Engine — continuous queries over a reading stream.
//!
//! Three fixed detectors share every submitted reading:
//! - critical escalation: newest >= 1.5x oldest over a sliding window of 4
//! - consecutive threshold: two readings in a row above a warning threshold
//! - periodic average: mean temperature per fixed wall-clock interval
//!
//! Matches go synchronously to one subscriber per detector. In-memory only.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod escalation;
pub mod generator;
pub mod normalize;
pub mod runtime;
pub mod subscriber;
pub mod threshold;
pub mod types;
pub mod window;

pub use aggregate::PeriodicAverageAggregator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use detector::Detector;
pub use error::EngineError;
pub use escalation::CriticalEscalationDetector;
pub use runtime::{Runtime, StandardSubscribers};
pub use subscriber::{JsonLinesSubscriber, LogSubscriber, MemorySubscriber, Subscriber};
pub use threshold::ConsecutiveThresholdDetector;
pub use types::{InboundReading, MatchPayload, TemperatureEvent};
