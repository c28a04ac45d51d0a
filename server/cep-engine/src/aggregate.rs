//! Periodic average monitor: a tumbling time window flushed by ticks.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config;
use crate::detector::{require_finite, Detector};
use crate::error::EngineError;
use crate::subscriber::{deliver, Subscriber};
use crate::types::{MatchPayload, TemperatureAverage, TemperatureEvent};

#[derive(Debug, Default)]
struct Accumulator {
  sum: f64,
  count: u64,
}

pub struct PeriodicAverageAggregator {
  name: String,
  interval: Duration,
  acc: Mutex<Accumulator>,
  subscriber: Arc<dyn Subscriber>,
}

impl PeriodicAverageAggregator {
  pub fn new(interval: Duration, subscriber: Arc<dyn Subscriber>) -> Result<Self, EngineError> {
    config::check_interval(interval)?;
    Ok(Self {
      name: "periodic-average".to_string(),
      interval,
      acc: Mutex::new(Accumulator::default()),
      subscriber,
    })
  }

  pub fn from_secs(secs: f64, subscriber: Arc<dyn Subscriber>) -> Result<Self, EngineError> {
    Self::new(config::interval_from_secs(secs)?, subscriber)
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Close the current interval at `interval_end`.
  ///
  /// Emits nothing for an empty interval. Sum and count are reset under the
  /// same lock that `on_event` accumulates under.
  pub fn flush(&self, interval_end: DateTime<Utc>) -> Option<TemperatureAverage> {
    let mut acc = self.acc.lock().unwrap_or_else(PoisonError::into_inner);
    if acc.count == 0 {
      debug!(detector = %self.name, "empty interval; nothing to report");
      return None;
    }

    let average = TemperatureAverage {
      average: acc.sum / acc.count as f64,
      sample_count: acc.count,
      interval_end,
    };
    *acc = Accumulator::default();

    deliver(self.subscriber.as_ref(), &MatchPayload::Monitor(average.clone()));
    Some(average)
  }
}

impl Detector for PeriodicAverageAggregator {
  fn name(&self) -> &str {
    &self.name
  }

  fn on_event(&self, event: &TemperatureEvent) -> Result<(), EngineError> {
    require_finite(&self.name, event)?;

    let mut acc = self.acc.lock().unwrap_or_else(PoisonError::into_inner);
    let sum = acc.sum + event.temperature;
    if !sum.is_finite() {
      return Err(EngineError::evaluation(&self.name, "running sum overflowed"));
    }
    acc.sum = sum;
    acc.count += 1;
    Ok(())
  }

  fn tick_period(&self) -> Option<Duration> {
    Some(self.interval)
  }

  fn on_tick(&self, at: DateTime<Utc>) -> Result<(), EngineError> {
    self.flush(at);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::subscriber::MemorySubscriber;
  use chrono::TimeZone;

  fn ts(sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, sec).unwrap()
  }

  fn aggregator() -> (Arc<MemorySubscriber>, PeriodicAverageAggregator) {
    let sink = Arc::new(MemorySubscriber::new("monitor"));
    let agg = PeriodicAverageAggregator::from_secs(10.0, sink.clone()).unwrap();
    (sink, agg)
  }

  #[test]
  fn flush_reports_mean_and_count() {
    let (sink, agg) = aggregator();
    for (i, v) in [10.0, 20.0, 30.0].iter().enumerate() {
      agg.on_event(&TemperatureEvent::new(*v, ts(i as u32))).unwrap();
    }

    let avg = agg.flush(ts(10)).unwrap();
    assert!((avg.average - 20.0).abs() < f64::EPSILON);
    assert_eq!(avg.sample_count, 3);
    assert_eq!(avg.interval_end, ts(10));
    assert_eq!(sink.payloads(), vec![MatchPayload::Monitor(avg)]);
  }

  #[test]
  fn empty_interval_emits_nothing() {
    let (sink, agg) = aggregator();
    assert!(agg.flush(ts(10)).is_none());
    agg.on_tick(ts(20)).unwrap();
    assert!(sink.is_empty());
  }

  #[test]
  fn flush_resets_the_interval() {
    let (sink, agg) = aggregator();
    agg.on_event(&TemperatureEvent::new(10.0, ts(1))).unwrap();
    agg.flush(ts(10)).unwrap();
    assert!(agg.flush(ts(20)).is_none());

    agg.on_event(&TemperatureEvent::new(40.0, ts(21))).unwrap();
    let avg = agg.flush(ts(30)).unwrap();
    assert_eq!(avg.sample_count, 1);
    assert!((avg.average - 40.0).abs() < f64::EPSILON);
    assert_eq!(sink.len(), 2);
  }

  #[test]
  fn overflow_is_rejected_without_corrupting_the_sum() {
    let (_sink, agg) = aggregator();
    agg.on_event(&TemperatureEvent::new(f64::MAX, ts(1))).unwrap();
    let err = agg.on_event(&TemperatureEvent::new(f64::MAX, ts(2))).unwrap_err();
    assert!(matches!(err, EngineError::DetectorEvaluation { .. }));

    let avg = agg.flush(ts(10)).unwrap();
    assert_eq!(avg.sample_count, 1);
    assert_eq!(avg.average, f64::MAX);
  }

  #[test]
  fn exposes_its_tick_period() {
    let (_sink, agg) = aggregator();
    assert_eq!(agg.tick_period(), Some(Duration::from_secs(10)));
    assert_eq!(agg.interval(), Duration::from_secs(10));
    let sink: Arc<dyn Subscriber> = Arc::new(MemorySubscriber::new("monitor"));
    assert!(PeriodicAverageAggregator::new(Duration::ZERO, sink.clone()).is_err());
    assert!(PeriodicAverageAggregator::new(Duration::from_secs(u64::MAX), sink).is_err());
  }
}
