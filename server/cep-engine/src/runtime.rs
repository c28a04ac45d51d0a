//! Runtime: owns the detectors, dispatches events to them in registration
//! order, and drives the timer of every time-driven detector.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregate::PeriodicAverageAggregator;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::detector::Detector;
use crate::error::EngineError;
use crate::escalation::CriticalEscalationDetector;
use crate::subscriber::{panic_message, Subscriber};
use crate::threshold::ConsecutiveThresholdDetector;
use crate::types::TemperatureEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
  Idle,
  Running,
  Stopped,
}

/// One subscriber per standard detector.
#[derive(Clone)]
pub struct StandardSubscribers {
  pub critical: Arc<dyn Subscriber>,
  pub warning: Arc<dyn Subscriber>,
  pub monitor: Arc<dyn Subscriber>,
}

struct Ticker {
  detector: String,
  shutdown: watch::Sender<bool>,
  handle: JoinHandle<()>,
}

/// The continuous-query engine handle.
///
/// Register detectors while idle, then share it (e.g. behind an `Arc`) with
/// producer threads. Per-detector state is guarded by each detector; the
/// runtime only serializes lifecycle transitions against in-flight work.
pub struct Runtime {
  detectors: Vec<Arc<dyn Detector>>,
  clock: Arc<dyn Clock>,
  state: Arc<RwLock<Lifecycle>>,
  tickers: Mutex<Vec<Ticker>>,
}

impl Runtime {
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self {
      detectors: Vec::new(),
      clock,
      state: Arc::new(RwLock::new(Lifecycle::Idle)),
      tickers: Mutex::new(Vec::new()),
    }
  }

  /// Wire the three standard detectors: critical, warning, monitor.
  ///
  /// Any invalid tunable fails here; no partially configured runtime is returned.
  pub fn standard(
    config: &EngineConfig,
    subscribers: StandardSubscribers,
    clock: Arc<dyn Clock>,
  ) -> Result<Self, EngineError> {
    config.validate()?;

    let critical = CriticalEscalationDetector::new(
      config.escalation_window,
      config.escalation_multiplier,
      subscribers.critical,
    )?;
    let warning = ConsecutiveThresholdDetector::new(config.warning_threshold, subscribers.warning)?;
    let monitor = PeriodicAverageAggregator::new(config.monitor_interval()?, subscribers.monitor)?;

    let mut runtime = Self::new(clock);
    runtime.register(Arc::new(critical))?;
    runtime.register(Arc::new(warning))?;
    runtime.register(Arc::new(monitor))?;
    Ok(runtime)
  }

  /// Append a detector to the dispatch order. Only allowed before `start`.
  pub fn register(&mut self, detector: Arc<dyn Detector>) -> Result<(), EngineError> {
    if self.lifecycle() != Lifecycle::Idle {
      return Err(EngineError::RegistrationClosed);
    }
    debug!(detector = detector.name(), position = self.detectors.len(), "registered detector");
    self.detectors.push(detector);
    Ok(())
  }

  pub fn detector_names(&self) -> Vec<&str> {
    self.detectors.iter().map(|d| d.name()).collect()
  }

  pub fn is_running(&self) -> bool {
    self.lifecycle() == Lifecycle::Running
  }

  /// Arm one timer per time-driven detector and begin accepting events.
  pub fn start(&self) -> Result<(), EngineError> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    match *state {
      Lifecycle::Running => return Err(EngineError::AlreadyStarted),
      Lifecycle::Stopped => return Err(EngineError::EngineStopped),
      Lifecycle::Idle => {}
    }

    let mut tickers = Vec::new();
    for detector in &self.detectors {
      let Some(period) = detector.tick_period() else {
        continue;
      };
      match spawn_ticker(
        Arc::clone(detector),
        period,
        Arc::clone(&self.clock),
        Arc::clone(&self.state),
      ) {
        Ok(ticker) => tickers.push(ticker),
        Err(e) => {
          // Armed timers may be waiting on the state lock.
          drop(state);
          stop_tickers(tickers);
          return Err(e);
        }
      }
    }

    info!(
      detectors = self.detectors.len(),
      timers = tickers.len(),
      "engine started"
    );
    *self.tickers.lock().unwrap_or_else(PoisonError::into_inner) = tickers;
    *state = Lifecycle::Running;
    Ok(())
  }

  /// Deliver `event` to every detector in registration order.
  ///
  /// A detector that errors or panics is logged and skipped; the remaining
  /// detectors still see the event.
  pub fn submit(&self, event: &TemperatureEvent) -> Result<(), EngineError> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    match *state {
      Lifecycle::Idle => return Err(EngineError::NotStarted),
      Lifecycle::Stopped => return Err(EngineError::EngineStopped),
      Lifecycle::Running => {}
    }

    debug!(%event, "dispatch");
    for detector in &self.detectors {
      guarded(detector.as_ref(), "event", || detector.on_event(event));
    }
    Ok(())
  }

  /// Run one tick of every time-driven detector on the calling thread,
  /// stamped with the runtime's clock.
  pub fn tick(&self) -> Result<(), EngineError> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    match *state {
      Lifecycle::Idle => return Err(EngineError::NotStarted),
      Lifecycle::Stopped => return Err(EngineError::EngineStopped),
      Lifecycle::Running => {}
    }

    let at = self.clock.now();
    for detector in self.detectors.iter().filter(|d| d.tick_period().is_some()) {
      guarded(detector.as_ref(), "tick", || detector.on_tick(at));
    }
    Ok(())
  }

  /// Stop accepting events and cancel all timers. Idempotent.
  ///
  /// Waits for in-flight submissions and ticks to finish, so it must not be
  /// called from inside a subscriber.
  pub fn shutdown(&self) {
    {
      let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
      if *state == Lifecycle::Stopped {
        return;
      }
      *state = Lifecycle::Stopped;
    }

    let tickers = std::mem::take(&mut *self.tickers.lock().unwrap_or_else(PoisonError::into_inner));
    stop_tickers(tickers);
    info!("engine stopped");
  }

  fn lifecycle(&self) -> Lifecycle {
    *self.state.read().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for Runtime {
  fn drop(&mut self) {
    self.shutdown();
  }
}

/// Per-detector failure boundary: errors and panics are logged, never propagated.
fn guarded(detector: &dyn Detector, stage: &str, f: impl FnOnce() -> Result<(), EngineError>) {
  let err = match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(())) => return,
    Ok(Err(e)) => e,
    Err(panic) => EngineError::evaluation(detector.name(), panic_message(panic.as_ref())),
  };
  warn!(detector = detector.name(), stage, error = %err, "detector failed; isolated");
}

fn tick_once(detector: &dyn Detector, clock: &dyn Clock, state: &RwLock<Lifecycle>) {
  let state = state.read().unwrap_or_else(PoisonError::into_inner);
  if *state != Lifecycle::Running {
    // Shutdown has begun.
    return;
  }
  guarded(detector, "tick", || detector.on_tick(clock.now()));
}

fn spawn_ticker(
  detector: Arc<dyn Detector>,
  period: Duration,
  clock: Arc<dyn Clock>,
  state: Arc<RwLock<Lifecycle>>,
) -> Result<Ticker, EngineError> {
  let name = detector.name().to_string();
  let first_tick = time::Instant::now().checked_add(period).ok_or_else(|| {
    EngineError::configuration(
      "tick_period",
      format!("{} period {:?} is out of range", name, period),
    )
  })?;
  let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_time()
    .build()?;

  let handle = thread::Builder::new()
    .name(format!("tick-{}", name))
    .spawn(move || {
      rt.block_on(async move {
        let mut interval = time::interval_at(first_tick, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
          tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
              if changed.is_err() || *shutdown_rx.borrow() {
                break;
              }
            }
            _ = interval.tick() => {
              tick_once(detector.as_ref(), clock.as_ref(), &state);
            }
          }
        }
      });
    })?;

  debug!(detector = %name, period_ms = period.as_millis() as u64, "timer armed");
  Ok(Ticker {
    detector: name,
    shutdown: shutdown_tx,
    handle,
  })
}

fn stop_tickers(tickers: Vec<Ticker>) {
  for ticker in tickers {
    let _ = ticker.shutdown.send(true);
    if ticker.handle.join().is_err() {
      warn!(detector = %ticker.detector, "timer thread panicked");
    } else {
      debug!(detector = %ticker.detector, "timer cancelled");
    }
  }
}
