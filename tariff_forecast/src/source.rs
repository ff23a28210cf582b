//! Injectable data sources
//!
//! A [`TradeDataSource`] hands over already-shaped trade and tariff records.
//! Where those come from (a remote indicator API, files, a test fixture) is
//! the implementor's business. Retry with exponential backoff and a minimum
//! spacing between calls are applied by wrapping any source in a
//! [`ThrottledSource`].

use crate::config::SourceConfig;
use crate::data::{TariffRecord, TradeRecord};
use crate::error::{ForecastError, Result};
use std::cell::Cell;
use std::fmt::Debug;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A source's answer: either data or a definite "nothing available"
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData<T> {
    Available(T),
    Empty,
}

impl<T> SourceData<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, SourceData::Empty)
    }

    /// Convert into a result, naming what was missing
    pub fn require(self, what: &str) -> Result<T> {
        match self {
            SourceData::Available(value) => Ok(value),
            SourceData::Empty => Err(ForecastError::DataUnavailable(what.to_string())),
        }
    }
}

/// Supplier of historical trade and tariff records
pub trait TradeDataSource {
    fn trade_records(&self) -> Result<SourceData<Vec<TradeRecord>>>;

    fn tariff_records(&self) -> Result<SourceData<Vec<TariffRecord>>>;
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    trade: Vec<TradeRecord>,
    tariffs: Vec<TariffRecord>,
}

impl StaticSource {
    pub fn new(trade: Vec<TradeRecord>, tariffs: Vec<TariffRecord>) -> Self {
        Self { trade, tariffs }
    }
}

impl TradeDataSource for StaticSource {
    fn trade_records(&self) -> Result<SourceData<Vec<TradeRecord>>> {
        if self.trade.is_empty() {
            return Ok(SourceData::Empty);
        }
        Ok(SourceData::Available(self.trade.clone()))
    }

    fn tariff_records(&self) -> Result<SourceData<Vec<TariffRecord>>> {
        if self.tariffs.is_empty() {
            return Ok(SourceData::Empty);
        }
        Ok(SourceData::Available(self.tariffs.clone()))
    }
}

/// Pause strategy, injectable so tests don't sleep
pub trait Sleeper: Debug {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Retry and pacing policy for source calls
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    pub min_call_interval: Duration,
}

impl SourcePolicy {
    /// Backoff before retry number `retry` (1-based), capped at `max_backoff`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl From<&SourceConfig> for SourcePolicy {
    fn from(config: &SourceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            min_call_interval: Duration::from_millis(config.min_call_interval_ms),
        }
    }
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self::from(&SourceConfig::default())
    }
}

/// Wraps a source with retries on transient failures and call pacing
#[derive(Debug)]
pub struct ThrottledSource<S, Z = ThreadSleeper> {
    inner: S,
    policy: SourcePolicy,
    sleeper: Z,
    last_call: Cell<Option<Instant>>,
}

impl<S: TradeDataSource> ThrottledSource<S, ThreadSleeper> {
    pub fn new(inner: S, policy: SourcePolicy) -> Self {
        Self::with_sleeper(inner, policy, ThreadSleeper)
    }
}

impl<S: TradeDataSource, Z: Sleeper> ThrottledSource<S, Z> {
    pub fn with_sleeper(inner: S, policy: SourcePolicy, sleeper: Z) -> Self {
        Self {
            inner,
            policy,
            sleeper,
            last_call: Cell::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    fn pace(&self) {
        if let Some(last) = self.last_call.get() {
            let elapsed = last.elapsed();
            if elapsed < self.policy.min_call_interval {
                self.sleeper.sleep(self.policy.min_call_interval - elapsed);
            }
        }
        self.last_call.set(Some(Instant::now()));
    }

    fn call<T>(&self, what: &str, op: impl Fn(&S) -> Result<T>) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.pace();
            match op(&self.inner) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt <= self.policy.max_retries => {
                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        source = what,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "transient source failure; retrying"
                    );
                    self.sleeper.sleep(backoff);
                }
                Err(err) if err.is_transient() => {
                    return Err(ForecastError::Source {
                        attempts: attempt,
                        message: err.to_string(),
                    })
                }
                Err(err) => {
                    debug!(source = what, error = %err, "non-transient source failure");
                    return Err(err);
                }
            }
        }
    }
}

impl<S: TradeDataSource, Z: Sleeper> TradeDataSource for ThrottledSource<S, Z> {
    fn trade_records(&self) -> Result<SourceData<Vec<TradeRecord>>> {
        self.call("trade", |s| s.trade_records())
    }

    fn tariff_records(&self) -> Result<SourceData<Vec<TariffRecord>>> {
        self.call("tariff", |s| s.tariff_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct RecordingSleeper {
        naps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.naps.borrow_mut().push(duration);
        }
    }

    #[derive(Debug)]
    struct FlakySource {
        failures_left: Cell<u32>,
        calls: Cell<u32>,
    }

    impl FlakySource {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: Cell::new(times),
                calls: Cell::new(0),
            }
        }
    }

    impl TradeDataSource for FlakySource {
        fn trade_records(&self) -> Result<SourceData<Vec<TradeRecord>>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(ForecastError::Transient("503 from upstream".to_string()));
            }
            Ok(SourceData::Available(vec![TradeRecord::new("China", 2020, Some(1.0), None)]))
        }

        fn tariff_records(&self) -> Result<SourceData<Vec<TariffRecord>>> {
            Err(ForecastError::malformed("China", "tariff_current_rate", "not a number"))
        }
    }

    fn policy(max_retries: u32) -> SourcePolicy {
        SourcePolicy {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(1),
            min_call_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let p = policy(3);
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(5), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_capped_for_long_retry_runs() {
        let p = SourcePolicy::from(&SourceConfig {
            max_retries: 100,
            ..SourceConfig::default()
        });
        assert_eq!(p.backoff(80), Duration::from_secs(30));
        assert_eq!(p.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let source = ThrottledSource::with_sleeper(
            FlakySource::failing(2),
            policy(3),
            RecordingSleeper::default(),
        );

        let data = source.trade_records().unwrap();
        assert!(!data.is_empty());
        assert_eq!(source.inner().calls.get(), 3);
        assert_eq!(
            *source.sleeper().naps.borrow(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn test_retries_exhausted() {
        let source = ThrottledSource::with_sleeper(
            FlakySource::failing(5),
            policy(1),
            RecordingSleeper::default(),
        );

        match source.trade_records() {
            Err(ForecastError::Source { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("Expected Source error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_transient_failure_is_not_retried() {
        let source = ThrottledSource::with_sleeper(
            FlakySource::failing(0),
            policy(3),
            RecordingSleeper::default(),
        );

        let result = source.tariff_records();
        assert!(matches!(result, Err(ForecastError::MalformedInput { .. })));
        assert!(source.sleeper().naps.borrow().is_empty());
    }

    #[test]
    fn test_calls_are_paced() {
        let mut p = policy(0);
        p.min_call_interval = Duration::from_secs(60);
        let source = ThrottledSource::with_sleeper(
            FlakySource::failing(0),
            p,
            RecordingSleeper::default(),
        );

        source.trade_records().unwrap();
        source.trade_records().unwrap();

        let naps = source.sleeper().naps.borrow();
        assert_eq!(naps.len(), 1);
        assert!(naps[0] > Duration::from_secs(59) && naps[0] <= Duration::from_secs(60));
    }

    #[test]
    fn test_static_source_reports_empty() {
        let source = StaticSource::default();
        assert_eq!(source.trade_records().unwrap(), SourceData::Empty);
        assert!(matches!(
            source.tariff_records().unwrap().require("tariffs"),
            Err(ForecastError::DataUnavailable(_))
        ));
    }
}
