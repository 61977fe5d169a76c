//! Replicated measurement of a single query
//!
//! A cell is measured by issuing the same query `R` times, strictly one after
//! another, and folding each successful replication into running sums. A
//! failed replication (engine error, mid-stream error, timeout) is logged and
//! dropped from *every* accumulator. Means divide by the number of successful
//! replications, never by `R`.

mod statistics;

pub use statistics::{ArrivalPoint, CellStatistics, RawSample};

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::engine::{QueryEngine, ResultStream};
use crate::sweep::Cell;
use crate::{Error, Result};
use statistics::Accumulator;

/// Settings for replicated measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureOptions {
    /// Replications per cell
    pub replications: usize,
    /// Keep every result's arrival offset, not only the first
    pub record_arrivals: bool,
    /// Per-replication time budget; expiry counts as a failed replication
    pub timeout: Option<Duration>,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            replications: 5,
            record_arrivals: false,
            timeout: None,
        }
    }
}

/// Runs one query `R` times against an engine and aggregates the timings.
#[derive(Debug)]
pub struct Measurer<E> {
    engine: E,
    options: MeasureOptions,
}

impl<E: QueryEngine> Measurer<E> {
    /// Create a measurer.
    #[must_use]
    pub const fn new(engine: E, options: MeasureOptions) -> Self {
        Self { engine, options }
    }

    /// The wrapped engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Measurement settings.
    #[must_use]
    pub const fn options(&self) -> MeasureOptions {
        self.options
    }

    /// Measure `query` for `cell`.
    ///
    /// # Errors
    ///
    /// Returns `AllReplicationsFailed` if no replication succeeded.
    pub async fn measure(&self, cell: &Cell, query: &str) -> Result<CellStatistics> {
        let mut accumulator = Accumulator::default();
        for replication in 1..=self.options.replications {
            match self.replicate(query).await {
                Ok(sample) => {
                    debug!(
                        %cell,
                        replication,
                        micros = sample.total_duration_micros,
                        results = sample.result_count,
                        "replication done"
                    );
                    accumulator.add(&sample);
                }
                Err(e) => {
                    warn!(%cell, replication, error = %e, "replication dropped");
                }
            }
        }

        accumulator
            .finish()
            .ok_or_else(|| Error::AllReplicationsFailed {
                query: cell.query,
                context: cell.context.to_string(),
                attempts: self.options.replications,
            })
    }

    /// One replication, with the timeout applied if configured.
    ///
    /// # Errors
    ///
    /// Returns `ReplicationFailed` wrapping the underlying cause.
    pub async fn replicate(&self, query: &str) -> Result<RawSample> {
        let outcome = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run_once(query)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout(limit)),
            },
            None => self.run_once(query).await,
        };
        outcome.map_err(|e| Error::ReplicationFailed(e.to_string()))
    }

    async fn run_once(&self, query: &str) -> Result<RawSample> {
        let start = Instant::now();
        let mut stream = self.engine.execute(query).await?;

        let mut result_count: u64 = 0;
        let mut first_result_micros = None;
        let mut arrival_micros = Vec::new();
        while let Some(result) = stream.next_result().await {
            result?;
            let offset = elapsed_micros(start);
            result_count += 1;
            first_result_micros.get_or_insert(offset);
            if self.options.record_arrivals {
                arrival_micros.push(offset);
            }
        }

        Ok(RawSample {
            total_duration_micros: elapsed_micros(start),
            first_result_micros,
            result_count,
            arrival_micros,
        })
    }
}

fn elapsed_micros(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Replication, ScriptedEngine};

    fn options(replications: usize) -> MeasureOptions {
        MeasureOptions {
            replications,
            ..MeasureOptions::default()
        }
    }

    #[tokio::test]
    async fn test_counts_over_three_replications() {
        let engine = ScriptedEngine::new(vec![
            Replication::Results(2),
            Replication::Results(4),
            Replication::Results(6),
        ]);
        let measurer = Measurer::new(engine, options(3));

        let stats = measurer.measure(&Cell::vq(0), "q").await.unwrap();
        assert_eq!(stats.replications, 3);
        assert_eq!(stats.mean_result_count, 4.0);
        assert_eq!(measurer.engine().calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_replication_is_excluded() {
        let engine = ScriptedEngine::new(vec![
            Replication::Results(10),
            Replication::Results(10),
            Replication::FailAfter(1000),
            Replication::Results(10),
            Replication::Results(10),
        ]);
        let measurer = Measurer::new(engine, options(5));

        let stats = measurer.measure(&Cell::vm(0, 0), "q").await.unwrap();
        assert_eq!(stats.replications, 4);
        assert_eq!(stats.mean_result_count, 10.0);
    }

    #[tokio::test]
    async fn test_all_replications_failed() {
        let engine = ScriptedEngine::new(vec![Replication::Reject]);
        let measurer = Measurer::new(engine, options(5));

        let err = measurer.measure(&Cell::dm(1, 0, 2), "q").await.unwrap_err();
        assert!(matches!(
            err,
            Error::AllReplicationsFailed { query: 1, attempts: 5, .. }
        ));
        assert_eq!(measurer.engine().calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_offsets_follow_engine_pace() {
        let engine = ScriptedEngine::constant(3).with_delay(Duration::from_millis(10));
        let measurer = Measurer::new(
            engine,
            MeasureOptions {
                replications: 2,
                record_arrivals: true,
                timeout: None,
            },
        );

        let stats = measurer.measure(&Cell::vm(0, 1), "q").await.unwrap();
        let first = stats.mean_first_result_micros.unwrap();
        assert!((10_000.0..11_000.0).contains(&first), "first result at {first}");
        assert!((30_000.0..33_000.0).contains(&stats.mean_duration_micros));
        assert_eq!(stats.arrivals.len(), 3);
        assert!(stats.arrivals.windows(2).all(|w| w[0].mean_micros < w[1].mean_micros));
        assert!(stats.arrivals.iter().all(|p| p.samples == 2));
        let throughput = stats.throughput.unwrap();
        assert!((90.0..101.0).contains(&throughput), "throughput {throughput}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrivals_not_recorded_by_default() {
        let engine = ScriptedEngine::constant(3).with_delay(Duration::from_millis(1));
        let measurer = Measurer::new(engine, options(1));

        let stats = measurer.measure(&Cell::vq(0), "q").await.unwrap();
        assert!(stats.arrivals.is_empty());
        assert!(stats.mean_first_result_micros.unwrap() >= 1_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let engine = ScriptedEngine::constant(100).with_delay(Duration::from_millis(10));
        let measurer = Measurer::new(
            engine,
            MeasureOptions {
                replications: 2,
                record_arrivals: false,
                timeout: Some(Duration::from_millis(50)),
            },
        );

        let err = measurer.replicate("q").await.unwrap_err();
        assert!(matches!(err, Error::ReplicationFailed(_)));
        assert!(measurer.measure(&Cell::vq(0), "q").await.is_err());
    }
}
