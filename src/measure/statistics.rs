//! Replication samples and their aggregate statistics

use serde::{Deserialize, Serialize};

/// Raw measurement of one successful replication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Issue-to-completion wall-clock time
    pub total_duration_micros: u64,
    /// Offset of the first result, if any result arrived
    pub first_result_micros: Option<u64>,
    /// Number of results streamed
    pub result_count: u64,
    /// Arrival offset per result, in order (empty unless arrivals are recorded)
    pub arrival_micros: Vec<u64>,
}

impl RawSample {
    /// Sample of a replication that streamed `result_count` results.
    #[must_use]
    pub const fn new(total_duration_micros: u64, result_count: u64) -> Self {
        Self {
            total_duration_micros,
            first_result_micros: None,
            result_count,
            arrival_micros: Vec::new(),
        }
    }

    /// Attach per-result arrival offsets; the first one is also the first-result latency.
    #[must_use]
    pub fn with_arrivals(mut self, arrival_micros: Vec<u64>) -> Self {
        self.first_result_micros = arrival_micros.first().copied();
        self.arrival_micros = arrival_micros;
        self
    }
}

/// Mean arrival time of the n-th result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrivalPoint {
    /// Result ordinal, starting at 1
    pub ordinal: usize,
    /// Mean arrival offset over the replications that reached this ordinal
    pub mean_micros: f64,
    /// How many replications reached this ordinal
    pub samples: usize,
}

/// Aggregate over the successful replications of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellStatistics {
    /// Replications that contributed (failed ones are excluded everywhere)
    pub replications: usize,
    /// Mean issue-to-completion time
    pub mean_duration_micros: f64,
    /// Mean first-result latency over replications that produced a result
    pub mean_first_result_micros: Option<f64>,
    /// Exact arithmetic mean of the result counts
    pub mean_result_count: f64,
    /// Results per second; `None` when duration or result count is zero
    pub throughput: Option<f64>,
    /// Sparse per-ordinal arrival means
    pub arrivals: Vec<ArrivalPoint>,
}

impl CellStatistics {
    /// Aggregate samples.
    ///
    /// Returns `None` when there are no samples to aggregate.
    #[must_use]
    pub fn from_samples<'a, I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a RawSample>,
    {
        let mut accumulator = Accumulator::default();
        for sample in samples {
            accumulator.add(sample);
        }
        accumulator.finish()
    }
}

/// Running sums folded one replication at a time.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    replications: usize,
    duration_sum: u128,
    result_sum: u128,
    first_result_sum: u128,
    first_result_samples: usize,
    arrival_sums: Vec<(u128, usize)>,
}

impl Accumulator {
    pub(crate) fn add(&mut self, sample: &RawSample) {
        self.replications += 1;
        self.duration_sum += u128::from(sample.total_duration_micros);
        self.result_sum += u128::from(sample.result_count);
        if let Some(first) = sample.first_result_micros {
            self.first_result_sum += u128::from(first);
            self.first_result_samples += 1;
        }
        if self.arrival_sums.len() < sample.arrival_micros.len() {
            self.arrival_sums.resize(sample.arrival_micros.len(), (0, 0));
        }
        for (slot, micros) in self.arrival_sums.iter_mut().zip(&sample.arrival_micros) {
            slot.0 += u128::from(*micros);
            slot.1 += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(self) -> Option<CellStatistics> {
        if self.replications == 0 {
            return None;
        }
        let n = self.replications as f64;
        let mean_duration_micros = self.duration_sum as f64 / n;
        let mean_result_count = self.result_sum as f64 / n;
        let mean_first_result_micros = (self.first_result_samples > 0)
            .then(|| self.first_result_sum as f64 / self.first_result_samples as f64);
        let throughput = (mean_duration_micros > 0.0 && mean_result_count > 0.0)
            .then(|| mean_result_count / (mean_duration_micros / 1_000_000.0));
        let arrivals = self
            .arrival_sums
            .into_iter()
            .enumerate()
            .map(|(index, (sum, samples))| ArrivalPoint {
                ordinal: index + 1,
                mean_micros: sum as f64 / samples as f64,
                samples,
            })
            .collect();

        Some(CellStatistics {
            replications: self.replications,
            mean_duration_micros,
            mean_first_result_micros,
            mean_result_count,
            throughput,
            arrivals,
        })
    }
}
