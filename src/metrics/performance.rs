//! Timing and throughput of the training phases
//!
//! Each phase of an epoch is timed with a [`PhaseTimer`] and recorded together
//! with the number of operations it performed (environment steps, gradient
//! steps), which gives an operations-per-second rate for the epoch log.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timed phases of an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimingKey {
    /// Environment interaction and buffer writes
    Rollout,
    /// Policy and value gradient steps
    Update,
    /// Checkpoint write
    Checkpoint,
}

impl TimingKey {
    /// Get a human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            TimingKey::Rollout => "Rollout",
            TimingKey::Update => "Update",
            TimingKey::Checkpoint => "Checkpoint",
        }
    }
}

/// Accumulated measurements for one phase
#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    count: usize,
    operations: u64,
    total_time: Duration,
    last_time: Duration,
    last_operations: u64,
}

impl TimingStats {
    fn record(&mut self, duration: Duration, operations: u64) {
        self.count += 1;
        self.operations += operations;
        self.total_time += duration;
        self.last_time = duration;
        self.last_operations = operations;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Operations per second over the most recent measurement
    pub fn last_rate(&self) -> f64 {
        rate(self.last_operations, self.last_time)
    }

    /// Operations per second over all measurements
    pub fn overall_rate(&self) -> f64 {
        rate(self.operations, self.total_time)
    }
}

fn rate(operations: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        0.0
    } else {
        operations as f64 / secs
    }
}

/// Running timer for one phase; hand it back to [`PerformanceMetrics::finish`]
#[derive(Debug)]
pub struct PhaseTimer {
    key: TimingKey,
    start: Instant,
}

/// Performance metrics tracker
///
/// ```rust
/// use survaillant_ppo::metrics::{PerformanceMetrics, TimingKey};
///
/// let mut perf = PerformanceMetrics::new();
/// let timer = perf.start(TimingKey::Rollout);
/// // ... 4000 environment steps ...
/// perf.finish(timer, 4000);
///
/// assert_eq!(perf.get_stats(TimingKey::Rollout).unwrap().count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    stats: HashMap<TimingKey, TimingStats>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, key: TimingKey) -> PhaseTimer {
        PhaseTimer {
            key,
            start: Instant::now(),
        }
    }

    /// Stop `timer` and record `operations` against its phase
    pub fn finish(&mut self, timer: PhaseTimer, operations: u64) -> Duration {
        let elapsed = timer.start.elapsed();
        self.record(timer.key, elapsed, operations);
        elapsed
    }

    /// Record a timing measurement manually
    pub fn record(&mut self, key: TimingKey, duration: Duration, operations: u64) {
        self.stats.entry(key).or_default().record(duration, operations);
    }

    pub fn get_stats(&self, key: TimingKey) -> Option<&TimingStats> {
        self.stats.get(&key)
    }

    /// Most recent rate of a phase, 0 if never measured
    pub fn last_rate(&self, key: TimingKey) -> f64 {
        self.stats.get(&key).map(TimingStats::last_rate).unwrap_or(0.0)
    }

    /// Compact multi-line summary of every measured phase
    ///
    /// ```text
    /// Performance:
    ///   Rollout:    total=7m01s    (9.5/s)
    ///   Update:     total=1m12s    (4.4/s)
    /// ```
    pub fn format_summary(&self) -> String {
        if self.stats.is_empty() {
            return String::from("Performance: No data collected yet");
        }

        let mut lines = vec![String::from("Performance:")];
        let mut keys: Vec<_> = self.stats.keys().copied().collect();
        keys.sort();

        for key in keys {
            if let Some(stats) = self.stats.get(&key) {
                lines.push(format!(
                    "  {:<12} total={:<9} ({:.1}/s)",
                    format!("{}:", key.name()),
                    Self::format_duration_long(stats.total_time),
                    stats.overall_rate()
                ));
            }
        }

        lines.join("\n")
    }

    /// Format duration in long form (e.g., "7m01s", "2h15m")
    fn format_duration_long(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        if total_secs < 60 {
            format!("{:.1}s", duration.as_secs_f64())
        } else if total_secs < 3600 {
            format!("{}m{:02}s", total_secs / 60, total_secs % 60)
        } else {
            format!("{}h{:02}m", total_secs / 3600, (total_secs % 3600) / 60)
        }
    }
}
