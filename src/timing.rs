//! Accumulating named timers.
//!
//! A [`TimingInstrument`] keeps one [`TimingInfo`] per id, in the order ids were
//! first recorded. Runs collect into a [`TimingReport`], whose `Display` output
//! is the printed timing summary:
//!
//! ```text
//! Timing: Activation Operator CPU (1,1,28,28)
//!   Forward      10 calls  total 0.412 ms  avg 0.041 ms  min 0.033 ms  max 0.079 ms
//! ```

use core::fmt;
use std::time::{Duration, Instant};

use log::warn;

use crate::tensors::Shape;

/// Statistics of one timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingInfo {
    pub name: String,
    pub calls: u32,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimingInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            calls: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    /// Mean duration per call, zero when never called.
    #[must_use]
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls
        }
    }
}

/// Named timers accumulated over repeated calls.
#[derive(Debug, Default)]
pub struct TimingInstrument {
    entries: Vec<TimingInfo>,
    running: Vec<(String, Instant)>,
}

impl TimingInstrument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f`, adding its wall time to `id`.
    pub fn time<R>(&mut self, id: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.record(id, start.elapsed());
        out
    }

    /// Starts (or restarts) the timer `id`.
    pub fn start(&mut self, id: &str) {
        let now = Instant::now();
        match self.running.iter_mut().find(|(name, _)| name == id) {
            Some((_, started)) => *started = now,
            None => self.running.push((id.to_owned(), now)),
        }
    }

    /// Stops the timer `id` and records the elapsed time.
    ///
    /// Returns `None`, recording nothing, if `id` was not started.
    pub fn stop(&mut self, id: &str) -> Option<Duration> {
        let Some(pos) = self.running.iter().position(|(name, _)| name == id) else {
            warn!("timer `{id}` stopped without being started");
            return None;
        };
        let (_, started) = self.running.swap_remove(pos);
        let elapsed = started.elapsed();
        self.record(id, elapsed);
        Some(elapsed)
    }

    /// Adds one call of `elapsed` to `id`.
    pub fn record(&mut self, id: &str, elapsed: Duration) {
        match self.entries.iter_mut().find(|info| info.name == id) {
            Some(info) => info.record(elapsed),
            None => {
                let mut info = TimingInfo::new(id);
                info.record(elapsed);
                self.entries.push(info);
            }
        }
    }

    #[must_use]
    pub fn info(&self, id: &str) -> Option<&TimingInfo> {
        self.entries.iter().find(|info| info.name == id)
    }

    /// Every timer, in first-use order.
    #[must_use]
    pub fn entries(&self) -> &[TimingInfo] {
        &self.entries
    }

    /// Forgets all recorded and running timers.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.running.clear();
    }

    /// Snapshot of the current entries under `label`.
    #[must_use]
    pub fn report(&self, label: &str, shapes: &[Shape]) -> TimingReport {
        TimingReport {
            label: label.to_owned(),
            shapes: shapes.to_vec(),
            entries: self.entries.clone(),
        }
    }
}

/// Timing statistics of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub label: String,
    pub shapes: Vec<Shape>,
    pub entries: Vec<TimingInfo>,
}

impl TimingReport {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TimingInfo> {
        self.entries.iter().find(|info| info.name == id)
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timing: {}", self.label)?;
        for shape in &self.shapes {
            write!(f, " {shape}")?;
        }
        for info in &self.entries {
            write!(
                f,
                "\n  {:<10} {:>4} calls  total {:.3} ms  avg {:.3} ms  min {:.3} ms  max {:.3} ms",
                info.name,
                info.calls,
                millis(info.total),
                millis(info.average()),
                millis(info.min),
                millis(info.max),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_per_id_in_first_use_order() {
        let mut t = TimingInstrument::new();
        t.record("Forward", Duration::from_millis(3));
        t.record("Backward", Duration::from_millis(5));
        t.record("Forward", Duration::from_millis(1));

        let names: Vec<_> = t.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Forward", "Backward"]);

        let fwd = t.info("Forward").unwrap();
        assert_eq!(fwd.calls, 2);
        assert_eq!(fwd.total, Duration::from_millis(4));
        assert_eq!(fwd.min, Duration::from_millis(1));
        assert_eq!(fwd.max, Duration::from_millis(3));
        assert_eq!(fwd.average(), Duration::from_millis(2));
    }

    #[test]
    fn time_and_start_stop() {
        let mut t = TimingInstrument::new();
        assert_eq!(t.time("Forward", || 7), 7);
        assert!(t.stop("Backward").is_none());
        assert!(t.info("Backward").is_none());

        t.start("Backward");
        assert!(t.stop("Backward").is_some());
        assert!(t.stop("Backward").is_none());
        assert_eq!(t.info("Backward").unwrap().calls, 1);

        t.clear();
        assert!(t.entries().is_empty());
    }

    #[test]
    fn report_formatting() {
        let mut t = TimingInstrument::new();
        t.record("Forward", Duration::from_micros(1500));
        t.record("Forward", Duration::from_micros(500));
        let report = t.report("Activation Operator CPU", &[Shape::from([1, 1, 28, 28])]);
        assert_eq!(
            report.to_string(),
            "Timing: Activation Operator CPU (1,1,28,28)\n  \
             Forward       2 calls  total 2.000 ms  avg 1.000 ms  min 0.500 ms  max 1.500 ms"
        );
        assert_eq!(report.get("Forward").unwrap().calls, 2);
    }
}
