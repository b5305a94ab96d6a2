//! Per-round records and the final run report.
use crate::error::CycleError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The states a round moves through, in order.
///
/// A round that fails stops in the phase that produced the error; there is
/// no separate `Failed` value because the failing phase is what gets reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Probing,
    Sizing,
    Writing,
    Flushing,
    Verifying,
    Comparing,
    Cleaning,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Probing => "probing",
            Phase::Sizing => "sizing",
            Phase::Writing => "writing",
            Phase::Flushing => "flushing",
            Phase::Verifying => "verifying",
            Phase::Comparing => "comparing",
            Phase::Cleaning => "cleaning",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a round stopped.
#[derive(Debug)]
pub struct RoundFailure {
    pub phase: Phase,
    pub error: CycleError,
}

impl RoundFailure {
    pub(crate) fn new(error: CycleError) -> Self {
        Self {
            phase: error.phase(),
            error,
        }
    }
}

impl fmt::Display for RoundFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.phase, error_chain(&self.error))
    }
}

impl Serialize for RoundFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("RoundFailure", 2)?;
        s.serialize_field("phase", &self.phase)?;
        s.serialize_field("message", &error_chain(&self.error))?;
        s.end()
    }
}

/// Renders an error followed by each of its sources, `: `-separated.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// One write-verify-delete cycle against the target.
///
/// Created by the orchestrator when the round starts and filled in as each
/// phase completes. Once handed to [`RunReport`] it is never touched again.
#[derive(Debug, Serialize)]
pub struct TestRound {
    /// 1-based round index.
    pub index: u32,
    /// The test file written this round.
    pub file: PathBuf,
    /// Hex seed the payload was generated from.
    pub seed: String,
    /// Free bytes reported by the probe before sizing.
    pub available_bytes: Option<u64>,
    /// Bytes the round set out to write (free space minus reserve).
    pub target_bytes: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    /// Hex digest of the bytes handed to the writer.
    pub write_digest: Option<String>,
    /// Hex digest of the bytes read back from storage.
    pub verify_digest: Option<String>,
    /// Whether this round matched the baseline (round 1 always does once it
    /// completes its own comparison).
    pub baseline_consistent: bool,
    /// Read-back content that differed from round 1's. Set alongside
    /// `failure`, which may carry a more specific error.
    pub baseline_error: Option<String>,
    /// Target size minus round 1's, when the two differ.
    pub capacity_change: Option<i64>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    #[serde(with = "duration_secs")]
    pub write_elapsed: Duration,
    #[serde(with = "duration_secs")]
    pub verify_elapsed: Duration,
    pub failure: Option<RoundFailure>,
    /// Deletion problems are surfaced here and never replace `failure`.
    pub cleanup_error: Option<String>,
}

impl TestRound {
    pub(crate) fn new(index: u32, file: PathBuf, seed: String) -> Self {
        Self {
            index,
            file,
            seed,
            available_bytes: None,
            target_bytes: 0,
            bytes_written: 0,
            bytes_read: 0,
            write_digest: None,
            verify_digest: None,
            baseline_consistent: false,
            baseline_error: None,
            capacity_change: None,
            elapsed: Duration::ZERO,
            write_elapsed: Duration::ZERO,
            verify_elapsed: Duration::ZERO,
            failure: None,
            cleanup_error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Write throughput in bytes per second, if the write phase took any time.
    pub fn write_rate(&self) -> Option<f64> {
        rate(self.bytes_written, self.write_elapsed)
    }

    pub fn verify_rate(&self) -> Option<f64> {
        rate(self.bytes_read, self.verify_elapsed)
    }
}

fn rate(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| bytes as f64 / secs)
}

/// Ordered per-round results plus the overall verdict.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub target: PathBuf,
    pub rounds_requested: u32,
    pub rounds: Vec<TestRound>,
    /// Digest round 1 read back, once round 1 passed.
    pub baseline_digest: Option<String>,
    pub passed: bool,
}

impl RunReport {
    pub(crate) fn new(target: PathBuf, rounds_requested: u32) -> Self {
        Self {
            target,
            rounds_requested,
            rounds: Vec::new(),
            baseline_digest: None,
            passed: false,
        }
    }

    /// Seals the report. A run only passes if every requested round ran and
    /// none of them failed.
    pub(crate) fn finish(mut self) -> Self {
        self.passed = self.rounds.len() == self.rounds_requested as usize
            && self.rounds.iter().all(TestRound::passed);
        self
    }

    /// The round that stopped the run, if any.
    pub fn failed_round(&self) -> Option<&TestRound> {
        self.rounds.iter().find(|r| !r.passed())
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn round(index: u32) -> TestRound {
        TestRound::new(index, PathBuf::from("/mnt/usb/f.bin"), "00".into())
    }

    #[test]
    fn report_fails_when_rounds_are_missing() {
        let mut report = RunReport::new(PathBuf::from("/mnt/usb"), 3);
        report.rounds.push(round(1));
        report.rounds.push(round(2));
        let report = report.finish();
        assert!(!report.passed);
        assert!(report.failed_round().is_none());
    }

    #[test]
    fn report_fails_when_any_round_failed() {
        let mut report = RunReport::new(PathBuf::from("/mnt/usb"), 2);
        report.rounds.push(round(1));
        let mut second = round(2);
        second.failure = Some(RoundFailure::new(CycleError::DigestMismatch {
            round: 2,
            written: "aa".into(),
            verified: "bb".into(),
        }));
        report.rounds.push(second);
        let report = report.finish();
        assert!(!report.passed);
        assert_eq!(report.failed_round().map(|r| r.index), Some(2));
    }

    #[test]
    fn failure_message_includes_source_chain() {
        let failure = RoundFailure::new(CycleError::Flush {
            path: PathBuf::from("/mnt/usb/f.bin"),
            source: io::Error::other("device went away"),
        });
        assert_eq!(failure.phase, Phase::Flushing);
        let text = failure.to_string();
        assert!(text.starts_with("flushing failed"));
        assert!(text.ends_with("device went away"));
    }

    #[test]
    fn rate_needs_elapsed_time() {
        let mut r = round(1);
        r.bytes_written = 1000;
        assert_eq!(r.write_rate(), None);
        r.write_elapsed = Duration::from_secs(2);
        assert_eq!(r.write_rate(), Some(500.0));
    }
}
