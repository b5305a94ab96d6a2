//! Runs the configured number of write-verify rounds.
//!
//! Each round walks `Probing -> Sizing -> Writing -> Flushing -> Verifying ->
//! Comparing -> Cleaning -> Done`, strictly in order. The first failing round
//! ends the run.
use crate::config::CycleConfig;
use crate::digest::{DigestAccumulator, StreamDigest};
use crate::error::{ConfigError, CycleError, Result};
use crate::payload::PayloadGenerator;
use crate::probe::SpaceProbe;
use crate::progress::ProgressCounter;
use crate::read;
use crate::round::{Phase, RoundFailure, RunReport, TestRound, error_chain};
use crate::write::ChunkedWriter;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const WRITE_CHECK_FILE: &str = ".flashsoak_write_check";

/// Hooks for a front-end to follow a run. Every method defaults to doing
/// nothing.
pub trait CycleObserver {
    fn round_started(&mut self, _round: u32, _file: &Path) {}

    /// `total` is the byte count of the phase, or zero for phases that move
    /// no data.
    fn phase_started(&mut self, _round: u32, _phase: Phase, _total: u64) {}

    /// Bytes done so far in a writing or verifying phase.
    fn progress(&mut self, _round: u32, _phase: Phase, _bytes: u64) {}

    /// The file is on stable storage and about to be read back.
    fn file_committed(&mut self, _round: u32, _file: &Path) {}

    fn round_finished(&mut self, _round: &TestRound) {}
}

impl CycleObserver for () {}

/// What round 1 established for later rounds to match.
#[derive(Clone, Copy, Debug)]
struct Baseline {
    bytes: u64,
    digest: StreamDigest,
}

pub struct Orchestrator<P> {
    config: CycleConfig,
    probe: P,
    progress: ProgressCounter,
}

impl<P: SpaceProbe> Orchestrator<P> {
    pub fn new(config: CycleConfig, probe: P) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            probe,
            progress: ProgressCounter::new(),
        })
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// A handle on the byte counter of the phase in flight, for polling from
    /// another thread.
    pub fn progress(&self) -> ProgressCounter {
        self.progress.clone()
    }

    /// Runs every round, stopping at the first failure.
    pub fn run<O>(&self, observer: &mut O) -> RunReport
    where
        O: CycleObserver + ?Sized,
    {
        let seed = self.config.seed.resolve();
        info!(
            target_path = %self.config.target.display(),
            rounds = self.config.rounds,
            block_size = self.config.block_size,
            reserve = self.config.reserve,
            seed = %seed,
            "starting endurance run"
        );

        let mut report = RunReport::new(self.config.target.clone(), self.config.rounds);
        let mut generator = PayloadGenerator::new(seed, self.config.block_size);
        let mut baseline = None;

        for index in 1..=self.config.rounds {
            let round = self.run_round(index, &mut generator, &mut baseline, observer);
            let failed = !round.passed();
            observer.round_finished(&round);
            report.rounds.push(round);
            if failed {
                break;
            }
        }

        report.baseline_digest = baseline.map(|b| b.digest.to_hex());
        let report = report.finish();
        if report.passed {
            info!(rounds = report.rounds.len(), "all rounds passed");
        }
        report
    }

    fn run_round<O>(
        &self,
        index: u32,
        generator: &mut PayloadGenerator,
        baseline: &mut Option<Baseline>,
        observer: &mut O,
    ) -> TestRound
    where
        O: CycleObserver + ?Sized,
    {
        let started = Instant::now();
        let path = self.config.round_file(index);
        let mut round = TestRound::new(index, path.clone(), generator.seed().to_hex());
        observer.round_started(index, &path);
        info!(round = index, file = %path.display(), "round started");

        if let Err(e) = self.execute(&mut round, generator, baseline, observer) {
            error!(round = index, phase = %e.phase(), error = %error_chain(&e), "round failed");
            round.failure = Some(RoundFailure::new(e));
        }

        self.clean(&mut round, observer);
        round.elapsed = started.elapsed();

        if round.passed() {
            observer.phase_started(index, Phase::Done, 0);
            info!(
                round = index,
                target_bytes = round.target_bytes,
                digest = round.write_digest.as_deref().unwrap_or_default(),
                elapsed_secs = round.elapsed.as_secs_f64(),
                "round passed"
            );
        }
        round
    }

    fn execute<O>(
        &self,
        round: &mut TestRound,
        generator: &mut PayloadGenerator,
        baseline: &mut Option<Baseline>,
        observer: &mut O,
    ) -> Result<()>
    where
        O: CycleObserver + ?Sized,
    {
        let index = round.index;
        let path = round.file.clone();
        let target = &self.config.target;

        observer.phase_started(index, Phase::Probing, 0);
        remove_stale(&path);
        if index == 1 {
            check_writable(target)?;
        }
        let space = self.probe.probe(target)?;
        round.available_bytes = Some(space.available);

        observer.phase_started(index, Phase::Sizing, 0);
        if space.available <= self.config.reserve {
            return Err(CycleError::InsufficientSpace {
                path: target.clone(),
                available: space.available,
                reserve: self.config.reserve,
            });
        }
        let size = space.available - self.config.reserve;
        round.target_bytes = size;
        debug!(
            round = index,
            available = space.available,
            total = ?space.total,
            target_bytes = size,
            "sized round"
        );

        let write_started = Instant::now();
        generator.reset(size);
        let mut write_digest = DigestAccumulator::new();
        self.progress.start(size);
        observer.phase_started(index, Phase::Writing, size);
        let mut writer = ChunkedWriter::create(&path)?;
        let written = writer.write_payload(generator, &mut write_digest, |n| {
            self.progress.set(n);
            observer.progress(index, Phase::Writing, n);
        });
        round.bytes_written = writer.written();
        written?;

        observer.phase_started(index, Phase::Flushing, size);
        writer.commit()?;
        round.write_elapsed = write_started.elapsed();
        let write_digest = write_digest.finalize();
        round.write_digest = Some(write_digest.to_hex());
        observer.file_committed(index, &path);

        let verify_started = Instant::now();
        self.progress.start(size);
        observer.phase_started(index, Phase::Verifying, size);
        let verified = read::run(&path, self.config.block_size, |n| {
            self.progress.set(n);
            observer.progress(index, Phase::Verifying, n);
        });
        round.verify_elapsed = verify_started.elapsed();
        let verify_digest = match verified {
            Ok(digest) => digest,
            Err(e) => {
                if let CycleError::Read { read, .. } = &e {
                    round.bytes_read = *read;
                }
                return Err(e);
            }
        };
        round.bytes_read = verify_digest.stream_len();
        round.verify_digest = Some(verify_digest.to_hex());
        if round.bytes_read != size {
            return Err(CycleError::ByteCountMismatch {
                path,
                phase: Phase::Verifying,
                expected: size,
                actual: round.bytes_read,
            });
        }

        observer.phase_started(index, Phase::Comparing, 0);
        let drift = match *baseline {
            Some(base) => compare_with_baseline(round, base, verify_digest),
            None => None,
        };
        if let Some(drift) = &drift {
            warn!(round = index, error = %drift, "read-back content drifted from baseline");
            round.baseline_error = Some(drift.to_string());
        }
        if write_digest != verify_digest {
            return Err(CycleError::DigestMismatch {
                round: index,
                written: write_digest.to_hex(),
                verified: verify_digest.to_hex(),
            });
        }
        if let Some(drift) = drift {
            return Err(drift);
        }
        if baseline.is_none() {
            *baseline = Some(Baseline {
                bytes: size,
                digest: verify_digest,
            });
        }
        round.baseline_consistent = true;
        Ok(())
    }

    /// Deletes the round's file. A failed round keeps it when configured to.
    /// Problems end up in `cleanup_error` and never replace `failure`.
    fn clean<O>(&self, round: &mut TestRound, observer: &mut O)
    where
        O: CycleObserver + ?Sized,
    {
        observer.phase_started(round.index, Phase::Cleaning, 0);
        if !round.passed() && self.config.keep_failed_file {
            info!(round = round.index, file = %round.file.display(), "keeping file of failed round");
            return;
        }
        match fs::remove_file(&round.file) {
            Ok(()) => debug!(round = round.index, "test file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                let err = CycleError::Cleanup {
                    path: round.file.clone(),
                    source,
                };
                let message = error_chain(&err);
                warn!(round = round.index, error = %message, "cleanup failed");
                round.cleanup_error = Some(message);
            }
        }
    }
}

/// Checks what a round read back against what round 1 read back.
///
/// Digests only compare between rounds of the same size. A round sized
/// differently gets its capacity change recorded instead; its content was
/// still checked against the same payload stream by the digest comparison.
fn compare_with_baseline(
    round: &mut TestRound,
    base: Baseline,
    verified: StreamDigest,
) -> Option<CycleError> {
    if round.target_bytes != base.bytes {
        let change = round.target_bytes as i64 - base.bytes as i64;
        info!(
            round = round.index,
            baseline_bytes = base.bytes,
            target_bytes = round.target_bytes,
            change,
            "free space changed since round 1"
        );
        round.capacity_change = Some(change);
        return None;
    }
    (verified != base.digest).then(|| CycleError::BaselineMismatch {
        round: round.index,
        baseline: base.digest.to_hex(),
        baseline_bytes: base.bytes,
        actual: verified.to_hex(),
        actual_bytes: verified.stream_len(),
    })
}

/// Leftover from an interrupted run. Removing it gives the probe an honest
/// reading; if that fails the write will truncate it anyway.
fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!(file = %path.display(), "removed stale test file from an earlier run"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "could not remove stale test file"),
    }
}

fn check_writable(target: &Path) -> Result<()> {
    let check = target.join(WRITE_CHECK_FILE);
    let not_writable = |source| CycleError::NotWritable {
        path: target.to_path_buf(),
        source,
    };
    fs::File::create(&check).map_err(not_writable)?;
    fs::remove_file(&check).map_err(not_writable)
}
