//! Run configuration.
use crate::error::ConfigError;
use crate::payload::{DEFAULT_SEED, Seed};
use std::path::{Path, PathBuf};

pub const DEFAULT_ROUNDS: u32 = 5;
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
/// Largest accepted block size. The payload buffer is one block plus a
/// pattern's worth of bytes.
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024 * 1024;
pub const DEFAULT_RESERVE: u64 = 1024 * 1024;
pub const DEFAULT_FILE_STEM: &str = "flashsoak_round";

/// Where each round's payload seed comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedPolicy {
    /// The same seed on every round of every run.
    Fixed(Seed),
    /// One seed drawn when the run starts and used for all of its rounds.
    RandomPerRun,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::Fixed(DEFAULT_SEED)
    }
}

impl SeedPolicy {
    pub(crate) fn resolve(self) -> Seed {
        match self {
            SeedPolicy::Fixed(seed) => seed,
            SeedPolicy::RandomPerRun => Seed::random(),
        }
    }
}

/// Everything one run needs. Passed by value into the orchestrator; nothing
/// here is global.
#[derive(Clone, Debug)]
pub struct CycleConfig {
    /// Mount point or drive root the test files are written under.
    pub target: PathBuf,
    pub rounds: u32,
    /// Bytes per read/write call. Also the bound on payload memory.
    pub block_size: usize,
    /// Free bytes deliberately left unwritten.
    pub reserve: u64,
    pub seed: SeedPolicy,
    /// Leave the test file behind when a round fails, for inspection.
    pub keep_failed_file: bool,
    /// Test files are named `<file_stem>_<round:03>.bin`.
    pub file_stem: String,
}

impl CycleConfig {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            rounds: DEFAULT_ROUNDS,
            block_size: DEFAULT_BLOCK_SIZE,
            reserve: DEFAULT_RESERVE,
            seed: SeedPolicy::default(),
            keep_failed_file: false,
            file_stem: DEFAULT_FILE_STEM.to_string(),
        }
    }

    pub fn rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn reserve(mut self, reserve: u64) -> Self {
        self.reserve = reserve;
        self
    }

    pub fn seed(mut self, seed: SeedPolicy) -> Self {
        self.seed = seed;
        self
    }

    pub fn keep_failed_file(mut self, keep: bool) -> Self {
        self.keep_failed_file = keep;
        self
    }

    pub fn file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.as_os_str().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::BlockSizeTooLarge {
                requested: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        let stem = Path::new(&self.file_stem);
        if self.file_stem.is_empty() || stem.file_name() != Some(stem.as_os_str()) {
            return Err(ConfigError::InvalidFileStem(self.file_stem.clone()));
        }
        Ok(())
    }

    /// The test file for a round. Stable across runs so leftovers from an
    /// interrupted run are found and replaced.
    pub fn round_file(&self, round: u32) -> PathBuf {
        self.target.join(format!("{}_{:03}.bin", self.file_stem, round))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CycleConfig::new("/media/stick");
        assert_eq!(config.rounds, 5);
        assert_eq!(config.block_size, 4 * 1024 * 1024);
        assert_eq!(config.reserve, 1024 * 1024);
        assert_eq!(config.seed, SeedPolicy::Fixed(DEFAULT_SEED));
        assert!(!config.keep_failed_file);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let config = CycleConfig::new("/media/stick")
            .rounds(2)
            .block_size(64)
            .reserve(0)
            .seed(SeedPolicy::RandomPerRun)
            .keep_failed_file(true)
            .file_stem("soak");
        assert_eq!(config.rounds, 2);
        assert_eq!(config.block_size, 64);
        assert_eq!(config.reserve, 0);
        assert!(config.keep_failed_file);
        assert_eq!(
            config.round_file(7),
            PathBuf::from("/media/stick").join("soak_007.bin")
        );
    }

    #[test]
    fn rejects_bad_values() {
        let base = CycleConfig::new("/media/stick");
        assert_eq!(base.clone().rounds(0).validate(), Err(ConfigError::ZeroRounds));
        assert_eq!(base.clone().block_size(0).validate(), Err(ConfigError::ZeroBlockSize));
        assert!(base.clone().block_size(MAX_BLOCK_SIZE).validate().is_ok());
        assert_eq!(
            base.clone().block_size(usize::MAX).validate(),
            Err(ConfigError::BlockSizeTooLarge {
                requested: usize::MAX,
                max: MAX_BLOCK_SIZE,
            })
        );
        assert_eq!(CycleConfig::new("").validate(), Err(ConfigError::EmptyTarget));
        assert!(matches!(
            base.clone().file_stem("../escape").validate(),
            Err(ConfigError::InvalidFileStem(_))
        ));
        assert!(matches!(
            base.file_stem("").validate(),
            Err(ConfigError::InvalidFileStem(_))
        ));
    }

    #[test]
    fn random_policy_draws_fresh_seeds() {
        assert_ne!(SeedPolicy::RandomPerRun.resolve(), SeedPolicy::RandomPerRun.resolve());
        assert_eq!(SeedPolicy::default().resolve(), DEFAULT_SEED);
    }
}
