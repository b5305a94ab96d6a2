//! Error types for the endurance cycle.
//!
//! [`CycleError`] is the taxonomy a round can fail with. Every I/O variant
//! carries the path it was operating on and the underlying OS error as its
//! source, so a front-end can print the whole chain.
use crate::round::Phase;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the free-space capability.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("target path must be absolute: {0}")]
    NotAbsolute(PathBuf),

    #[error("target path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("not a drive identifier or absolute path: {0}")]
    InvalidDrive(String),

    #[error("free-space query failed for {path}")]
    Os {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Rejected [`crate::config::CycleConfig`] values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("round count must be at least 1")]
    ZeroRounds,

    #[error("block size must be at least 1 byte")]
    ZeroBlockSize,

    #[error("block size {requested} exceeds the maximum of {max} bytes")]
    BlockSizeTooLarge { requested: usize, max: usize },

    #[error("target path is empty")]
    EmptyTarget,

    #[error("file stem must be a plain file name, got {0:?}")]
    InvalidFileStem(String),
}

/// Everything that can end a round early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("free-space query failed")]
    SpaceQuery(#[from] ProbeError),

    #[error("target {path} is not writable")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("insufficient space on {path}: {available} bytes free, reserve is {reserve} bytes")]
    InsufficientSpace {
        path: PathBuf,
        available: u64,
        reserve: u64,
    },

    #[error("could not create {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write to {path} failed after {written} of {target} bytes")]
    Write {
        path: PathBuf,
        written: u64,
        target: u64,
        #[source]
        source: io::Error,
    },

    #[error("durability flush of {path} failed")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not open {path} for verification")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read from {path} failed after {read} bytes")]
    Read {
        path: PathBuf,
        read: u64,
        #[source]
        source: io::Error,
    },

    #[error("byte count mismatch on {path}: expected {expected}, {phase} saw {actual}")]
    ByteCountMismatch {
        path: PathBuf,
        phase: Phase,
        expected: u64,
        actual: u64,
    },

    #[error("digest mismatch in round {round}: wrote {written}, read back {verified}")]
    DigestMismatch {
        round: u32,
        written: String,
        verified: String,
    },

    #[error(
        "round {round} drifted from baseline: {actual_bytes} bytes / {actual} vs {baseline_bytes} bytes / {baseline}"
    )]
    BaselineMismatch {
        round: u32,
        baseline: String,
        baseline_bytes: u64,
        actual: String,
        actual_bytes: u64,
    },

    #[error("could not delete {path}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CycleError {
    /// The state-machine phase this error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            CycleError::SpaceQuery(_) | CycleError::NotWritable { .. } => Phase::Probing,
            CycleError::InsufficientSpace { .. } => Phase::Sizing,
            CycleError::Create { .. } | CycleError::Write { .. } => Phase::Writing,
            CycleError::Flush { .. } => Phase::Flushing,
            CycleError::Open { .. } | CycleError::Read { .. } => Phase::Verifying,
            CycleError::ByteCountMismatch { phase, .. } => *phase,
            CycleError::DigestMismatch { .. } | CycleError::BaselineMismatch { .. } => {
                Phase::Comparing
            }
            CycleError::Cleanup { .. } => Phase::Cleaning,
        }
    }
}

pub type Result<T, E = CycleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_variants_keep_their_source() {
        let err = CycleError::Write {
            path: PathBuf::from("/mnt/usb/f.bin"),
            written: 10,
            target: 20,
            source: io::Error::new(io::ErrorKind::StorageFull, "disk full"),
        };
        assert_eq!(err.phase(), Phase::Writing);
        assert!(err.to_string().contains("after 10 of 20 bytes"));
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn probe_errors_map_to_probing() {
        let err: CycleError = ProbeError::NotFound(PathBuf::from("/nope")).into();
        assert_eq!(err.phase(), Phase::Probing);
    }

    #[test]
    fn mismatches_are_comparing_failures() {
        let err = CycleError::DigestMismatch {
            round: 2,
            written: "aa".into(),
            verified: "bb".into(),
        };
        assert_eq!(err.phase(), Phase::Comparing);
        assert!(err.to_string().contains("wrote aa, read back bb"));
    }
}
