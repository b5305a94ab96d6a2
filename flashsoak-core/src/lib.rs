//! The core, UI-agnostic library for the `flashsoak` endurance tester.
//!
//! `flashsoak-core` fills the free space of a mounted volume with a
//! deterministic payload, forces it to the device, reads it back and checks
//! that the digest of what was written matches the digest of what came back.
//! It repeats this for a configured number of rounds and checks every round
//! against the first, so both in-round corruption and drift between rounds
//! show up.
//!
//! The library is structured into several key modules:
//! - [`cycle`]: The [`Orchestrator`](cycle::Orchestrator) that runs rounds and
//!   the [`CycleObserver`](cycle::CycleObserver) hooks a front-end implements.
//! - [`config`]: The explicit [`CycleConfig`](config::CycleConfig) value a run
//!   is built from.
//! - [`probe`] and [`platform`]: The free-space capability and its native
//!   implementation for the host OS.
//! - [`payload`] and [`digest`]: The deterministic data stream and the hash
//!   state fed from it.
//! - [`mod@write`] and [`mod@read`]: Chunked, memory-bounded file I/O.
//! - [`volume`]: Discovery of removable volumes to test.
//!
//! Memory use is bounded by the block size for all phases, whatever the size
//! of the volume.
//!
//! ## Example: Running Three Rounds Against a USB Stick
//!
//! ```rust,no_run
//! use flashsoak_core::config::CycleConfig;
//! use flashsoak_core::cycle::{CycleObserver, Orchestrator};
//! use flashsoak_core::platform;
//! use flashsoak_core::round::Phase;
//!
//! struct Printer;
//!
//! impl CycleObserver for Printer {
//!     fn phase_started(&mut self, round: u32, phase: Phase, total: u64) {
//!         println!("round {round}: {phase} ({total} bytes)");
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = CycleConfig::new("/media/usb").rounds(3);
//!     let orchestrator = Orchestrator::new(config, platform::native_probe())?;
//!
//!     let report = orchestrator.run(&mut Printer);
//!     for round in &report.rounds {
//!         println!("{}: {:?}", round.index, round.write_digest);
//!     }
//!     if !report.passed {
//!         anyhow::bail!("endurance run failed");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cycle;
pub mod digest;
pub mod error;
mod page_cache;
pub mod payload;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod read;
pub mod round;
pub mod volume;
pub mod write;

pub use config::{CycleConfig, SeedPolicy};
pub use cycle::{CycleObserver, Orchestrator};
pub use error::{ConfigError, CycleError, ProbeError};
pub use round::{Phase, RunReport, TestRound};
