//! Provides platform-specific functionality.
//!
//! Each submodule exposes the same API: a `NativeProbe` implementing
//! [`SpaceProbe`](crate::probe::SpaceProbe) with the host's own free-space
//! call, and `normalize_target`, which turns user input into the path the
//! probe and the test files will use. Which one is compiled in is decided by
//! `#[cfg]`, so the two variants are never mixed within a run.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::*;

/// The probe for the host OS.
pub fn native_probe() -> NativeProbe {
    NativeProbe
}
