//! The free-space capability.
//!
//! Everything OS-specific about asking "how much room is left?" lives behind
//! [`SpaceProbe`]. The native implementation for the host is picked once at
//! compile time in [`crate::platform`]; tests substitute their own.
use crate::error::ProbeError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A point-in-time reading for one target. Never reuse it across rounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpaceInfo {
    /// Bytes the current user may still write.
    pub available: u64,
    /// Capacity of the filesystem, when the platform reports it.
    pub total: Option<u64>,
}

/// Reports free space for a mount point or drive.
///
/// Zero available bytes is a valid answer, not an error.
pub trait SpaceProbe {
    fn probe(&self, target: &Path) -> Result<SpaceInfo, ProbeError>;
}

impl<P: SpaceProbe + ?Sized> SpaceProbe for &P {
    fn probe(&self, target: &Path) -> Result<SpaceInfo, ProbeError> {
        (**self).probe(target)
    }
}

impl<P: SpaceProbe + ?Sized> SpaceProbe for Box<P> {
    fn probe(&self, target: &Path) -> Result<SpaceInfo, ProbeError> {
        (**self).probe(target)
    }
}

/// Checks that a mount-style target is absolute and exists.
pub fn validate_mount_path(target: &Path) -> Result<(), ProbeError> {
    if !target.is_absolute() {
        return Err(ProbeError::NotAbsolute(target.to_path_buf()));
    }
    if !target.exists() {
        return Err(ProbeError::NotFound(target.to_path_buf()));
    }
    Ok(())
}

/// Wraps an OS error from the query itself.
pub(crate) fn os_error(target: &Path, source: std::io::Error) -> ProbeError {
    ProbeError::Os {
        path: PathBuf::from(target),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u64);

    impl SpaceProbe for Fixed {
        fn probe(&self, _: &Path) -> Result<SpaceInfo, ProbeError> {
            Ok(SpaceInfo {
                available: self.0,
                total: None,
            })
        }
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = validate_mount_path(Path::new("mnt/usb")).unwrap_err();
        assert!(matches!(err, ProbeError::NotAbsolute(_)));
    }

    #[test]
    fn missing_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_mount_path(&dir.path().join("not-here")).unwrap_err();
        assert!(matches!(err, ProbeError::NotFound(_)));
    }

    #[test]
    fn existing_directory_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        validate_mount_path(dir.path()).unwrap();
    }

    #[test]
    fn boxed_and_borrowed_probes_delegate() {
        let boxed: Box<dyn SpaceProbe> = Box::new(Fixed(0));
        assert_eq!(boxed.probe(Path::new("/")).unwrap().available, 0);
        let fixed = Fixed(42);
        assert_eq!((&fixed).probe(Path::new("/")).unwrap().available, 42);
    }
}
