use crate::error::ProbeError;
use crate::probe::{SpaceInfo, SpaceProbe, os_error, validate_mount_path};
use nix::sys::statvfs::statvfs;
use std::io;
use std::path::{Path, PathBuf};

/// Free space from `statvfs(3)`.
///
/// Available space is `f_bavail * f_frsize`: the blocks an unprivileged user
/// may still allocate, so root-reserved blocks are not counted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeProbe;

impl SpaceProbe for NativeProbe {
    fn probe(&self, target: &Path) -> Result<SpaceInfo, ProbeError> {
        validate_mount_path(target)?;
        let stat = statvfs(target).map_err(|errno| os_error(target, io::Error::from(errno)))?;

        // Some filesystems leave f_frsize at zero and only fill in f_bsize.
        let unit = match stat.fragment_size() as u64 {
            0 => stat.block_size() as u64,
            n => n,
        };
        Ok(SpaceInfo {
            available: (stat.blocks_available() as u64).saturating_mul(unit),
            total: Some((stat.blocks() as u64).saturating_mul(unit)),
        })
    }
}

/// Mount points are used as given; they must be absolute.
pub fn normalize_target(input: &str) -> Result<PathBuf, ProbeError> {
    let path = PathBuf::from(input.trim());
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(ProbeError::NotAbsolute(path));
    }
    Ok(path)
}
