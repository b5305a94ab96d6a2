use crate::error::ProbeError;
use crate::probe::{SpaceInfo, SpaceProbe, os_error, validate_mount_path};
use std::io;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

/// Free space from `GetDiskFreeSpaceExW`, honouring per-user quotas.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeProbe;

impl SpaceProbe for NativeProbe {
    fn probe(&self, target: &Path) -> Result<SpaceInfo, ProbeError> {
        validate_mount_path(target)?;
        let wide: Vec<u16> = target
            .as_os_str()
            .encode_wide()
            .chain(iter::once(0))
            .collect();

        let mut available: u64 = 0;
        let mut total: u64 = 0;
        // SAFETY: `wide` is NUL-terminated and outlives the call; the out
        // pointers refer to live locals. The last out parameter is optional.
        let ok = unsafe {
            GetDiskFreeSpaceExW(
                wide.as_ptr(),
                &mut available,
                &mut total,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(os_error(target, io::Error::last_os_error()));
        }
        Ok(SpaceInfo {
            available,
            total: Some(total),
        })
    }
}

/// Accepts a drive identifier (`E`, `E:`, `E:\`, `e:/`) and turns it into the
/// drive root, or passes through any other absolute path (a volume mounted
/// into a folder, a UNC share).
pub fn normalize_target(input: &str) -> Result<PathBuf, ProbeError> {
    let trimmed = input.trim();
    let bare = trimmed.trim_end_matches(['\\', '/']).trim_end_matches(':');
    let mut chars = bare.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() {
            return Ok(PathBuf::from(format!("{}:\\", letter.to_ascii_uppercase())));
        }
        return Err(ProbeError::InvalidDrive(trimmed.to_string()));
    }

    let path = PathBuf::from(trimmed);
    if !path.is_absolute() {
        return Err(ProbeError::InvalidDrive(trimmed.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letters_become_roots() {
        for input in ["e", "E:", "E:\\", "e:/"] {
            assert_eq!(normalize_target(input).unwrap(), PathBuf::from("E:\\"));
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            normalize_target("1:"),
            Err(ProbeError::InvalidDrive(_))
        ));
        assert!(matches!(
            normalize_target("usb\\stick"),
            Err(ProbeError::InvalidDrive(_))
        ));
    }

    #[test]
    fn probes_a_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let info = NativeProbe.probe(dir.path()).unwrap();
        assert!(info.available <= info.total.unwrap());
    }
}
