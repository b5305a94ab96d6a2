//! Keeps verification honest by asking the OS to forget a file's cached pages.
//!
//! Without this, reading a file straight after writing it is served from the
//! page cache and never touches the device. Only Linux gets a real
//! implementation; elsewhere this is a no-op.
use std::fs::File;
use std::io;

/// Drops clean cached pages of `file`. The file must already have been synced,
/// since dirty pages are not discarded.
#[cfg(target_os = "linux")]
pub(crate) fn evict(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn evict(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn evicting_a_synced_file_succeeds() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xA5; 8192]).unwrap();
        file.sync_all().unwrap();
        evict(&file).unwrap();
    }
}
