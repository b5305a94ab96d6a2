//! Discovery of mounted removable volumes that can be tested.
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A mounted filesystem on removable media.
#[derive(Clone, Debug, Serialize)]
pub struct Volume {
    /// Where the filesystem is mounted (e.g., `/media/user/STICK` or `E:\`).
    pub mount_point: PathBuf,
    /// The OS name of the backing device (e.g., "sdb1").
    pub name: String,
    /// Filesystem type as reported by the OS (e.g., "vfat", "exfat", "NTFS").
    pub file_system: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub read_only: bool,
}

impl Volume {
    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / GIB
    }

    pub fn available_gb(&self) -> f64 {
        self.available_bytes as f64 / GIB
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = if self.read_only { " [read-only]" } else { "" };
        write!(
            f,
            "{:<25} {:>8.1} GB free of {:.1} GB ({}){}",
            self.mount_point.display(),
            self.available_gb(),
            self.total_gb(),
            self.file_system,
            access
        )
    }
}

/// Lists mounted removable volumes, sorted by mount point.
///
/// The root filesystem is never returned, even on systems that flag it as
/// removable (live USB sessions).
pub fn removable_volumes() -> Vec<Volume> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mut volumes: Vec<Volume> = disks
        .iter()
        .filter(|disk| disk.is_removable())
        .filter(|disk| !is_system_root(disk.mount_point()))
        .map(|disk| Volume {
            mount_point: disk.mount_point().to_path_buf(),
            name: disk.name().to_string_lossy().into_owned(),
            file_system: disk.file_system().to_string_lossy().into_owned(),
            total_bytes: disk.total_space(),
            available_bytes: disk.available_space(),
            read_only: disk.is_read_only(),
        })
        .collect();
    volumes.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    volumes
}

fn is_system_root(mount_point: &Path) -> bool {
    mount_point.parent().is_none()
        && (cfg!(unix) || std::env::var_os("SystemDrive").is_some_and(|d| {
            mount_point
                .as_os_str()
                .to_string_lossy()
                .to_ascii_uppercase()
                .starts_with(&d.to_string_lossy().to_ascii_uppercase())
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_mount_and_space() {
        let volume = Volume {
            mount_point: PathBuf::from("/media/stick"),
            name: "sdb1".into(),
            file_system: "vfat".into(),
            total_bytes: 16 * 1024 * 1024 * 1024,
            available_bytes: 8 * 1024 * 1024 * 1024,
            read_only: true,
        };
        let text = volume.to_string();
        assert!(text.starts_with("/media/stick"));
        assert!(text.contains("8.0 GB free of 16.0 GB (vfat)"));
        assert!(text.ends_with("[read-only]"));
    }

    #[cfg(unix)]
    #[test]
    fn root_is_never_a_candidate() {
        assert!(is_system_root(Path::new("/")));
        assert!(!is_system_root(Path::new("/media/stick")));
    }

    #[cfg(unix)]
    #[test]
    fn listing_does_not_include_root() {
        for volume in removable_volumes() {
            assert_ne!(volume.mount_point, Path::new("/"));
        }
    }
}
