//! OS mount table parsing and namespace-mount detection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default location of the mount table.
pub const MOUNTS_PATH: &str = "/proc/mounts";

/// Directories a named network namespace may be mounted under, in
/// preference order: the first one found in the mount table wins.
pub const NETNS_DIRS: [&str; 2] = ["/var/run/netns", "/run/netns"];

/// One mount table line. Only the first three fields are meaningful
/// here; options, dump, and pass are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Parses mount table text of the form
/// `<device> <mount-point> <type> <options> <dump> <pass>`, one mount per
/// line, fields separated by single spaces. Lines with fewer than three
/// fields are skipped.
pub fn parse_mounts(table: &str) -> Vec<MountEntry> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(' ');
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: device.to_string(),
                mount_point: PathBuf::from(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

pub fn read_mounts(path: &Path) -> io::Result<Vec<MountEntry>> {
    Ok(parse_mounts(&fs::read_to_string(path)?))
}

/// The directory named network namespaces are mounted under, per the
/// mount table. `None` when no known netns directory is mounted.
pub fn netns_dir(entries: &[MountEntry]) -> Option<PathBuf> {
    entries
        .iter()
        .find(|entry| {
            NETNS_DIRS
                .iter()
                .any(|dir| entry.mount_point == Path::new(dir))
        })
        .map(|entry| entry.mount_point.clone())
}

/// `true` when namespace `name` is mounted under `dir`: the mount table
/// holds a `proc` or `nsfs` entry at exactly `dir/name`.
pub fn has_ns_mount(entries: &[MountEntry], dir: &Path, name: &str) -> bool {
    let target = dir.join(name);
    entries
        .iter()
        .any(|entry| (entry.fs_type == "proc" || entry.fs_type == "nsfs") && entry.mount_point == target)
}
