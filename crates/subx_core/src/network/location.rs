//! Local vs network source classification.

use std::path::{Path, PathBuf};

use crate::models::SourceLocation;

/// Filesystem types treated as remote.
const NETWORK_FILESYSTEMS: &[&str] = &[
    "nfs", "nfs4", "cifs", "smb3", "smbfs", "sshfs", "fuse.sshfs", "9p", "afs", "ceph", "davfs",
    "fuse.davfs2",
];

const URL_SCHEMES: &[&str] = &["smb://", "nfs://", "afp://", "ftp://", "sftp://"];

/// One line of a mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_point: PathBuf,
    pub fs_type: String,
}

pub fn is_network_filesystem(fs_type: &str) -> bool {
    let fs_type = fs_type.to_ascii_lowercase();
    NETWORK_FILESYSTEMS.contains(&fs_type.as_str())
}

/// Parse `/proc/mounts` content. Malformed lines are skipped.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Undo the octal escaping the kernel applies to spaces, tabs and
/// backslashes in mount points (`\040` for a space).
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Classify `path` against a mount table using the longest matching
/// mount point.
pub fn classify_with_mounts(path: &Path, mounts: &[MountEntry]) -> SourceLocation {
    if let Some(location) = classify_by_name(path) {
        return location;
    }

    mounts
        .iter()
        .filter(|m| path.starts_with(&m.mount_point))
        .max_by_key(|m| m.mount_point.components().count())
        .map(|m| {
            if is_network_filesystem(&m.fs_type) {
                SourceLocation::Network
            } else {
                SourceLocation::Local
            }
        })
        .unwrap_or(SourceLocation::Local)
}

/// Decide whether `path` lives on network storage.
///
/// UNC paths and URL-style paths are network sources. On Linux the
/// filesystem type of the containing mount is consulted as well.
pub fn classify_path(path: &Path) -> SourceLocation {
    if let Some(location) = classify_by_name(path) {
        return location;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    classify_with_mounts(&absolute, &system_mounts())
}

fn classify_by_name(path: &Path) -> Option<SourceLocation> {
    let text = path.to_string_lossy();
    let lower = text.to_ascii_lowercase();

    if text.starts_with(r"\\") || text.starts_with("//") {
        return Some(SourceLocation::Network);
    }
    if URL_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return Some(SourceLocation::Network);
    }
    None
}

#[cfg(target_os = "linux")]
fn system_mounts() -> Vec<MountEntry> {
    match std::fs::read_to_string("/proc/mounts") {
        Ok(content) => parse_mounts(&content),
        Err(e) => {
            tracing::debug!("Cannot read /proc/mounts: {}", e);
            Vec::new()
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn system_mounts() -> Vec<MountEntry> {
    Vec::new()
}
