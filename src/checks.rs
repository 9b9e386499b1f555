//! Success policies for the formatter, the ext4 checker and rsync.

use crate::error::OutputRejection;
use crate::process::ToolOutput;

/// Printed by mkfs.fat when the requested geometry cannot hold a FAT32.
pub const NOT_ENOUGH_CLUSTERS_MSG: &str = "WARNING: Not enough clusters for a 32 bit FAT!";

/// fsck exit bits that do not indicate a broken image.
///
/// 1: errors corrected, 2: errors corrected and reboot advised. Any other
/// bit (4 uncorrected, 8 operational error, 16 usage, ...) is fatal. Pinned
/// against e2fsprogs' documented exit codes.
pub const FSCK_INFORMATIONAL_MASK: i32 = 0b11;

pub const FSCK_ERRORS_MSG: &str = "fsck.ext4 reported errors in converted image";

/// Reject a formatter run that warned about too few clusters.
pub fn check_mkfs_fat_output(output: &ToolOutput) -> Result<(), OutputRejection> {
    if output.stderr_str().contains(NOT_ENOUGH_CLUSTERS_MSG) {
        return Err(OutputRejection::FixtureAuthoring(
            "too few clusters for FAT32 specified in test case".to_string(),
        ));
    }
    Ok(())
}

/// Whether a failed fsck run should propagate.
///
/// Used as the tool's error predicate: `true` means real corruption.
pub fn fsck_reported_errors(output: &ToolOutput) -> bool {
    match output.code {
        Some(code) => code & !FSCK_INFORMATIONAL_MASK != 0,
        None => true,
    }
}

/// Accept an rsync dry run that found nothing but the root timestamp.
///
/// FAT has no directory entry for its root, so the driver makes up the
/// root's mtime and rsync reports it as `.d..t...... ./`.
pub fn check_rsync_output(output: &ToolOutput) -> Result<(), OutputRejection> {
    let stdout = output.stdout_str();
    if stdout.is_empty() {
        return Ok(());
    }
    match stdout.strip_suffix('\n') {
        Some(line) if !line.contains('\n') && is_root_timestamp_line(line) => Ok(()),
        _ => Err(OutputRejection::Unexpected(
            "rsync reported differences between fat and ext4 images".to_string(),
        )),
    }
}

fn is_root_timestamp_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix(".d..t") else {
        return false;
    };
    let Some(flags) = rest.strip_suffix(" ./") else {
        return false;
    };
    !flags.is_empty() && flags.chars().all(|c| c == '.')
}
