//! Preflight checks before a suite run.
//!
//! Validates that the converter exists and that the host has the
//! formatter, checker, diff tool and mount helpers on `PATH`. A missing
//! tool would otherwise surface as the same spawn failure in every fixture.
//!
//! # Example
//!
//! ```rust,ignore
//! use convert_harness::preflight::{check_required_tools, command_exists};
//!
//! if !command_exists("rsync") {
//!     println!("rsync not installed");
//! }
//!
//! check_required_tools(&[("fsck.ext4", "e2fsprogs")])?;
//! ```

use anyhow::{bail, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::mount::MountStrategy;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools every fixture run needs regardless of platform.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("mkfs.fat", "dosfstools"),
    ("fsck.ext4", "e2fsprogs"),
    ("rsync", "rsync"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check the converter path points at an executable file.
pub fn check_converter(converter: &Path) -> Result<()> {
    let Ok(meta) = converter.metadata() else {
        bail!("converter '{}' does not exist", converter.display());
    };
    if !meta.is_file() {
        bail!("converter '{}' is not a file", converter.display());
    }
    if meta.permissions().mode() & 0o111 == 0 {
        bail!("converter '{}' is not executable", converter.display());
    }
    Ok(())
}

/// Full preflight for a suite run with `strategy`.
pub fn check_host(converter: &Path, strategy: &dyn MountStrategy) -> Result<()> {
    check_converter(converter)?;
    if strategy.needs_root() && !running_as_root() {
        tracing::warn!(
            "not running as root, {} mounts will likely fail",
            strategy.name()
        );
    }

    let tools: Vec<(&str, &str)> = REQUIRED_TOOLS
        .iter()
        .chain(strategy.required_tools())
        .copied()
        .collect();
    check_required_tools(&tools)
}

fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_command_exists() {
        // 'sh' should exist on any Unix system
        assert!(command_exists("sh"));
        // Random garbage should not exist
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("sh", "dash"), ("cat", "coreutils")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_failure() {
        let tools = &[("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(tools).unwrap_err();
        assert!(err.to_string().contains("fake-package"));
    }

    struct RootOnly;

    impl MountStrategy for RootOnly {
        fn name(&self) -> &'static str {
            "root-only"
        }

        fn mount_cmd(
            &self,
            _: &Path,
            _: crate::mount::FsType,
            _: bool,
            _: &Path,
        ) -> crate::process::Cmd {
            crate::process::Cmd::new("true")
        }

        fn release_cmd(&self, _: crate::mount::FsType, _: &Path) -> crate::process::Cmd {
            crate::process::Cmd::new("true")
        }

        fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
            &[("definitely_not_a_mount_helper_12345", "fake-mount-utils")]
        }

        fn needs_root(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_check_host_reports_strategy_tools() {
        let tmp = TempDir::new().unwrap();
        let converter = tmp.path().join("ofs-convert");
        fs::write(&converter, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&converter, fs::Permissions::from_mode(0o755)).unwrap();

        // Root or not, the euid check only warns; the missing helper fails.
        let err = check_host(&converter, &RootOnly).unwrap_err();
        assert!(err.to_string().contains("fake-mount-utils"));
    }

    #[test]
    fn test_check_converter() {
        let tmp = TempDir::new().unwrap();
        let converter = tmp.path().join("ofs-convert");

        assert!(check_converter(&converter).is_err());
        assert!(check_converter(tmp.path()).is_err());

        fs::write(&converter, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&converter, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(check_converter(&converter).is_err());

        fs::set_permissions(&converter, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(check_converter(&converter).is_ok());
    }
}
