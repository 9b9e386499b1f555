//! Scoped filesystem mounts for image comparison.
//!
//! A [`MountStrategy`] knows how the host attaches an image: Linux loop
//! mounts everything, macOS attaches FAT images with `hdiutil` and reads
//! ext4 through `ext4fuse`. The strategy is picked once by
//! [`host_strategy`]; callers never branch on the platform.
//!
//! [`ImageMounter`] owns the per-test mount directory. Mount points are
//! named after the filesystem type (`<temp>/mnt/vfat`, `<temp>/mnt/ext4`),
//! so at most one mount per type exists at a time.

use crate::capture::CapturedOutput;
use crate::process::Cmd;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Filesystems the harness mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsType {
    Vfat,
    Ext4,
}

impl FsType {
    /// Name used for `mount -t` and for the mount-point directory.
    pub fn name(self) -> &'static str {
        match self {
            Self::Vfat => "vfat",
            Self::Ext4 => "ext4",
        }
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the host attaches and releases images.
pub trait MountStrategy {
    fn name(&self) -> &'static str;

    /// Command that mounts `image` at `mount_point`.
    fn mount_cmd(&self, image: &Path, fs_type: FsType, readonly: bool, mount_point: &Path)
        -> Cmd;

    /// Command that undoes [`MountStrategy::mount_cmd`].
    fn release_cmd(&self, fs_type: FsType, mount_point: &Path) -> Cmd;

    /// Host tools this strategy shells out to, as (command, package).
    fn required_tools(&self) -> &'static [(&'static str, &'static str)];

    /// Whether mounting needs root privileges.
    fn needs_root(&self) -> bool {
        false
    }
}

/// Native loop mounts (Linux).
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopMount;

impl MountStrategy for LoopMount {
    fn name(&self) -> &'static str {
        "loop"
    }

    fn mount_cmd(
        &self,
        image: &Path,
        fs_type: FsType,
        readonly: bool,
        mount_point: &Path,
    ) -> Cmd {
        let mut cmd = Cmd::new("mount").args(["-o", "loop", "-t", fs_type.name()]);
        if readonly {
            cmd = cmd.arg("--read-only");
        }
        cmd.arg_path(image)
            .arg_path(mount_point)
            .error_msg("mount did not exit cleanly, check mounts")
    }

    fn release_cmd(&self, _fs_type: FsType, mount_point: &Path) -> Cmd {
        umount(mount_point)
    }

    fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
        &[("mount", "util-linux"), ("umount", "util-linux")]
    }

    fn needs_root(&self) -> bool {
        true
    }
}

/// Disk-image attach for FAT plus a user-space ext4 reader (macOS).
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskImageAttach;

impl MountStrategy for DiskImageAttach {
    fn name(&self) -> &'static str {
        "hdiutil"
    }

    fn mount_cmd(
        &self,
        image: &Path,
        fs_type: FsType,
        readonly: bool,
        mount_point: &Path,
    ) -> Cmd {
        match fs_type {
            // ext4fuse is read-only by construction.
            FsType::Ext4 => Cmd::new("ext4fuse")
                .arg_path(image)
                .arg_path(mount_point)
                .error_msg("ext4fuse mounting failed, check mounts"),
            FsType::Vfat => {
                let mut cmd = Cmd::new("hdiutil")
                    .name("hdiutil attach")
                    .args(["attach", "-imagekey", "diskimage-class=CRawDiskImage", "-nobrowse"]);
                if readonly {
                    cmd = cmd.arg("-readonly");
                }
                cmd.arg("-mountpoint")
                    .arg_path(mount_point)
                    .arg_path(image)
                    .error_msg("hdiutil attach did not exit cleanly, check mounts")
            }
        }
    }

    fn release_cmd(&self, fs_type: FsType, mount_point: &Path) -> Cmd {
        match fs_type {
            FsType::Ext4 => umount(mount_point),
            FsType::Vfat => Cmd::new("hdiutil")
                .name("hdiutil eject")
                .arg("eject")
                .arg_path(mount_point)
                .error_msg("hdiutil eject did not exit cleanly, check mounts"),
        }
    }

    fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
        &[("hdiutil", "macOS"), ("ext4fuse", "ext4fuse"), ("umount", "macOS")]
    }
}

fn umount(mount_point: &Path) -> Cmd {
    Cmd::new("umount")
        .arg_path(mount_point)
        .error_msg("umount did not exit cleanly, check mounts")
}

/// Strategy for the platform this binary was built for.
#[cfg(target_os = "linux")]
pub fn host_strategy() -> Result<Box<dyn MountStrategy>> {
    Ok(Box::new(LoopMount))
}

#[cfg(target_os = "macos")]
pub fn host_strategy() -> Result<Box<dyn MountStrategy>> {
    Ok(Box::new(DiskImageAttach))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn host_strategy() -> Result<Box<dyn MountStrategy>> {
    anyhow::bail!("mounting is only implemented for Linux and macOS")
}

/// Hands out mount points under one temporary root.
pub struct ImageMounter<'s> {
    strategy: &'s dyn MountStrategy,
    mounts_dir: PathBuf,
    timeout: Duration,
}

impl<'s> ImageMounter<'s> {
    /// Create `<temp_dir>/mnt` and bind it to `strategy`.
    pub fn new(strategy: &'s dyn MountStrategy, temp_dir: &Path, timeout: Duration) -> Result<Self> {
        let mounts_dir = temp_dir.join("mnt");
        fs::create_dir(&mounts_dir)
            .with_context(|| format!("creating mount root '{}'", mounts_dir.display()))?;
        Ok(Self {
            strategy,
            mounts_dir,
            timeout,
        })
    }

    /// Mount point for `fs_type`, created on first use.
    pub fn mount_point(&self, fs_type: FsType) -> Result<PathBuf> {
        let mount_point = self.mounts_dir.join(fs_type.name());
        if !mount_point.is_dir() {
            fs::create_dir(&mount_point)
                .with_context(|| format!("creating mount point '{}'", mount_point.display()))?;
        }
        Ok(mount_point)
    }

    /// Mount `image` and return a handle that must be released.
    pub fn mount(
        &self,
        captured: &mut CapturedOutput,
        image: &Path,
        fs_type: FsType,
        readonly: bool,
    ) -> Result<Mount> {
        let mount_point = self.mount_point(fs_type)?;
        self.strategy
            .mount_cmd(image, fs_type, readonly, &mount_point)
            .timeout(self.timeout)
            .run(captured)
            .with_context(|| {
                format!(
                    "mounting {} image '{}' at '{}'",
                    fs_type,
                    image.display(),
                    mount_point.display()
                )
            })?;
        tracing::debug!(%fs_type, readonly, mount_point = %mount_point.display(), "mounted");

        let release = self
            .strategy
            .release_cmd(fs_type, &mount_point)
            .timeout(self.timeout);
        Ok(Mount {
            mount_point,
            fs_type,
            release: Some(release),
        })
    }

    /// Run `body` with `image` mounted, releasing the mount afterwards.
    ///
    /// The mount is released whether or not `body` fails. If both fail, the
    /// body's error is returned and the release failure is logged.
    pub fn with_mount<T>(
        &self,
        captured: &mut CapturedOutput,
        image: &Path,
        fs_type: FsType,
        readonly: bool,
        body: impl FnOnce(&mut CapturedOutput, &Path) -> Result<T>,
    ) -> Result<T> {
        let mount = self.mount(captured, image, fs_type, readonly)?;
        let mount_point = mount.path().to_path_buf();
        let result = body(captured, &mount_point);
        let released = mount.release(captured);

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                tracing::warn!("{release_err:#}");
                Err(err)
            }
        }
    }
}

/// A live mount. Released explicitly, or on drop as a last resort.
pub struct Mount {
    mount_point: PathBuf,
    fs_type: FsType,
    release: Option<Cmd>,
}

impl Mount {
    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    /// Unmount, recording the release tool's output.
    pub fn release(mut self, captured: &mut CapturedOutput) -> Result<()> {
        let Some(release) = self.release.take() else {
            return Ok(());
        };
        release.run(captured).with_context(|| {
            format!(
                "releasing {} mount at '{}'",
                self.fs_type,
                self.mount_point.display()
            )
        })?;
        tracing::debug!(fs_type = %self.fs_type, mount_point = %self.mount_point.display(), "released");
        Ok(())
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(
                "releasing {} mount at {} during unwind",
                self.fs_type,
                self.mount_point.display()
            );
            let mut scratch = CapturedOutput::new(&self.mount_point);
            if let Err(e) = release.run(&mut scratch) {
                tracing::warn!(
                    "failed to release {}: {}, check mounts",
                    self.mount_point.display(),
                    e
                );
            }
        }
    }
}
