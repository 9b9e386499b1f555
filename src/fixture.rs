//! Fixture layout and discovery.
//!
//! A fixture is any directory whose name ends in `.test`. It either ships a
//! ready-made `fat.img`, or a recipe: `mkfs.args` (formatter flags) plus an
//! executable `generate.sh` that fills the mounted image.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const FIXTURE_SUFFIX: &str = ".test";
pub const FAT_IMAGE: &str = "fat.img";
pub const MKFS_ARGS: &str = "mkfs.args";
pub const GENERATE_SCRIPT: &str = "generate.sh";

/// Where a fixture's FAT image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Prebuilt(PathBuf),
    Recipe {
        mkfs_args: PathBuf,
        generate_script: PathBuf,
    },
    /// Layout is broken; the fixture fails without running any tool.
    Malformed(String),
}

/// A discovered test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub id: String,
    pub dir: PathBuf,
    pub source: ImageSource,
}

impl Fixture {
    pub fn is_prebuilt(&self) -> bool {
        matches!(self.source, ImageSource::Prebuilt(_))
    }
}

/// Find every fixture under `root`, sorted by identifier.
pub fn discover(root: &Path) -> Result<Vec<Fixture>> {
    if !root.is_dir() {
        anyhow::bail!("fixtures root '{}' is not a directory", root.display());
    }

    let mut fixtures = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("walking fixtures root '{}'", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(FIXTURE_SUFFIX) {
            continue;
        }

        let dir = entry.path().to_path_buf();
        let rel = dir.strip_prefix(root).unwrap_or(&dir);
        fixtures.push(Fixture {
            id: test_id(rel),
            source: classify(&dir),
            dir,
        });
    }

    fixtures.sort_by(|a, b| a.id.cmp(&b.id));
    reject_duplicate_ids(&mut fixtures, root);
    tracing::debug!(count = fixtures.len(), root = %root.display(), "discovered fixtures");
    Ok(fixtures)
}

/// Mark every fixture whose identifier collides with another as malformed.
///
/// `fixtures` must be sorted by identifier.
fn reject_duplicate_ids(fixtures: &mut [Fixture], root: &Path) {
    let mut start = 0;
    while start < fixtures.len() {
        let end = start
            + fixtures[start..]
                .iter()
                .take_while(|f| f.id == fixtures[start].id)
                .count();
        if end - start > 1 {
            let dirs: Vec<String> = fixtures[start..end]
                .iter()
                .map(|f| f.dir.strip_prefix(root).unwrap_or(&f.dir).display().to_string())
                .collect();
            let reason = format!("identifier is shared by {}", dirs.join(", "));
            tracing::warn!(id = %fixtures[start].id, "{reason}");
            for fixture in &mut fixtures[start..end] {
                fixture.source = ImageSource::Malformed(reason.clone());
            }
        }
        start = end;
    }
}

/// Identifier for a fixture at `rel` (relative to the fixtures root).
///
/// `fat-variants/4096-32.test` becomes `test_fat_variants__4096_32`.
pub fn test_id(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let last = parts.len().saturating_sub(1);
    let normalized: Vec<String> = parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let part = if i == last {
                part.strip_suffix(FIXTURE_SUFFIX).unwrap_or(part)
            } else {
                part.as_str()
            };
            part.replace('-', "_")
        })
        .collect();
    format!("test_{}", normalized.join("__"))
}

/// Decide how a fixture directory provides its image.
pub fn classify(dir: &Path) -> ImageSource {
    let image = dir.join(FAT_IMAGE);
    let mkfs_args = dir.join(MKFS_ARGS);
    let generate_script = dir.join(GENERATE_SCRIPT);

    let has_image = image.is_file();
    let has_args = mkfs_args.is_file();
    let has_script = generate_script.is_file();

    match (has_image, has_args, has_script) {
        (true, false, false) => ImageSource::Prebuilt(image),
        (false, true, true) => {
            if !is_executable(&generate_script) {
                return ImageSource::Malformed(format!("{GENERATE_SCRIPT} is not executable"));
            }
            ImageSource::Recipe {
                mkfs_args,
                generate_script,
            }
        }
        (true, _, _) => ImageSource::Malformed(format!(
            "both {FAT_IMAGE} and a generation recipe are present"
        )),
        (false, false, false) => ImageSource::Malformed(format!(
            "neither {FAT_IMAGE} nor {MKFS_ARGS} + {GENERATE_SCRIPT} is present"
        )),
        (false, false, true) => ImageSource::Malformed(format!("{MKFS_ARGS} is missing")),
        (false, true, false) => ImageSource::Malformed(format!("{GENERATE_SCRIPT} is missing")),
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
