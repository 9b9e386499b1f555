//! FAT geometry fixture matrix.
//!
//! Expands sector size × sectors per cluster into one `<S>-<C>.test`
//! directory per usable pair. Each fixture formats a FAT32 image of a fixed
//! cluster count and fills it with a few files, one of which crosses an
//! ext4 block group boundary by a single block.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::fixture::{FIXTURE_SUFFIX, GENERATE_SCRIPT, MKFS_ARGS};

pub const SECTOR_SIZES: &[u32] = &[512, 1024, 2048, 4096];
pub const SECTORS_PER_CLUSTERS: &[u32] = &[1, 2, 4, 8, 16, 32, 64, 128];

/// Smallest block size ext4 accepts.
pub const MIN_BLOCK_SIZE: u64 = 1024;

/// Image size ceiling in 1 KiB blocks (1 GiB), keeps the suite fast.
pub const MAX_IMAGE_KIB: u64 = 1024 * 1024;

/// Always enough for a valid FAT32.
pub const CLUSTER_COUNT: u64 = 100_000;

const ALL_EXECUTE: u32 = 0o111;

const GENERATE_SH_TEMPLATE: &str = r#"#!/usr/bin/env bash
mkdir -p "$1/dir/dir2"
dd if=/dev/zero bs={half_block_size} count=1 > "$1/small_file"
dd if=/dev/zero bs={half_block_size} count=3 > "$1/dir/file"
dd if=/dev/zero bs={block_size} count={bpg_plus_one} > "$1/dir/dir2/large_file"
"#;

/// Knobs for one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub cluster_count: u64,
    pub max_image_kib: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cluster_count: CLUSTER_COUNT,
            max_image_kib: MAX_IMAGE_KIB,
        }
    }
}

/// One usable FAT geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCase {
    pub sector_size: u32,
    pub sectors_per_cluster: u32,
    /// Image size in 1 KiB blocks, as mkfs.fat expects it.
    pub image_kib: u64,
}

impl TestCase {
    /// Plan a case, or `None` if the pair is filtered out.
    pub fn plan(sector_size: u32, sectors_per_cluster: u32, config: &GeneratorConfig) -> Option<Self> {
        let block_size = u64::from(sector_size) * u64::from(sectors_per_cluster);
        let image_kib = config.cluster_count.checked_mul(block_size)? / 1024;
        if block_size < MIN_BLOCK_SIZE || image_kib > config.max_image_kib {
            return None;
        }
        Some(Self {
            sector_size,
            sectors_per_cluster,
            image_kib,
        })
    }

    pub fn block_size(&self) -> u64 {
        u64::from(self.sector_size) * u64::from(self.sectors_per_cluster)
    }

    /// One block bitmap block covers 8 blocks per byte.
    pub fn blocks_per_group(&self) -> u64 {
        self.block_size() * 8
    }

    pub fn dir_name(&self) -> String {
        format!(
            "{}-{}{}",
            self.sector_size, self.sectors_per_cluster, FIXTURE_SUFFIX
        )
    }

    pub fn mkfs_args(&self) -> String {
        format!(
            "-C -F 32 -s {} -S {} {}",
            self.sectors_per_cluster, self.sector_size, self.image_kib
        )
    }

    pub fn generate_script(&self) -> String {
        let block_size = self.block_size();
        GENERATE_SH_TEMPLATE
            .replace("{half_block_size}", &(block_size / 2).to_string())
            .replace("{block_size}", &block_size.to_string())
            .replace("{bpg_plus_one}", &(self.blocks_per_group() + 1).to_string())
    }

    /// Write this case under `out_dir`, replacing any earlier copy.
    pub fn materialize(&self, out_dir: &Path) -> Result<PathBuf> {
        let dir_path = out_dir.join(self.dir_name());
        if dir_path.exists() {
            println!("Overwriting \"{}\"", self.dir_name());
            fs::remove_dir_all(&dir_path)
                .with_context(|| format!("removing old fixture '{}'", dir_path.display()))?;
        }
        fs::create_dir_all(&dir_path)
            .with_context(|| format!("creating fixture '{}'", dir_path.display()))?;

        fs::write(dir_path.join(MKFS_ARGS), self.mkfs_args())?;

        let script_path = dir_path.join(GENERATE_SCRIPT);
        fs::write(&script_path, self.generate_script())?;
        let mut perms = fs::metadata(&script_path)?.permissions();
        perms.set_mode(perms.mode() | ALL_EXECUTE);
        fs::set_permissions(&script_path, perms)
            .with_context(|| format!("marking '{}' executable", script_path.display()))?;

        Ok(dir_path)
    }
}

/// Cross product of the given geometries, minus the filtered pairs.
pub fn plan(sector_sizes: &[u32], sectors_per_clusters: &[u32], config: &GeneratorConfig) -> Vec<TestCase> {
    sector_sizes
        .iter()
        .flat_map(|&sector_size| {
            sectors_per_clusters
                .iter()
                .filter_map(move |&spc| TestCase::plan(sector_size, spc, config))
        })
        .collect()
}

/// Plan and write every fixture; returns the created directories.
pub fn generate(
    out_dir: &Path,
    sector_sizes: &[u32],
    sectors_per_clusters: &[u32],
    config: &GeneratorConfig,
) -> Result<Vec<PathBuf>> {
    let cases = plan(sector_sizes, sectors_per_clusters, config);
    tracing::info!(count = cases.len(), out_dir = %out_dir.display(), "generating fixtures");
    cases.iter().map(|case| case.materialize(out_dir)).collect()
}
