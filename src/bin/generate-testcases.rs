use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use convert_harness::generator::{self, GeneratorConfig, SECTORS_PER_CLUSTERS, SECTOR_SIZES};
use convert_harness::logging;

fn usage() -> &'static str {
    "Usage:\n  generate-testcases [-v] [--max-image-kib <n>] [--cluster-count <n>] [out-dir]\n\nWrites one <sector-size>-<sectors-per-cluster>.test directory per usable FAT geometry."
}

fn parse_args(args: &[String]) -> Result<(u8, GeneratorConfig, PathBuf)> {
    let mut verbosity = 0;
    let mut config = GeneratorConfig::default();
    let mut out_dir = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => bail!(usage()),
            "-v" => verbosity += 1,
            "--max-image-kib" => config.max_image_kib = parse_number(iter.next(), arg)?,
            "--cluster-count" => config.cluster_count = parse_number(iter.next(), arg)?,
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{}", usage()),
            path if out_dir.is_none() => out_dir = Some(PathBuf::from(path)),
            _ => bail!(usage()),
        }
    }

    let out_dir = match out_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    Ok((verbosity, config, out_dir))
}

fn parse_number(value: Option<&String>, flag: &str) -> Result<u64> {
    let value = value.with_context(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .with_context(|| format!("invalid value '{value}' for {flag}"))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (verbosity, config, out_dir) = parse_args(&args)?;
    logging::init(verbosity);

    let created = generator::generate(&out_dir, SECTOR_SIZES, SECTORS_PER_CLUSTERS, &config)
        .with_context(|| format!("generating fixtures in '{}'", out_dir.display()))?;

    for dir in &created {
        println!("  {}", dir.display());
    }
    println!("Generated {} fixture(s)", created.len());
    Ok(())
}
