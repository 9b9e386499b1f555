use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use convert_harness::runner::{run_suite, select};
use convert_harness::{discover, host_strategy, logging, preflight, FixtureRunner, HarnessConfig};

fn usage() -> &'static str {
    "Usage:\n  convert-harness [-v|-vv] [--list] [--filter <substr>] [--report <file>] [--skip-preflight] <converter> <fixtures-root>\n  convert-harness [options]    (reads OFS_CONVERT and OFS_CONVERT_TESTS_DIR)\n\nOFS_CONVERT_TOOL_TIMEOUT overrides the per-tool timeout in seconds."
}

#[derive(Debug, Default)]
struct Options {
    verbosity: u8,
    list: bool,
    skip_preflight: bool,
    filter: Option<String>,
    report: Option<PathBuf>,
    positional: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => bail!(usage()),
            "-v" => opts.verbosity += 1,
            "-vv" => opts.verbosity += 2,
            "--list" => opts.list = true,
            "--skip-preflight" => opts.skip_preflight = true,
            "--filter" => {
                let value = iter.next().context("--filter requires a value")?;
                opts.filter = Some(value.clone());
            }
            "--report" => {
                let value = iter.next().context("--report requires a path")?;
                opts.report = Some(PathBuf::from(value));
            }
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{}", usage()),
            _ => opts.positional.push(arg.clone()),
        }
    }
    Ok(opts)
}

fn load_config(opts: &Options) -> Result<HarnessConfig> {
    let config = match opts.positional.as_slice() {
        [] => HarnessConfig::from_env().context("no positional arguments given")?,
        [converter, fixtures_root] => {
            HarnessConfig::new(converter, fixtures_root).with_env_timeout()?
        }
        _ => bail!(usage()),
    };
    Ok(config.with_filter(opts.filter.clone()))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = parse_args(&args)?;
    logging::init(opts.verbosity);

    let config = load_config(&opts)?;
    let fixtures = discover(&config.fixtures_root)
        .with_context(|| format!("discovering fixtures under '{}'", config.fixtures_root.display()))?;
    let selected = select(&fixtures, config.filter.as_deref());

    if opts.list {
        for fixture in &selected {
            println!("{}", fixture.id);
        }
        return Ok(());
    }

    if selected.is_empty() {
        bail!(
            "no fixtures matched under '{}'",
            config.fixtures_root.display()
        );
    }

    let strategy = host_strategy()?;
    if !opts.skip_preflight {
        preflight::check_host(&config.converter, strategy.as_ref())?;
    }

    println!(
        "Running {} fixture(s) from {} ({} mounts, {}s tool timeout)\n",
        selected.len(),
        config.fixtures_root.display(),
        strategy.name(),
        config.tool_timeout.as_secs()
    );

    let runner = FixtureRunner::new(&config, strategy.as_ref());
    let report = run_suite(&runner, &selected);

    if let Some(path) = &opts.report {
        report.write_json(path)?;
    }

    if !report.success() {
        std::process::exit(1);
    }
    Ok(())
}
