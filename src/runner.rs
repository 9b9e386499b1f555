//! Per-fixture procedure and the sequential suite runner.
//!
//! Each fixture goes through the same stages:
//!
//! 1. purge stale `*.out.txt` / `*.err.txt`
//! 2. create a private temporary root
//! 3. obtain a FAT image (prebuilt, or mkfs.fat + generate.sh)
//! 4. copy it, since the converter works in place
//! 5. convert the copy
//! 6. `fsck.ext4 -n -f` the result
//! 7. mount both images read-only and rsync-compare them
//!
//! Captured tool output is flushed into the fixture directory only when a
//! stage fails. Mounts and the temporary root are released either way.

use anyhow::{Context, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::capture::CapturedOutput;
use crate::checks::{check_mkfs_fat_output, check_rsync_output, fsck_reported_errors, FSCK_ERRORS_MSG};
use crate::config::HarnessConfig;
use crate::error::ToolError;
use crate::fixture::{Fixture, ImageSource, MKFS_ARGS};
use crate::mount::{FsType, ImageMounter, MountStrategy};
use crate::process::Cmd;

const EXT4_IMAGE: &str = "ext4.img";
const GENERATED_FAT_IMAGE: &str = "fat.img";

/// Host tools a fixture run invokes besides the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTools {
    pub mkfs_fat: PathBuf,
    pub fsck_ext4: PathBuf,
    pub rsync: PathBuf,
}

impl Default for HostTools {
    /// Bare names, resolved through `PATH`.
    fn default() -> Self {
        Self {
            mkfs_fat: PathBuf::from("mkfs.fat"),
            fsck_ext4: PathBuf::from("fsck.ext4"),
            rsync: PathBuf::from("rsync"),
        }
    }
}

/// Runs fixtures against one converter binary.
pub struct FixtureRunner<'a> {
    converter: &'a Path,
    timeout: Duration,
    strategy: &'a dyn MountStrategy,
    tools: HostTools,
}

impl<'a> FixtureRunner<'a> {
    pub fn new(config: &'a HarnessConfig, strategy: &'a dyn MountStrategy) -> Self {
        Self {
            converter: &config.converter,
            timeout: config.tool_timeout,
            strategy,
            tools: HostTools::default(),
        }
    }

    pub fn with_tools(mut self, tools: HostTools) -> Self {
        self.tools = tools;
        self
    }

    /// Run one fixture end to end.
    pub fn run(&self, fixture: &Fixture) -> Result<()> {
        CapturedOutput::clean(&fixture.dir)?;
        let mut captured = CapturedOutput::new(&fixture.dir);

        let result = self.run_stages(fixture, &mut captured);
        if result.is_err() {
            if let Err(e) = captured.flush() {
                tracing::warn!("could not save tool output for {}: {e:#}", fixture.id);
            }
        }
        result
    }

    fn run_stages(&self, fixture: &Fixture, captured: &mut CapturedOutput) -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("convert-harness-")
            .tempdir()
            .context("creating temporary directory")?;
        let mounter = ImageMounter::new(self.strategy, temp_dir.path(), self.timeout)?;

        let fat_image = match &fixture.source {
            ImageSource::Prebuilt(image) => image.clone(),
            ImageSource::Recipe {
                mkfs_args,
                generate_script,
            } => self.create_fat_image(captured, &mounter, temp_dir.path(), mkfs_args, generate_script)?,
            ImageSource::Malformed(reason) => {
                return Err(ToolError::FixtureAuthoring {
                    name: "fixture layout".to_string(),
                    reason: reason.clone(),
                }
                .into());
            }
        };

        let ext4_image = temp_dir.path().join(EXT4_IMAGE);
        fs::copy(&fat_image, &ext4_image).with_context(|| {
            format!(
                "copying '{}' to '{}'",
                fat_image.display(),
                ext4_image.display()
            )
        })?;

        self.convert(captured, &ext4_image)?;
        self.check_ext4(captured, &ext4_image)?;
        self.compare_contents(captured, &mounter, &fat_image, &ext4_image)
    }

    fn create_fat_image(
        &self,
        captured: &mut CapturedOutput,
        mounter: &ImageMounter<'_>,
        temp_dir: &Path,
        mkfs_args: &Path,
        generate_script: &Path,
    ) -> Result<PathBuf> {
        let image = temp_dir.join(GENERATED_FAT_IMAGE);
        let args = read_mkfs_args(mkfs_args)?;

        Cmd::new(&self.tools.mkfs_fat)
            .name("mkfs.fat")
            .arg_path(&image)
            .args(args)
            .timeout(self.timeout)
            .check_output(check_mkfs_fat_output)
            .run(captured)
            .context("formatting FAT image with mkfs.fat")?;

        mounter.with_mount(captured, &image, FsType::Vfat, false, |captured, mount_point| {
            Cmd::new(generate_script)
                .name("gen script")
                .arg_path(mount_point)
                .timeout(self.timeout)
                .run(captured)
                .context("running generation script")?;
            Ok(())
        })?;

        Ok(image)
    }

    fn convert(&self, captured: &mut CapturedOutput, image: &Path) -> Result<()> {
        Cmd::new(self.converter)
            .name("ofs-convert")
            .arg_path(image)
            .timeout(self.timeout)
            .run(captured)
            .with_context(|| format!("converting image with '{}'", self.converter.display()))?;
        Ok(())
    }

    fn check_ext4(&self, captured: &mut CapturedOutput, image: &Path) -> Result<()> {
        Cmd::new(&self.tools.fsck_ext4)
            .name("fsck.ext4")
            .args(["-n", "-f"])
            .arg_path(image)
            .timeout(self.timeout)
            .error_msg(FSCK_ERRORS_MSG)
            .on_error(fsck_reported_errors)
            .run(captured)
            .context("checking converted image with fsck.ext4")?;
        Ok(())
    }

    fn compare_contents(
        &self,
        captured: &mut CapturedOutput,
        mounter: &ImageMounter<'_>,
        fat_image: &Path,
        ext4_image: &Path,
    ) -> Result<()> {
        mounter.with_mount(captured, fat_image, FsType::Vfat, true, |captured, fat_mount| {
            mounter.with_mount(captured, ext4_image, FsType::Ext4, true, |captured, ext4_mount| {
                rsync_cmd(&self.tools.rsync, fat_mount, ext4_mount)
                    .timeout(self.timeout)
                    .run(captured)
                    .context("comparing FAT and ext4 contents with rsync")?;
                Ok(())
            })
        })
    }
}

/// Formatter flags from `path`, split the way a POSIX shell would.
fn read_mkfs_args(path: &Path) -> Result<Vec<String>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))?;
    let args = shell_words::split(&text).map_err(|e| ToolError::FixtureAuthoring {
        name: MKFS_ARGS.to_string(),
        reason: format!("cannot parse formatter flags: {e}"),
    })?;
    Ok(args)
}

/// rsync dry run listing every difference between the two trees.
fn rsync_cmd(rsync: &Path, fat_mount: &Path, ext4_mount: &Path) -> Cmd {
    // Without the trailing slash rsync compares the directory itself
    // instead of its contents.
    let mut source = OsString::from(fat_mount.as_os_str());
    if !source.to_string_lossy().ends_with('/') {
        source.push("/");
    }
    Cmd::new(rsync)
        .name("rsync")
        .args([
            "--dry-run",
            "--itemize-changes",
            "--archive",
            "--checksum",
            "--no-perms",
            "--no-owner",
            "--no-group",
            "--delete",
            "--exclude=/lost+found",
        ])
        .arg(source)
        .arg_path(ext4_mount)
        .check_output(check_rsync_output)
}

/// Result of one fixture.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureOutcome {
    pub id: String,
    pub dir: PathBuf,
    pub passed: bool,
    /// Failure chain, outermost context first.
    pub error: Option<String>,
    /// Logical name of the tool whose failure ended the run, if any.
    pub failed_tool: Option<String>,
    /// The fixture, not the converter, is at fault.
    pub fixture_authoring: bool,
    pub duration_ms: u64,
}

/// Results of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub outcomes: Vec<FixtureOutcome>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing report '{}'", path.display()))
    }
}

/// Fixtures whose identifier contains `filter` (all when `None`).
pub fn select<'f>(fixtures: &'f [Fixture], filter: Option<&str>) -> Vec<&'f Fixture> {
    fixtures
        .iter()
        .filter(|f| filter.map_or(true, |needle| f.id.contains(needle)))
        .collect()
}

/// Run `fixtures` one after another, printing a line per fixture.
pub fn run_suite(runner: &FixtureRunner<'_>, fixtures: &[&Fixture]) -> SuiteReport {
    let mut report = SuiteReport::default();
    for fixture in fixtures {
        let start = Instant::now();
        tracing::info!(
            id = %fixture.id,
            dir = %fixture.dir.display(),
            prebuilt = fixture.is_prebuilt(),
            "running fixture"
        );
        let result = runner.run(fixture);
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(id = %fixture.id, ok = result.is_ok(), duration_ms, "fixture finished");

        let outcome = match result {
            Ok(()) => {
                println!("[ok] {}", fixture.id);
                FixtureOutcome {
                    id: fixture.id.clone(),
                    dir: fixture.dir.clone(),
                    passed: true,
                    error: None,
                    failed_tool: None,
                    fixture_authoring: false,
                    duration_ms,
                }
            }
            Err(err) => {
                let fixture_authoring = is_fixture_authoring(&err);
                let label = if fixture_authoring { "FIXTURE" } else { "FAIL" };
                println!("[{label}] {}: {err:#}", fixture.id);
                FixtureOutcome {
                    id: fixture.id.clone(),
                    dir: fixture.dir.clone(),
                    passed: false,
                    error: Some(format!("{err:#}")),
                    failed_tool: failed_tool(&err),
                    fixture_authoring,
                    duration_ms,
                }
            }
        };
        report.outcomes.push(outcome);
    }

    println!(
        "\n{} passed, {} failed",
        report.passed(),
        report.failed()
    );
    report
}

fn failed_tool(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ToolError>())
        .map(|tool_err| tool_err.tool().to_string())
}

fn is_fixture_authoring(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ToolError>()
            .is_some_and(ToolError::is_fixture_authoring)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{discover, FAT_IMAGE, GENERATE_SCRIPT, MKFS_ARGS};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Mounts nothing; the runner tests below never get that far.
    struct NoMount;

    impl MountStrategy for NoMount {
        fn name(&self) -> &'static str {
            "none"
        }

        fn mount_cmd(&self, _: &Path, _: FsType, _: bool, _: &Path) -> Cmd {
            Cmd::new("false").error_msg("mounting disabled in tests")
        }

        fn release_cmd(&self, _: FsType, _: &Path) -> Cmd {
            Cmd::new("true")
        }

        fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
            &[]
        }
    }

    fn script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn prebuilt_fixture(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(FAT_IMAGE), vec![0u8; 4096]).unwrap();
        dir
    }

    fn recipe_fixture(root: &Path, name: &str, mkfs_args: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MKFS_ARGS), mkfs_args).unwrap();
        script(&dir.join(GENERATE_SCRIPT), "echo hello > \"$1/small_file\"");
        dir
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Mounts by logging; the mount point stays a plain directory.
    struct LoggingMount {
        log: PathBuf,
    }

    impl LoggingMount {
        fn log_event(&self, event: &str, fs_type: FsType) -> Cmd {
            Cmd::new("sh")
                .name(event)
                .args(["-c", "echo \"$1 $2\" >> \"$0\""])
                .arg_path(&self.log)
                .args([event, fs_type.name()])
        }
    }

    impl MountStrategy for LoggingMount {
        fn name(&self) -> &'static str {
            "logging"
        }

        fn mount_cmd(&self, _: &Path, fs_type: FsType, _: bool, _: &Path) -> Cmd {
            self.log_event("mount", fs_type)
        }

        fn release_cmd(&self, fs_type: FsType, _: &Path) -> Cmd {
            self.log_event("release", fs_type)
        }

        fn required_tools(&self) -> &'static [(&'static str, &'static str)] {
            &[]
        }
    }

    /// Stand-ins for the converter and host tools, all under one temp dir.
    struct FakeHost {
        tmp: TempDir,
        fixtures_root: PathBuf,
        converter: PathBuf,
        tools: HostTools,
        strategy: LoggingMount,
    }

    impl FakeHost {
        fn new(fsck_body: &str, rsync_body: &str) -> Self {
            let tmp = TempDir::new().unwrap();
            let bin = tmp.path().join("bin");
            fs::create_dir_all(&bin).unwrap();
            let fixtures_root = tmp.path().join("tests");
            fs::create_dir_all(&fixtures_root).unwrap();

            let converter = bin.join("ofs-convert");
            script(&converter, "exit 0");
            let tools = HostTools {
                mkfs_fat: bin.join("mkfs.fat"),
                fsck_ext4: bin.join("fsck.ext4"),
                rsync: bin.join("rsync"),
            };
            // Log the flags after the image path, then create the image.
            script(
                &tools.mkfs_fat,
                "img=$1\nshift\nprintf '[%s]' \"$@\" > \"$(dirname \"$0\")/mkfs.argv\"\n: > \"$img\"",
            );
            script(&tools.fsck_ext4, fsck_body);
            script(&tools.rsync, rsync_body);

            let strategy = LoggingMount {
                log: tmp.path().join("mounts.log"),
            };
            Self {
                tmp,
                fixtures_root,
                converter,
                tools,
                strategy,
            }
        }

        fn fixtures_root(&self) -> &Path {
            &self.fixtures_root
        }

        fn config(&self) -> HarnessConfig {
            HarnessConfig::new(&self.converter, self.fixtures_root())
        }

        fn runner<'a>(&'a self, config: &'a HarnessConfig) -> FixtureRunner<'a> {
            FixtureRunner::new(config, &self.strategy).with_tools(self.tools.clone())
        }

        fn mkfs_argv_log(&self) -> PathBuf {
            self.tmp.path().join("bin").join("mkfs.argv")
        }

        fn mount_events(&self) -> Vec<String> {
            fs::read_to_string(&self.strategy.log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn rsync_source_gets_trailing_slash() {
        let cmd = rsync_cmd(Path::new("rsync"), Path::new("/tmp/x/mnt/vfat"), Path::new("/tmp/x/mnt/ext4"));
        let argv: Vec<String> = cmd.argv().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(argv[0], "rsync");
        assert!(argv.contains(&"--exclude=/lost+found".to_string()));
        assert_eq!(&argv[argv.len() - 2..], ["/tmp/x/mnt/vfat/", "/tmp/x/mnt/ext4"]);

        let slashed = rsync_cmd(Path::new("rsync"), Path::new("/mnt/vfat/"), Path::new("/mnt/ext4"));
        let argv: Vec<String> = slashed.argv().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(argv[argv.len() - 2], "/mnt/vfat/");
    }

    #[test]
    fn converter_failure_flushes_diagnostics() {
        let tmp = TempDir::new().unwrap();
        let converter = tmp.path().join("ofs-convert");
        script(&converter, "echo 'allocating extents'\necho 'cluster 7 out of range' >&2\nexit 1");
        let fixtures_root = tmp.path().join("tests");
        let dir = prebuilt_fixture(&fixtures_root, "broken.test");
        fs::write(dir.join("rsync.out.txt"), "stale").unwrap();

        let config = HarnessConfig::new(&converter, &fixtures_root);
        let runner = FixtureRunner::new(&config, &NoMount);
        let fixtures = discover(&fixtures_root).unwrap();

        let err = runner.run(&fixtures[0]).unwrap_err();

        assert!(format!("{err:#}").contains("converting image"));
        assert!(!dir.join("rsync.out.txt").exists(), "stale output purged");
        assert_eq!(
            fs::read_to_string(dir.join("ofs-convert.err.txt")).unwrap(),
            "cluster 7 out of range\n"
        );
        assert_eq!(
            fs::read_to_string(dir.join("ofs-convert.out.txt")).unwrap(),
            "allocating extents\n"
        );
    }

    #[test]
    fn malformed_fixture_is_authoring_error() {
        let tmp = TempDir::new().unwrap();
        let fixtures_root = tmp.path().join("tests");
        fs::create_dir_all(fixtures_root.join("empty.test")).unwrap();

        let config = HarnessConfig::new("/bin/true", &fixtures_root);
        let runner = FixtureRunner::new(&config, &NoMount);
        let fixtures = discover(&fixtures_root).unwrap();

        let report = run_suite(&runner, &select(&fixtures, None));

        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[0].fixture_authoring);
        assert!(report.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .contains("neither fat.img"));
    }

    #[test]
    fn formatter_failure_names_the_stage() {
        let host = FakeHost::new("exit 0", "exit 0");
        script(&host.tools.mkfs_fat, "echo 'mkfs.fat: unknown option' >&2\nexit 1");
        let dir = recipe_fixture(host.fixtures_root(), "bad-args.test", "--definitely-not-a-flag");

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        let err = runner.run(&fixtures[0]).unwrap_err();
        assert!(format!("{err:#}").contains("formatting FAT image with mkfs.fat"));
        assert_eq!(
            fs::read_to_string(dir.join("mkfs.fat.err.txt")).unwrap(),
            "mkfs.fat: unknown option\n"
        );
        assert_eq!(host.mount_events(), Vec::<String>::new());
    }

    #[test]
    fn passing_fixture_leaves_no_diagnostics() {
        // fsck exit 1 only says errors were corrected.
        let host = FakeHost::new("exit 1", "printf '.d..t...... ./\\n'");
        let dir = recipe_fixture(host.fixtures_root(), "ok.test", "-C -F 32 -s 1 -S 1024 100000");
        fs::write(dir.join("fsck.ext4.err.txt"), "stale").unwrap();

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        runner.run(&fixtures[0]).unwrap();
        runner.run(&fixtures[0]).unwrap();

        assert_eq!(dir_entries(&dir), [GENERATE_SCRIPT, MKFS_ARGS]);
        let one_run = [
            "mount vfat",
            "release vfat",
            "mount vfat",
            "mount ext4",
            "release ext4",
            "release vfat",
        ];
        assert_eq!(host.mount_events(), [one_run, one_run].concat());
    }

    #[test]
    fn rsync_difference_fails_and_releases_mounts() {
        let host = FakeHost::new(
            "exit 0",
            "printf '.d..t...... ./\\n>f+++++++++ small_file\\n'",
        );
        let dir = recipe_fixture(host.fixtures_root(), "diff.test", "-C -F 32 -s 1 -S 1024 100000");

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        let err = runner.run(&fixtures[0]).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("comparing FAT and ext4 contents with rsync"));
        assert!(message.contains("rsync reported differences"));
        assert!(fs::read_to_string(dir.join("rsync.out.txt"))
            .unwrap()
            .contains("small_file"));

        let events = host.mount_events();
        let mounts = events.iter().filter(|e| e.starts_with("mount")).count();
        let releases = events.iter().filter(|e| e.starts_with("release")).count();
        assert_eq!(mounts, 3);
        assert_eq!(releases, 3);
    }

    #[test]
    fn fsck_error_bits_fail_the_fixture() {
        let host = FakeHost::new("echo 'inode 12 has bad extent'\nexit 4", "exit 0");
        let dir = prebuilt_fixture(host.fixtures_root(), "corrupt.test");

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        let report = run_suite(&runner, &select(&fixtures, None));

        let outcome = &report.outcomes[0];
        assert!(!outcome.passed);
        assert!(!outcome.fixture_authoring);
        assert_eq!(outcome.failed_tool.as_deref(), Some("fsck.ext4"));
        assert!(outcome.error.as_deref().unwrap().contains(FSCK_ERRORS_MSG));
        assert_eq!(
            fs::read_to_string(dir.join("fsck.ext4.out.txt")).unwrap(),
            "inode 12 has bad extent\n"
        );
        assert!(host.mount_events().is_empty(), "never got to the compare stage");
    }

    #[test]
    fn mkfs_args_keep_quoted_values_together() {
        let host = FakeHost::new("exit 0", "exit 0");
        recipe_fixture(
            host.fixtures_root(),
            "label.test",
            "-C -F 32 -n \"MY DISK\" 100000\n",
        );

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        runner.run(&fixtures[0]).unwrap();
        assert_eq!(
            fs::read_to_string(host.mkfs_argv_log()).unwrap(),
            "[-C][-F][32][-n][MY DISK][100000]"
        );
    }

    #[test]
    fn unparsable_mkfs_args_are_authoring_errors() {
        let host = FakeHost::new("exit 0", "exit 0");
        recipe_fixture(host.fixtures_root(), "open-quote.test", "-n \"MY DISK");

        let config = host.config();
        let runner = host.runner(&config);
        let fixtures = discover(host.fixtures_root()).unwrap();

        let report = run_suite(&runner, &select(&fixtures, None));

        let outcome = &report.outcomes[0];
        assert!(outcome.fixture_authoring);
        assert_eq!(outcome.failed_tool.as_deref(), Some(MKFS_ARGS));
        assert!(!host.mkfs_argv_log().exists(), "formatter never ran");
    }

    #[test]
    fn select_filters_by_substring() {
        let fixtures: Vec<Fixture> = ["test_fat_variants__1024_1", "test_fat_variants__512_2", "test_long_names"]
            .iter()
            .map(|id| Fixture {
                id: id.to_string(),
                dir: PathBuf::from(id),
                source: ImageSource::Malformed(String::new()),
            })
            .collect();

        assert_eq!(select(&fixtures, None).len(), 3);
        let picked = select(&fixtures, Some("fat_variants"));
        assert_eq!(picked.len(), 2);
        assert!(select(&fixtures, Some("nothing")).is_empty());
    }

    #[test]
    fn report_serializes_outcomes() {
        let tmp = TempDir::new().unwrap();
        let report = SuiteReport {
            outcomes: vec![FixtureOutcome {
                id: "test_x".into(),
                dir: PathBuf::from("x.test"),
                passed: false,
                error: Some("fsck.ext4: fsck.ext4 reported errors in converted image".into()),
                failed_tool: Some("fsck.ext4".into()),
                fixture_authoring: false,
                duration_ms: 12,
            }],
        };
        let path = tmp.path().join("report.json");
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["outcomes"][0]["id"], "test_x");
        assert_eq!(value["outcomes"][0]["passed"], false);
        assert_eq!(value["outcomes"][0]["failed_tool"], "fsck.ext4");
        assert!(!report.success());
    }
}
