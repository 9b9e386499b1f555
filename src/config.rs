//! Harness configuration from argv or the environment.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::process::DEFAULT_TOOL_TIMEOUT;

pub const CONVERTER_ENV: &str = "OFS_CONVERT";
pub const TESTS_DIR_ENV: &str = "OFS_CONVERT_TESTS_DIR";
pub const TOOL_TIMEOUT_ENV: &str = "OFS_CONVERT_TOOL_TIMEOUT";

/// Everything a suite run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Converter binary, invoked as `<converter> <image>`.
    pub converter: PathBuf,
    pub fixtures_root: PathBuf,
    pub tool_timeout: Duration,
    /// Only run fixtures whose identifier contains this.
    pub filter: Option<String>,
}

impl HarnessConfig {
    /// Build from positional arguments.
    pub fn new(converter: impl Into<PathBuf>, fixtures_root: impl Into<PathBuf>) -> Self {
        Self {
            converter: converter.into(),
            fixtures_root: fixtures_root.into(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            filter: None,
        }
    }

    /// Build from `OFS_CONVERT` and `OFS_CONVERT_TESTS_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// `Ok(None)` when the converter or fixtures root is not configured.
    pub fn try_from_env() -> Result<Option<Self>> {
        if std::env::var_os(CONVERTER_ENV).is_none() || std::env::var_os(TESTS_DIR_ENV).is_none() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let converter = lookup(CONVERTER_ENV)
            .with_context(|| format!("{CONVERTER_ENV} is not set"))?;
        let fixtures_root =
            lookup(TESTS_DIR_ENV).with_context(|| format!("{TESTS_DIR_ENV} is not set"))?;
        let mut config = Self::new(converter, fixtures_root);
        config.tool_timeout = timeout_from(lookup(TOOL_TIMEOUT_ENV))?;
        Ok(config)
    }

    /// Apply `OFS_CONVERT_TOOL_TIMEOUT` if present.
    pub fn with_env_timeout(mut self) -> Result<Self> {
        self.tool_timeout = timeout_from(std::env::var_os(TOOL_TIMEOUT_ENV))?;
        Ok(self)
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }
}

fn timeout_from(value: Option<OsString>) -> Result<Duration> {
    let Some(value) = value else {
        return Ok(DEFAULT_TOOL_TIMEOUT);
    };
    let text = value.to_string_lossy();
    let secs: u64 = text
        .trim()
        .parse()
        .with_context(|| format!("invalid {TOOL_TIMEOUT_ENV} '{text}', expected whole seconds"))?;
    if secs == 0 {
        bail!("{TOOL_TIMEOUT_ENV} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
