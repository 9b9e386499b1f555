//! Deferred tool output for post-mortem inspection.
//!
//! Every tool run records its stdout/stderr here. Nothing touches the
//! fixture directory until [`CapturedOutput::flush`] is called, which the
//! runner only does when a fixture fails. Passing fixtures stay clean.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const OUT_SUFFIX: &str = ".out.txt";
const ERR_SUFFIX: &str = ".err.txt";

/// Output accumulated for one fixture run.
#[derive(Debug)]
pub struct CapturedOutput {
    dir: PathBuf,
    entries: Vec<(PathBuf, Vec<u8>)>,
}

impl CapturedOutput {
    /// Start an empty accumulator whose files will land in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Vec::new(),
        }
    }

    /// Remove diagnostics left behind by a previous failing run.
    pub fn clean(dir: &Path) -> Result<usize> {
        let mut removed = 0;
        for entry in
            fs::read_dir(dir).with_context(|| format!("reading fixture '{}'", dir.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !(name.ends_with(OUT_SUFFIX) || name.ends_with(ERR_SUFFIX)) {
                continue;
            }
            fs::remove_file(&path)
                .with_context(|| format!("removing stale diagnostic '{}'", path.display()))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Record a tool's stdout and stderr under its logical name.
    ///
    /// Empty streams are skipped.
    pub fn record(&mut self, name: &str, stdout: &[u8], stderr: &[u8]) {
        self.push(name, ".out", stdout);
        self.push(name, ".err", stderr);
    }

    fn push(&mut self, name: &str, stem_suffix: &str, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let path = self.dir.join(format!("{name}{stem_suffix}.txt"));
        self.entries.push((path, bytes.to_vec()));
    }

    /// Destination paths recorded so far, in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(path, _)| path.as_path())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every recorded entry to disk.
    ///
    /// Entries are written in recording order, so a tool that ran more than
    /// once leaves the output of its last run.
    pub fn flush(&self) -> Result<()> {
        for (path, bytes) in &self.entries {
            fs::write(path, bytes)
                .with_context(|| format!("writing tool output '{}'", path.display()))?;
        }
        Ok(())
    }
}
