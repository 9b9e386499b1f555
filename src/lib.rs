//! Verification harness for in-place FAT to ext4 image conversion.
//!
//! The converter itself is a black box. This crate builds FAT images from
//! fixture directories, runs the converter on a copy, checks the result with
//! `fsck.ext4` and compares both images' contents with `rsync`:
//!
//! - **Tool invocation** - [`process::Cmd`] with timeouts and pluggable success policies
//! - **Captured output** - [`capture::CapturedOutput`], written only for failing fixtures
//! - **Mounting** - [`mount::MountStrategy`] per host, scoped [`mount::ImageMounter`]
//! - **Fixture generation** - [`generator`] expands FAT geometries into `.test` dirs
//! - **Discovery and execution** - [`fixture::discover`] and [`runner::FixtureRunner`]
//!
//! # Architecture
//!
//! ```text
//! generate-testcases ──> <S>-<C>.test/{mkfs.args, generate.sh}
//!                                   │
//! convert-harness ── discover ──────┘
//!     │
//!     └── FixtureRunner (per fixture, sequential)
//!             ├── Cmd: mkfs.fat, generate.sh, converter, fsck.ext4, rsync
//!             └── ImageMounter ── MountStrategy (loop | hdiutil + ext4fuse)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use convert_harness::{discover, host_strategy, FixtureRunner, HarnessConfig};
//!
//! let config = HarnessConfig::from_env()?;
//! let strategy = host_strategy()?;
//! let runner = FixtureRunner::new(&config, strategy.as_ref());
//! for fixture in discover(&config.fixtures_root)? {
//!     runner.run(&fixture)?;
//! }
//! ```

pub mod capture;
pub mod checks;
pub mod config;
pub mod error;
pub mod fixture;
pub mod generator;
pub mod logging;
pub mod mount;
pub mod preflight;
pub mod process;
pub mod runner;

pub use config::HarnessConfig;
pub use error::ToolError;
pub use fixture::{discover, Fixture, ImageSource};
pub use mount::{host_strategy, FsType, MountStrategy};
pub use runner::{FixtureRunner, SuiteReport};
