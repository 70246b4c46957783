//! Measurement tool integration.
//!
//! [`runner`] invokes the external page-load/power harness as a child
//! process with a hard timeout. [`locator`] finds the run directory the tool
//! produced and [`projection`] reduces its result file to the public
//! [`MeasurementResult`] schema. None of this touches the job store; the
//! API crate's measurement task glues the pieces to a job.

pub mod locator;
pub mod projection;
pub mod runner;

use std::path::PathBuf;
use std::time::Duration;

pub use locator::{locate_result_file, target_dir_name, ExtractError};
pub use projection::{extract_result, MeasurementResult};
pub use runner::{run_tool, RunnerError, ToolRun};

/// Name of the result file the tool writes into each run directory.
pub const RESULT_FILE_NAME: &str = "browsertime.json";

/// Iterations per invocation. Fixed; one job is one page load.
pub const ITERATIONS: u32 = 1;

/// Default wall-clock limit for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// How to invoke the measurement tool and where it writes results.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Program followed by its leading arguments (e.g. `["npx", "browsertime"]`).
    pub command: Vec<String>,
    /// Tool configuration file, passed via `--config`.
    pub config_path: PathBuf,
    /// Root under which per-invocation and per-target directories live.
    pub results_root: PathBuf,
    /// Hard limit after which the tool is killed.
    pub timeout: Duration,
}

impl ToolConfig {
    /// Split a command line such as `npx browsertime` into program + args
    /// using shell quoting rules.
    pub fn parse_command(line: &str) -> Result<Vec<String>, shell_words::ParseError> {
        shell_words::split(line)
    }
}
