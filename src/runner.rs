use std::path::PathBuf;

use crate::capture::PipeWriter;

/// Error raised by a runner invocation that did not complete normally.
pub type RunnerFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything the CLI needs for one in-process run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub stdout: PipeWriter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
}

impl RunOutcome {
    pub fn passed() -> Self {
        Self { success: true }
    }

    pub fn failed() -> Self {
        Self { success: false }
    }
}

/// A behaviour-testing CLI that can be driven in the caller's process.
pub trait CliRunner {
    fn run(&mut self, invocation: Invocation) -> Result<RunOutcome, RunnerFailure>;
}

impl<F> CliRunner for F
where
    F: FnMut(Invocation) -> Result<RunOutcome, RunnerFailure>,
{
    fn run(&mut self, invocation: Invocation) -> Result<RunOutcome, RunnerFailure> {
        self(invocation)
    }
}
