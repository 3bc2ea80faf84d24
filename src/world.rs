use std::error::Error;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::capture::CapturePipe;
use crate::config::{
    HarnessSettings, RunConfig, DEFAULT_FORMATTER_OUT_PATH, DEFAULT_FORMATTER_PATH,
    DEFAULT_MODULE_LOADER,
};
use crate::report::{collect_results, AllureReport};
use crate::runner::{CliRunner, Invocation, RunOutcome, RunnerFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Invoking,
    Succeeded,
    Failed,
    Collecting,
    Done,
}

impl RunPhase {
    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Invoking => "invoking",
            RunPhase::Succeeded => "succeeded",
            RunPhase::Failed => "failed",
            RunPhase::Collecting => "collecting",
            RunPhase::Done => "done",
        }
    }
}

#[derive(Debug)]
pub enum RunError {
    /// The CLI finished but reported `success: false`.
    NonZeroExit,
    /// The CLI returned an error or panicked.
    Threw(RunnerFailure),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::NonZeroExit => write!(f, "CLI exited with non-zero"),
            RunError::Threw(error) => write!(f, "{error}"),
        }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::NonZeroExit => None,
            RunError::Threw(error) => error.source(),
        }
    }
}

/// Panic raised inside the runner, carried as an ordinary error.
#[derive(Debug)]
pub struct RunnerPanic {
    pub message: String,
}

impl std::fmt::Display for RunnerPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runner panicked: {}", self.message)
    }
}

impl Error for RunnerPanic {}

#[derive(Debug, Default)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<RunError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Renders `error` followed by its numbered `source()` chain.
///
/// Never empty: an error with a blank message falls back to its `Debug` form.
pub fn render_error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    if rendered.trim().is_empty() {
        rendered = format!("{error:?}");
    }
    if rendered.trim().is_empty() {
        rendered = "runner failed without a message".to_owned();
    }
    let mut source = error.source();
    if source.is_some() {
        rendered.push_str("\n\nCaused by:");
    }
    let mut index = 0usize;
    while let Some(cause) = source {
        let _ = write!(rendered, "\n    {index}: {cause}");
        index += 1;
        source = cause.source();
    }
    rendered
}

/// Drives one CLI run against a prepared fixture directory and keeps the
/// outcome plus the collected Allure results for assertions.
///
/// The fixture (feature files, step definitions, formatter module) must
/// already exist under `tmp_dir`. Runs against the same directory must not
/// overlap.
pub struct AllureWorld<R> {
    pub tmp_dir: PathBuf,
    pub formatter_path: String,
    pub formatter_out_path: String,
    pub module_loader: String,
    pub extra_args: Vec<String>,
    pub result: RunResult,
    pub allure_report: AllureReport,
    runner: R,
    phase: RunPhase,
}

impl<R: CliRunner> AllureWorld<R> {
    pub fn new(runner: R) -> Self {
        Self {
            tmp_dir: PathBuf::new(),
            formatter_path: DEFAULT_FORMATTER_PATH.to_owned(),
            formatter_out_path: DEFAULT_FORMATTER_OUT_PATH.to_owned(),
            module_loader: DEFAULT_MODULE_LOADER.to_owned(),
            extra_args: Vec::new(),
            result: RunResult::default(),
            allure_report: AllureReport::default(),
            runner,
            phase: RunPhase::Idle,
        }
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = tmp_dir.into();
        self
    }

    pub fn with_settings(mut self, settings: HarnessSettings) -> Self {
        if let Some(path) = settings.formatter_path {
            self.formatter_path = path;
        }
        if let Some(path) = settings.formatter_out_path {
            self.formatter_out_path = path;
        }
        if let Some(loader) = settings.module_loader {
            self.module_loader = loader;
        }
        self.extra_args = settings.extra_args;
        self
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig::new(
            &self.tmp_dir,
            &self.formatter_path,
            &self.formatter_out_path,
            &self.module_loader,
            &self.extra_args,
        )
    }

    /// Runs the CLI once and replaces `result` and `allure_report`.
    ///
    /// Runner failures are recorded in `result.error`; results are collected
    /// whatever the outcome. A panicking runner is caught and recorded too,
    /// but the process-wide panic hook still prints its message to the real
    /// stderr before that happens.
    pub fn run(&mut self) {
        self.phase = RunPhase::Idle;
        let config = self.run_config();
        let pipe = CapturePipe::new();
        let invocation = Invocation {
            argv: config.argv.clone(),
            cwd: config.cwd.clone(),
            stdout: pipe.writer(),
        };

        self.enter(RunPhase::Invoking);
        let runner = &mut self.runner;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(invocation)))
            .unwrap_or_else(|payload| Err(Box::new(panic_to_error(payload)) as RunnerFailure));

        let mut stderr = String::new();
        let error = match outcome {
            Ok(RunOutcome { success: true }) => None,
            Ok(RunOutcome { success: false }) => Some(RunError::NonZeroExit),
            Err(error) => {
                stderr = render_error_chain(&*error);
                Some(RunError::Threw(error))
            }
        };
        self.enter(if error.is_none() {
            RunPhase::Succeeded
        } else {
            RunPhase::Failed
        });
        if let Some(error) = &error {
            tracing::debug!(%error, "runner did not succeed");
        }

        let stdout = pipe.close();

        self.enter(RunPhase::Collecting);
        self.allure_report = collect_results(&config.results_dir);
        self.result = RunResult {
            stdout,
            stderr,
            error,
        };
        self.enter(RunPhase::Done);
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = self.phase.label(), to = phase.label(), "run phase");
        self.phase = phase;
    }
}

fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> RunnerPanic {
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    };
    RunnerPanic { message }
}

#[cfg(test)]
#[path = "tests/world_tests.rs"]
mod tests;
