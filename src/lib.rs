//! In-process harness for behaviour-testing CLI runs that report through
//! Allure. [`AllureWorld::run`] drives the CLI once against a prepared
//! fixture directory, captures its stdout, and gathers every
//! `*-result.json` the reporter wrote into an [`AllureReport`].

pub mod capture;
pub mod config;
pub mod report;
pub mod runner;
pub mod world;

pub use capture::{CapturePipe, PipeWriter};
pub use config::{HarnessSettings, RunConfig, SettingsError};
pub use report::{collect_results, AllureReport, ArtifactError, ArtifactFailure, TestResult};
pub use runner::{CliRunner, Invocation, RunOutcome, RunnerFailure};
pub use world::{render_error_chain, AllureWorld, RunError, RunPhase, RunResult, RunnerPanic};
