use allure_world::{
    AllureWorld, CliRunner, HarnessSettings, Invocation, RunError, RunOutcome, RunnerFailure,
};
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

enum Finish {
    Success,
    Failure,
    Throw(&'static str),
}

/// Stand-in for the CLI: prints progress and writes one artifact per scenario
/// the way the Allure formatter does.
struct FakeCli {
    scenarios: Vec<(&'static str, Value)>,
    finish: Finish,
    calls: usize,
}

impl FakeCli {
    fn new(finish: Finish) -> Self {
        Self {
            scenarios: Vec::new(),
            finish,
            calls: 0,
        }
    }

    fn scenario(mut self, file_stem: &'static str, body: Value) -> Self {
        self.scenarios.push((file_stem, body));
        self
    }
}

impl CliRunner for FakeCli {
    fn run(&mut self, mut invocation: Invocation) -> Result<RunOutcome, RunnerFailure> {
        self.calls += 1;
        let formatter = invocation
            .argv
            .iter()
            .find_map(|arg| arg.strip_prefix("--format="))
            .ok_or("missing --format")?
            .to_owned();
        let out_dir = invocation.cwd.join("../out/allure-results");
        fs::create_dir_all(&out_dir)?;
        for (stem, body) in &self.scenarios {
            fs::write(out_dir.join(format!("{stem}-result.json")), body.to_string())?;
            writeln!(invocation.stdout, ".")?;
        }
        writeln!(invocation.stdout, "formatter {formatter}")?;
        match self.finish {
            Finish::Success => Ok(RunOutcome::passed()),
            Finish::Failure => Ok(RunOutcome::failed()),
            Finish::Throw(message) => Err(message.into()),
        }
    }
}

#[test]
fn success_collects_every_result_file() {
    let project = fixture_project("success-two");
    let cli = FakeCli::new(Finish::Success)
        .scenario("a1", json!({"status": "passed"}))
        .scenario("b2", json!({"status": "failed"}));
    let mut world = AllureWorld::new(cli).with_tmp_dir(&project);

    world.run();

    assert!(world.result.error.is_none());
    assert_eq!(world.result.stderr, "");
    assert!(world.result.stdout.starts_with(".\n.\nformatter "));
    let values = world
        .allure_report
        .test_results
        .iter()
        .cloned()
        .map(|result| result.into_value())
        .collect::<Vec<Value>>();
    assert_eq!(values.len(), 2);
    assert!(values.contains(&json!({"status": "passed"})));
    assert!(values.contains(&json!({"status": "failed"})));
}

#[test]
fn reported_failure_still_surfaces_partial_results() {
    let project = fixture_project("partial");
    let cli = FakeCli::new(Finish::Failure).scenario("only", json!({"status": "passed"}));
    let mut world = AllureWorld::new(cli).with_tmp_dir(&project);

    world.run();

    assert!(matches!(world.result.error, Some(RunError::NonZeroExit)));
    assert_eq!(world.result.stderr, "");
    assert_eq!(world.allure_report.len(), 1);
}

#[test]
fn thrown_error_is_rendered_and_results_collected() {
    let project = fixture_project("thrown");
    let cli = FakeCli::new(Finish::Throw("boom")).scenario("x", json!({"status": "broken"}));
    let mut world = AllureWorld::new(cli).with_tmp_dir(&project);

    world.run();

    let error = world.result.error.as_ref().expect("error recorded");
    assert_eq!(error.to_string(), "boom");
    assert!(world.result.stderr.contains("boom"));
    assert_eq!(world.allure_report.len(), 1);
}

#[test]
fn missing_results_directory_yields_empty_report() {
    let project = fixture_project("no-output");
    let mut world = AllureWorld::new(|_: Invocation| -> Result<RunOutcome, RunnerFailure> {
        Ok(RunOutcome::passed())
    })
    .with_tmp_dir(&project);

    world.run();

    assert!(world.result.error.is_none());
    assert!(world.allure_report.test_results.is_empty());
    assert!(world.allure_report.failures.is_empty());
}

#[test]
fn malformed_artifact_does_not_abort_run() {
    let project = fixture_project("malformed");
    let out_dir = results_dir(&project);
    fs::create_dir_all(&out_dir).expect("mkdir results");
    fs::write(out_dir.join("bad-result.json"), "{").expect("write bad");
    let cli = FakeCli::new(Finish::Success).scenario("good", json!({"status": "passed"}));
    let mut world = AllureWorld::new(cli).with_tmp_dir(&project);

    world.run();

    assert_eq!(world.allure_report.len(), 1);
    assert_eq!(world.allure_report.failures.len(), 1);
    assert!(world.allure_report.failures[0]
        .path
        .ends_with("bad-result.json"));
}

#[test]
fn second_run_replaces_previous_state() {
    let project = fixture_project("rerun");
    let mut finish_ok = true;
    let mut world = AllureWorld::new(
        move |mut invocation: Invocation| -> Result<RunOutcome, RunnerFailure> {
            write!(invocation.stdout, "run ok={finish_ok}")?;
            let outcome = if finish_ok {
                RunOutcome::passed()
            } else {
                RunOutcome::failed()
            };
            finish_ok = false;
            Ok(outcome)
        },
    )
    .with_tmp_dir(&project);

    world.run();
    assert!(world.result.is_success());
    assert_eq!(world.result.stdout, "run ok=true");

    let out_dir = results_dir(&project);
    fs::create_dir_all(&out_dir).expect("mkdir results");
    fs::write(out_dir.join("late-result.json"), r#"{"status":"passed"}"#).expect("write");

    world.run();
    assert!(!world.result.is_success());
    assert_eq!(world.result.stdout, "run ok=false");
    assert_eq!(world.allure_report.len(), 1);
}

#[test]
fn output_written_from_runner_threads_is_captured() {
    let project = fixture_project("threads");
    let mut world = AllureWorld::new(|invocation: Invocation| -> Result<RunOutcome, RunnerFailure> {
        let handles = (0..4)
            .map(|idx| {
                let mut stdout = invocation.stdout.clone();
                std::thread::spawn(move || {
                    let _ = write!(stdout, "[{idx}]");
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().map_err(|_| "writer thread panicked")?;
        }
        Ok(RunOutcome::passed())
    })
    .with_tmp_dir(&project);

    world.run();

    for idx in 0..4 {
        assert!(world.result.stdout.contains(&format!("[{idx}]")));
    }
}

#[test]
fn settings_redirect_results_directory() {
    let project = fixture_project("settings");
    fs::write(
        project.join("allure-world.toml"),
        "formatter_out_path = \"reports\"\n",
    )
    .expect("write settings");
    let reports = project.join("reports");
    fs::create_dir_all(&reports).expect("mkdir reports");
    fs::write(reports.join("s-result.json"), r#"{"name":"from settings"}"#).expect("write");

    let settings = HarnessSettings::discover(&project).expect("settings");
    let mut world = AllureWorld::new(|_: Invocation| -> Result<RunOutcome, RunnerFailure> {
        Ok(RunOutcome::passed())
    })
    .with_tmp_dir(&project)
    .with_settings(settings);

    world.run();

    assert_eq!(world.run_config().results_dir, reports);
    assert!(world.allure_report.find_by_name("from settings").is_some());
}

#[test]
fn fake_cli_is_invoked_once_per_run() {
    let project = fixture_project("calls");
    let mut world = AllureWorld::new(FakeCli::new(Finish::Success)).with_tmp_dir(&project);
    world.run();
    world.run();
    assert_eq!(world.runner().calls, 2);
}

fn fixture_project(name: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let project = std::env::temp_dir()
        .join(format!("allure-world-it-{name}-{ts}"))
        .join("project");
    fs::create_dir_all(project.join("support")).expect("mkdir support");
    fs::write(project.join("support/allure-formatter.ts"), "// formatter\n")
        .expect("write formatter");
    project
}

fn results_dir(project: &Path) -> PathBuf {
    project
        .parent()
        .expect("fixture parent")
        .join("out/allure-results")
}
