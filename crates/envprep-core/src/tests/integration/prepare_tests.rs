#![cfg(test)]

use std::sync::{Arc, Mutex};

use log::{Log, Metadata, Record};

use crate::kernel::error::Result;
use crate::plugin_system::{ProvideMode, Provider};
use crate::project::Project;
use crate::requirement::RequirementOptions;
use crate::stage_manager::{
    prepare_execute_without_interaction, prepare_in_stages, prepare_without_interaction, PrepareOptions,
    PrepareResult, StageStep,
};
use crate::storage::LocalStateFile;
use crate::tests::integration::common::{
    base_environ, environ_with, project_dir, project_with, registry_with, CallLog, TestProvider,
};
use crate::utils::verbose::VerboseLogger;

fn run_counting_stages(
    project: Arc<Project>,
    options: PrepareOptions,
) -> Result<(PrepareResult, usize)> {
    let mut stage = prepare_in_stages(project, &base_environ(), options)?;
    let mut executed = 0;
    loop {
        executed += 1;
        match stage.execute()? {
            StageStep::Continue(next) => stage = next,
            StageStep::Done(result) => return Ok((result, executed)),
        }
    }
}

#[test]
fn test_already_set_variable_succeeds() -> Result<()> {
    let dir = project_dir();
    let project = project_with(dir.path(), registry_with(Vec::new()), &[("FOO", "env_var")]);

    let result = prepare_without_interaction(project, &environ_with(&[("FOO", "bar")]), PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    let environ = result.environ().expect("success carries an environment");
    assert_eq!(environ.get("FOO").map(String::as_str), Some("bar"));
    assert_eq!(result.statuses().len(), 1);
    assert!(result.statuses()[0].is_satisfied());

    let exec_info = result.command_exec_info().expect("project has a command");
    assert_eq!(exec_info.args, vec!["python", "main.py"]);
    assert_eq!(exec_info.env, *environ);
    Ok(())
}

#[test]
fn test_unset_variable_fails_with_explanation() -> Result<()> {
    let dir = project_dir();
    let project = project_with(dir.path(), registry_with(Vec::new()), &[("FOO", "env_var")]);

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.failed());
    assert_eq!(
        result.errors(),
        &[
            "missing requirement to run this project: FOO".to_string(),
            "  Environment variable FOO is not set.".to_string(),
        ]
    );
    assert_eq!(result.statuses().len(), 1);
    assert!(!result.statuses()[0].is_satisfied());
    Ok(())
}

#[test]
fn test_empty_variable_treated_as_unset() -> Result<()> {
    let dir = project_dir();
    let project = project_with(dir.path(), registry_with(Vec::new()), &[("FOO", "env_var")]);

    let result = prepare_without_interaction(project, &environ_with(&[("FOO", "")]), PrepareOptions::new())?;

    assert!(result.failed());
    let status = result.status_for_env_var("FOO").expect("FOO has a status");
    assert_eq!(status.status_description(), "Environment variable FOO is not set.");
    Ok(())
}

#[test]
fn test_keep_going_retries_until_success() -> Result<()> {
    let dir = project_dir();
    let flaky = Arc::new(TestProvider::new("flaky").succeed_on_call(2));
    let project = project_with(
        dir.path(),
        registry_with(vec![flaky.clone() as Arc<dyn Provider>]),
        &[("SERVICE_URL", "flaky")],
    );

    let options = PrepareOptions::new().with_keep_going_until_success(true);
    let (result, executed) = run_counting_stages(project, options)?;

    assert!(result.is_success(), "{:?}", result.errors());
    assert!(executed > 1);
    assert_eq!(flaky.calls(), 2);
    assert_eq!(
        result.environ().and_then(|env| env.get("SERVICE_URL")).map(String::as_str),
        Some("provided-by-flaky")
    );
    Ok(())
}

#[test]
fn test_without_keep_going_first_failure_is_final() -> Result<()> {
    let dir = project_dir();
    let flaky = Arc::new(TestProvider::new("flaky").succeed_on_call(2));
    let project = project_with(
        dir.path(),
        registry_with(vec![flaky.clone() as Arc<dyn Provider>]),
        &[("SERVICE_URL", "flaky")],
    );

    let (result, executed) = run_counting_stages(project, PrepareOptions::new())?;

    assert!(result.failed());
    assert_eq!(executed, 1);
    assert_eq!(flaky.calls(), 1);
    // Provider diagnostics come before the summary lines
    assert_eq!(
        result.errors(),
        &[
            "flaky is not ready yet (attempt 1)".to_string(),
            "missing requirement to run this project: SERVICE_URL".to_string(),
            "  Environment variable SERVICE_URL is not set.".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn test_whitelist_limits_providing() -> Result<()> {
    let dir = project_dir();
    let call_log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let plain = Arc::new(TestProvider::new("plain").with_call_log(Arc::clone(&call_log)));
    let project = project_with(
        dir.path(),
        registry_with(vec![plain as Arc<dyn Provider>]),
        &[("A", "plain"), ("B", "plain")],
    );

    let options = PrepareOptions::new().with_provide_whitelist(["B"]);
    let result = prepare_without_interaction(project, &base_environ(), options)?;

    assert_eq!(*call_log.lock().unwrap(), vec!["B"]);
    assert!(result.status_for_env_var("B").is_some_and(|s| s.is_satisfied()));
    // A was left alone, so it is still reported as missing
    assert!(result.failed());
    assert_eq!(result.errors()[0], "missing requirement to run this project: A");
    assert_eq!(result.errors().len(), 2);
    Ok(())
}

#[test]
fn test_providers_run_in_provide_dependency_order() -> Result<()> {
    let dir = project_dir();
    let call_log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let app = TestProvider::new("app")
        .needs_to_provide(&["DB_URL"])
        .with_call_log(Arc::clone(&call_log));
    let db = TestProvider::new("db").with_call_log(Arc::clone(&call_log));
    let project = project_with(
        dir.path(),
        registry_with(vec![Arc::new(app) as Arc<dyn Provider>, Arc::new(db)]),
        &[("APP", "app"), ("DB_URL", "db")],
    );

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    assert_eq!(*call_log.lock().unwrap(), vec!["DB_URL", "APP"]);
    // Statuses keep declaration order
    let order: Vec<&str> = result.statuses().iter().map(|s| s.env_var()).collect();
    assert_eq!(order, vec!["APP", "DB_URL"]);
    Ok(())
}

#[test]
fn test_provide_cycle_reported_as_failure() -> Result<()> {
    let dir = project_dir();
    let project = project_with(
        dir.path(),
        registry_with(vec![
            Arc::new(TestProvider::new("a").needs_to_provide(&["B"])) as Arc<dyn Provider>,
            Arc::new(TestProvider::new("b").needs_to_provide(&["A"])),
        ]),
        &[("A", "a"), ("B", "b")],
    );

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.failed());
    assert_eq!(result.errors(), &["Dependency cycle between: A, B".to_string()]);
    assert_eq!(result.statuses().len(), 2);
    Ok(())
}

#[test]
fn test_default_option_supplies_value() -> Result<()> {
    let dir = project_dir();
    let project = Arc::new(
        Project::builder(dir.path())
            .env_var_requirement("PORT", RequirementOptions::new().with("default", "8080"))
            .build(),
    );

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    assert_eq!(
        result.environ().and_then(|env| env.get("PORT")).map(String::as_str),
        Some("8080")
    );
    assert!(result.command_exec_info().is_none());
    Ok(())
}

#[test]
fn test_check_mode_changes_nothing() -> Result<()> {
    let dir = project_dir();
    let project = Arc::new(
        Project::builder(dir.path())
            .env_var_requirement("PORT", RequirementOptions::new().with("default", "8080"))
            .build(),
    );

    let options = PrepareOptions::new().with_mode(ProvideMode::Check);
    let result = prepare_without_interaction(project, &base_environ(), options)?;

    assert!(result.failed());
    let state = LocalStateFile::load_for_directory(dir.path())?;
    assert!(!state.path().exists());
    Ok(())
}

#[test]
fn test_configured_value_from_local_state() -> Result<()> {
    let dir = project_dir();
    let mut state = LocalStateFile::load_for_directory(dir.path())?;
    state.set_variable("API_TOKEN", "s3cret");
    state.save()?;

    let project = project_with(dir.path(), registry_with(Vec::new()), &[("API_TOKEN", "env_var")]);
    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    let mut caller_env = base_environ();
    result.update_environ(&mut caller_env);
    assert_eq!(caller_env.get("API_TOKEN").map(String::as_str), Some("s3cret"));
    assert!(caller_env.contains_key("PROJECT_DIR"));
    Ok(())
}

#[test]
fn test_undeclared_dependency_is_added_and_provided() -> Result<()> {
    let dir = project_dir();
    let mut state = LocalStateFile::load_for_directory(dir.path())?;
    state.set_variable("DB_HOST", "localhost");
    state.save()?;

    let call_log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let app = TestProvider::new("app")
        .needs_to_provide(&["DB_HOST"])
        .with_call_log(Arc::clone(&call_log));
    let project = project_with(
        dir.path(),
        registry_with(vec![Arc::new(app) as Arc<dyn Provider>]),
        &[("APP", "app")],
    );

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    let order: Vec<&str> = result.statuses().iter().map(|s| s.env_var()).collect();
    assert_eq!(order, vec!["APP", "DB_HOST"]);
    assert_eq!(
        result.environ().and_then(|env| env.get("DB_HOST")).map(String::as_str),
        Some("localhost")
    );
    assert_eq!(*call_log.lock().unwrap(), vec!["APP"]);
    Ok(())
}

#[derive(Default)]
struct CapturingLogger {
    lines: Mutex<Vec<String>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines.lock().unwrap().push(record.args().to_string());
    }

    fn flush(&self) {}
}

#[test]
fn test_verbose_output_reaches_injected_logger() -> Result<()> {
    let dir = project_dir();
    let project = Arc::new(
        Project::builder(dir.path())
            .env_var_requirement("PORT", RequirementOptions::new().with("default", "8080"))
            .build(),
    );
    let verbose = VerboseLogger::new();
    let capture = Arc::new(CapturingLogger::default());
    let _scope = verbose.push(capture.clone());

    let stage = prepare_in_stages(project, &base_environ(), PrepareOptions::new().with_verbose(verbose.clone()))?;
    let result = prepare_execute_without_interaction(stage)?;

    assert!(result.is_success());
    let lines = capture.lines.lock().unwrap().clone();
    assert!(lines.iter().any(|line| line == "Providing PORT with provider 'env_var'"), "{:?}", lines);
    assert!(lines.iter().any(|line| line == "Setting PORT to 8080 from default"), "{:?}", lines);
    Ok(())
}

#[test]
fn test_provider_error_reported_as_provide_failure() -> Result<()> {
    let dir = project_dir();
    let broken = TestProvider::new("broken").provide_fails_with("socket refused");
    let project = project_with(
        dir.path(),
        registry_with(vec![Arc::new(broken) as Arc<dyn Provider>]),
        &[("QUEUE_URL", "broken")],
    );

    let result = prepare_without_interaction(project, &base_environ(), PrepareOptions::new())?;

    assert!(result.failed());
    assert_eq!(
        result.errors(),
        &[
            "Provider 'broken' failed to provide 'QUEUE_URL': Error: socket refused".to_string(),
            "missing requirement to run this project: QUEUE_URL".to_string(),
            "  Environment variable QUEUE_URL is not set.".to_string(),
        ]
    );
    Ok(())
}
