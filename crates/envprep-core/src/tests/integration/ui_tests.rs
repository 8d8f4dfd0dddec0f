#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::env_var::VALUE_KEY;
use crate::plugin_system::Provider;
use crate::project::Project;
use crate::stage_manager::{prepare_in_stages, PrepareOptions, PrepareResult, PrepareStage};
use crate::storage::LocalStateFile;
use crate::tests::integration::common::{base_environ, project_dir, project_with, registry_with, TestProvider};
use crate::ui_bridge::{drive_stages, prepare_with_ui, PrepareUi};

/// Front end that answers every plain variable from a fixed script
struct ScriptedUi {
    answers: BTreeMap<String, String>,
    offered: Vec<Vec<String>>,
}

impl ScriptedUi {
    fn new(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            offered: Vec::new(),
        }
    }
}

impl PrepareUi for ScriptedUi {
    fn name(&self) -> &str {
        "scripted"
    }

    fn drive(&mut self, _project: &Project, stage: Box<dyn PrepareStage>) -> Result<PrepareResult> {
        let answers = &self.answers;
        let offered = &mut self.offered;
        drive_stages(stage, |_, context| {
            offered.push(context.statuses().iter().map(|s| s.env_var().to_string()).collect());
            for status in context.statuses() {
                if status.provider().id() != "env_var" {
                    continue;
                }
                if let Some(answer) = answers.get(status.env_var()) {
                    let values = BTreeMap::from([(VALUE_KEY.to_string(), answer.clone())]);
                    context.set_config_values(status, &values)?;
                }
            }
            Ok(())
        })
    }
}

#[test]
fn test_configured_answer_satisfies_requirement() -> Result<()> {
    let dir = project_dir();
    let project = project_with(dir.path(), registry_with(Vec::new()), &[("API_TOKEN", "env_var")]);
    let mut ui = ScriptedUi::new(&[("API_TOKEN", "abc123")]);

    let result = prepare_with_ui(project, &base_environ(), &mut ui, PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    assert_eq!(
        result.environ().and_then(|env| env.get("API_TOKEN")).map(String::as_str),
        Some("abc123")
    );
    // The answer is remembered for the next run
    let state = LocalStateFile::load_for_directory(dir.path())?;
    assert_eq!(state.variable("API_TOKEN"), Some("abc123"));
    Ok(())
}

#[test]
fn test_blocked_requirement_splits_configuration_into_stages() -> Result<()> {
    let dir = project_dir();
    let needs_b = TestProvider::new("needs_b").needs_to_configure(&["B"]);
    let project = project_with(
        dir.path(),
        registry_with(vec![Arc::new(needs_b) as Arc<dyn Provider>]),
        &[("A", "needs_b"), ("C", "env_var"), ("B", "env_var")],
    );
    let mut ui = ScriptedUi::new(&[("B", "b-value"), ("C", "c-value")]);

    let result = prepare_with_ui(project, &base_environ(), &mut ui, PrepareOptions::new())?;

    assert!(result.is_success(), "{:?}", result.errors());
    assert_eq!(ui.offered, vec![vec!["B", "A"], vec!["C"]]);
    let order: Vec<&str> = result.statuses().iter().map(|s| s.env_var()).collect();
    assert_eq!(order, vec!["A", "C", "B"]);
    assert!(result.statuses().iter().all(|s| s.is_satisfied()));
    Ok(())
}

#[test]
fn test_unanswered_requirement_fails_through_ui() -> Result<()> {
    let dir = project_dir();
    let project = project_with(dir.path(), registry_with(Vec::new()), &[("API_TOKEN", "env_var")]);
    let mut ui = ScriptedUi::new(&[]);

    let result = prepare_with_ui(project, &base_environ(), &mut ui, PrepareOptions::new())?;

    assert!(result.failed());
    assert_eq!(ui.offered.len(), 1);
    assert_eq!(result.errors()[0], "missing requirement to run this project: API_TOKEN");
    Ok(())
}

#[test]
fn test_configure_error_names_provider_and_variable() {
    let dir = project_dir();
    let stubborn = TestProvider::new("stubborn").configure_fails_with("read-only store");
    let project = project_with(
        dir.path(),
        registry_with(vec![Arc::new(stubborn) as Arc<dyn Provider>]),
        &[("QUEUE_URL", "stubborn")],
    );

    let outcome = prepare_in_stages(project, &base_environ(), PrepareOptions::new()).and_then(|stage| {
        drive_stages(stage, |_, context| {
            let values = BTreeMap::from([(VALUE_KEY.to_string(), "amqp://localhost".to_string())]);
            for status in context.statuses() {
                context.set_config_values(status, &values)?;
            }
            Ok(())
        })
    });

    match outcome {
        Err(Error::PluginSystem(PluginSystemError::ConfigureFailed {
            provider_id,
            env_var,
            message,
        })) => {
            assert_eq!(provider_id, "stubborn");
            assert_eq!(env_var, "QUEUE_URL");
            assert_eq!(message, "Error: read-only store");
        }
        other => panic!("expected a configure failure, got {:?}", other.map(|r| r.failed())),
    }
}
