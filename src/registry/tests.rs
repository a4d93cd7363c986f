//! Tests for the environment registry and reconciliation.

use super::*;
use crate::test_support::ScriptedPrompter;
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const ENDPOINT: &str = "https://1.2.3.4";
const OTHER: &str = "https://5.6.7.8";

struct TempRegistry {
    _tmp: TempDir,
    registry: FileRegistry,
}

#[fixture]
fn temp_registry() -> TempRegistry {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("state/environments.toml"))
        .unwrap_or_else(|path| panic!("non-UTF-8 temp path: {}", path.display()));
    TempRegistry {
        _tmp: tmp,
        registry: FileRegistry::new(path),
    }
}

#[rstest]
fn reconcile_is_idempotent(temp_registry: TempRegistry) {
    let prompter = ScriptedPrompter::new();
    let reconciler = Reconciler::new(&temp_registry.registry, &prompter);

    let first = reconciler.reconcile("gcp", ENDPOINT, false).expect("first");
    let second = reconciler.reconcile("gcp", ENDPOINT, false).expect("second");

    assert_eq!(first, ReconcileOutcome::Created);
    assert_eq!(second, ReconcileOutcome::Unchanged);
    assert!(prompter.asked().is_empty(), "no prompt for an unchanged endpoint");
    assert_eq!(
        temp_registry.registry.find_by_endpoint(ENDPOINT).expect("find"),
        vec![EnvironmentRecord::new("gcp", ENDPOINT)]
    );
}

#[rstest]
#[case::confirmed(true, ReconcileOutcome::Updated, OTHER)]
#[case::declined(false, ReconcileOutcome::Declined, ENDPOINT)]
fn changed_endpoint_asks_before_repointing(
    temp_registry: TempRegistry,
    #[case] answer: bool,
    #[case] expected: ReconcileOutcome,
    #[case] stored: &str,
) {
    temp_registry
        .registry
        .upsert(EnvironmentRecord::new("gcp", ENDPOINT))
        .expect("seed");
    let prompter = ScriptedPrompter::new();
    prompter.push_confirm(answer);
    let reconciler = Reconciler::new(&temp_registry.registry, &prompter);

    let outcome = reconciler.reconcile("gcp", OTHER, false).expect("reconcile");

    assert_eq!(outcome, expected);
    assert_eq!(prompter.asked().len(), 1);
    let record = temp_registry
        .registry
        .get("gcp")
        .expect("get")
        .unwrap_or_else(|| panic!("gcp environment missing"));
    assert_eq!(record.operator_endpoint, stored);
}

#[rstest]
fn disallowed_prompt_repoints_without_asking(temp_registry: TempRegistry) {
    temp_registry
        .registry
        .upsert(EnvironmentRecord::new("gcp", ENDPOINT))
        .expect("seed");
    let prompter = ScriptedPrompter::new();
    let reconciler = Reconciler::new(&temp_registry.registry, &prompter);

    let outcome = reconciler.reconcile("gcp", OTHER, true).expect("reconcile");

    assert_eq!(outcome, ReconcileOutcome::Updated);
    assert!(prompter.asked().is_empty());
}

#[rstest]
fn local_environment_is_reserved(temp_registry: TempRegistry) {
    let prompter = ScriptedPrompter::new();
    let reconciler = Reconciler::new(&temp_registry.registry, &prompter);

    let err = reconciler
        .reconcile(LOCAL_ENVIRONMENT, ENDPOINT, true)
        .expect_err("local is reserved");

    assert_eq!(err, RegistryError::Reserved(String::from("local")));
}

#[rstest]
fn removing_an_endpoint_drops_every_alias_and_resets_default(temp_registry: TempRegistry) {
    let registry = &temp_registry.registry;
    for record in [
        EnvironmentRecord::new("gcp", ENDPOINT),
        EnvironmentRecord::new("staging", OTHER),
        EnvironmentRecord::new("prod", ENDPOINT),
    ] {
        registry.upsert(record).expect("seed");
    }
    registry.set_default("prod").expect("default");
    let prompter = ScriptedPrompter::new();

    let removal = Reconciler::new(registry, &prompter)
        .remove_by_endpoint(ENDPOINT)
        .expect("remove");

    assert_eq!(
        removal,
        Removal {
            names: vec![String::from("gcp"), String::from("prod")],
            default_reset: true,
        }
    );
    assert_eq!(
        registry.default_environment().expect("default"),
        Some(String::from(LOCAL_ENVIRONMENT))
    );
    assert!(registry.get("staging").expect("get").is_some());
}

#[rstest]
fn removing_an_unknown_endpoint_changes_nothing(temp_registry: TempRegistry) {
    let registry = &temp_registry.registry;
    registry
        .upsert(EnvironmentRecord::new("staging", OTHER))
        .expect("seed");
    registry.set_default("staging").expect("default");
    let prompter = ScriptedPrompter::new();

    let removal = Reconciler::new(registry, &prompter)
        .remove_by_endpoint(ENDPOINT)
        .expect("remove");

    assert_eq!(removal, Removal::default());
    assert_eq!(
        registry.default_environment().expect("default"),
        Some(String::from("staging"))
    );
}

#[rstest]
fn registry_file_is_plain_toml(temp_registry: TempRegistry) {
    let registry = &temp_registry.registry;
    registry
        .upsert(EnvironmentRecord::new("gcp", ENDPOINT))
        .expect("seed");
    registry.set_default("gcp").expect("default");

    let contents = std::fs::read_to_string(registry.path()).expect("read registry file");

    assert!(contents.contains("default_environment = \"gcp\""), "{contents}");
    assert!(contents.contains("[[environments]]"), "{contents}");
    assert!(contents.contains("operator_endpoint = \"https://1.2.3.4\""), "{contents}");
}

#[rstest]
#[case(ReconcileOutcome::Created, Some("has been configured"))]
#[case(ReconcileOutcome::Updated, Some("has been updated"))]
#[case(ReconcileOutcome::Unchanged, None)]
#[case(ReconcileOutcome::Declined, None)]
fn outcomes_describe_what_changed(#[case] outcome: ReconcileOutcome, #[case] fragment: Option<&str>) {
    let message = outcome.describe("gcp");
    match fragment {
        Some(text) => assert!(
            message.as_deref().is_some_and(|line| line.contains(text) && line.contains("--env gcp")),
            "{message:?}"
        ),
        None => assert!(message.is_none()),
    }
}
