//! Tests for installer script execution.

use super::*;
use crate::test_support::ScriptedRunner;
use rstest::{fixture, rstest};

#[fixture]
fn access() -> AccessConfig {
    AccessConfig::new("c1", "p1", "us-central1-a").unwrap_or_else(|err| panic!("access: {err}"))
}

fn request(copy_out: Vec<CopyOut>) -> ScriptRequest {
    ScriptRequest {
        image: String::from("gantry/installer:0.1"),
        command: String::from(INFO_SCRIPT),
        env: BTreeMap::from([(String::from("GANTRY_ZONE"), String::from("us-central1-a"))]),
        credentials: Some(Utf8PathBuf::from("/home/me/key.json")),
        copy_out,
    }
}

fn debug_copy() -> CopyOut {
    CopyOut {
        container_path: String::from("/out/bundle.tgz"),
        host_dir: Utf8PathBuf::from("/work"),
    }
}

#[rstest]
fn existing_target_passes_only_coordinates(access: AccessConfig) {
    let env = script_environment(ScriptTarget::Existing(&access));

    assert_eq!(env.get("GANTRY_CLUSTER_NAME").map(String::as_str), Some("c1"));
    assert_eq!(env.get("GANTRY_REGION").map(String::as_str), Some("us-central1"));
    assert!(!env.contains_key("GANTRY_BUCKET"));
    assert!(!env.contains_key("GANTRY_INSTANCE_TYPE"));
}

#[rstest]
fn new_target_adds_shape_and_bucket(access: AccessConfig) {
    let config = ClusterConfig {
        access,
        instance_type: String::from("n1-standard-4"),
        min_instances: 0,
        max_instances: 3,
        accelerator_type: Some(String::from("nvidia-tesla-t4")),
    };
    let bucket = config.access.bucket_name();

    let env = script_environment(ScriptTarget::New {
        config: &config,
        bucket: &bucket,
    });

    assert_eq!(env.get("GANTRY_BUCKET"), Some(&bucket.to_string()));
    assert_eq!(env.get("GANTRY_MIN_INSTANCES").map(String::as_str), Some("0"));
    assert_eq!(env.get("GANTRY_MAX_INSTANCES").map(String::as_str), Some("3"));
    assert_eq!(
        env.get("GANTRY_ACCELERATOR_TYPE").map(String::as_str),
        Some("nvidia-tesla-t4")
    );
}

#[rstest]
#[case::plain("cluster: c1\noperator: 1.2.3.4\n", Some("https://1.2.3.4"))]
#[case::padded("  operator:   34.5.6.7  \n", Some("https://34.5.6.7"))]
#[case::already_https("operator: https://1.2.3.4\n", Some("https://1.2.3.4"))]
#[case::first_wins("operator: 1.1.1.1\noperator: 2.2.2.2\n", Some("https://1.1.1.1"))]
#[case::blank("operator: \n", None)]
#[case::absent("cluster: c1\n", None)]
fn operator_endpoint_is_read_from_prefixed_line(#[case] output: &str, #[case] expected: Option<&str>) {
    assert_eq!(parse_operator_endpoint(output).as_deref(), expected);
}

#[rstest]
#[tokio::test]
async fn docker_runs_attached_and_removes_container() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_output(Some(0), "operator: 1.2.3.4\n", "");
    runner.push_success();
    let runtime = DockerRuntime::new(runner.clone(), "docker");

    let output = runtime
        .run_script(&request(Vec::new()))
        .await
        .expect("script runs");

    assert!(output.succeeded());
    assert_eq!(output.output, "operator: 1.2.3.4\n");

    let calls: Vec<String> = runner
        .invocations()
        .iter()
        .map(|call| call.command_string())
        .collect();
    let [create, start, remove] = calls.as_slice() else {
        panic!("expected create, start, rm; got {calls:?}");
    };
    assert!(create.starts_with("docker create --name gantry-"), "{create}");
    assert!(create.contains("--env GANTRY_ZONE=us-central1-a"), "{create}");
    assert!(
        create.contains("--volume /home/me/key.json:/var/secrets/google/key.json:ro"),
        "{create}"
    );
    assert!(
        create.ends_with("--entrypoint /bin/bash gantry/installer:0.1 -c exec 2>&1\n/root/info.sh"),
        "{create}"
    );
    assert!(start.starts_with("docker start --attach gantry-"), "{start}");
    assert!(remove.starts_with("docker rm --force gantry-"), "{remove}");
}

#[rstest]
#[tokio::test]
async fn script_stderr_is_merged_before_the_script_runs() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_output(Some(0), "step 1\nwarning: slow\nstep 2\n", "");
    runner.push_success();
    let runtime = DockerRuntime::new(runner.clone(), "docker");

    let output = runtime
        .run_script(&request(Vec::new()))
        .await
        .expect("script runs");

    assert_eq!(output.output, "step 1\nwarning: slow\nstep 2\n");
    let calls = runner.invocations();
    let create = calls.first().expect("container created");
    let script = create
        .args
        .last()
        .map(|arg| arg.to_string_lossy().into_owned())
        .expect("script argument");
    let lines: Vec<&str> = script.lines().collect();
    assert_eq!(lines, vec!["exec 2>&1", "/root/info.sh"]);
}

#[rstest]
#[tokio::test]
async fn files_are_copied_out_even_when_the_script_fails() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_output(Some(3), "collecting\n", "kubectl failed\n");
    runner.push_failure(1);
    runner.push_success();
    let runtime = DockerRuntime::new(runner.clone(), "docker");

    let output = runtime
        .run_script(&request(vec![debug_copy()]))
        .await
        .expect("a failing script is still an output");

    assert_eq!(output.exit_code, Some(3));
    assert_eq!(output.output, "collecting\nkubectl failed\n");
    let calls = runner.invocations();
    assert_eq!(calls.len(), 4);
    assert!(
        calls
            .iter()
            .any(|call| call.command_string().ends_with(":/out/bundle.tgz /work")),
        "copy-out was not attempted: {calls:?}"
    );
}

#[rstest]
#[tokio::test]
async fn copy_failure_after_success_is_an_error() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();
    runner.push_failure(1);
    runner.push_success();
    let runtime = DockerRuntime::new(runner.clone(), "docker");

    let err = runtime
        .run_script(&request(vec![debug_copy()]))
        .await
        .expect_err("missing bundle");

    assert!(matches!(err, InstallerError::CopyOut { ref path, .. } if path == "/out/bundle.tgz"));
    assert_eq!(runner.invocations().len(), 4, "container must still be removed");
}

#[rstest]
#[tokio::test]
async fn create_failure_skips_start_and_removal() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(125), "", "Unable to find image\n");
    let runtime = DockerRuntime::new(runner.clone(), "docker");

    let err = runtime
        .run_script(&request(Vec::new()))
        .await
        .expect_err("create failed");

    assert_eq!(
        err,
        InstallerError::Container {
            step: "create",
            message: String::from("Unable to find image"),
        }
    );
    assert_eq!(runner.invocations().len(), 1);
}

#[rstest]
fn stopped_daemon_is_reported_as_unavailable() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(1), "", "Cannot connect to the Docker daemon");
    let runtime = DockerRuntime::new(runner, "docker");

    let message = runtime
        .check_available()
        .expect_err("daemon down")
        .to_string();
    assert!(message.contains("Cannot connect to the Docker daemon"), "{message}");
    assert!(message.contains("daemon is running"), "{message}");
}

#[rstest]
fn missing_binary_is_reported_as_unavailable() {
    let runtime = DockerRuntime::new(ScriptedRunner::new(), "docker");

    let err = runtime.check_available().expect_err("no docker");
    assert!(
        matches!(err, InstallerError::RuntimeUnavailable { ref message, .. } if message.contains("install Docker")),
        "{err}"
    );
}

#[rstest]
#[tokio::test]
async fn runner_adds_credentials_variable_when_key_is_mounted(access: AccessConfig) {
    let scripted = ScriptedRunner::new();
    scripted.push_success();
    scripted.push_success();
    scripted.push_success();
    let runtime = DockerRuntime::new(scripted.clone(), "docker");
    let installer = InstallerRunner::new(
        &runtime,
        "gantry/installer:0.1",
        Some(Utf8PathBuf::from("/home/me/key.json")),
    );

    installer
        .run(INFO_SCRIPT, ScriptTarget::Existing(&access), Vec::new())
        .await
        .expect("runs");

    let create = scripted
        .invocations()
        .first()
        .map(|call| call.command_string())
        .unwrap_or_default();
    assert!(
        create.contains("--env GOOGLE_APPLICATION_CREDENTIALS=/var/secrets/google/key.json"),
        "{create}"
    );
}
