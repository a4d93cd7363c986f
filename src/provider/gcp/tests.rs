//! HTTP-level tests for the Google Cloud provider against a mock server.

use super::*;
use crate::access::{AccessConfig, ClusterConfig};
use crate::provider::ClusterStatus;
use crate::test_support::ScriptedRunner;
use rstest::rstest;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider(server: &MockServer) -> GcpProvider<ScriptedRunner> {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "tok\n", "");
    GcpProvider::new(
        GcloudTokenSource::new(runner, "gcloud"),
        Some(String::from("deployer@p1.iam.gserviceaccount.com")),
        GcpEndpoints {
            container: format!("{}/v1", server.uri()),
            storage: format!("{}/storage/v1", server.uri()),
            console: String::from("https://console.test"),
        },
    )
    .unwrap_or_else(|err| panic!("provider: {err}"))
}

fn handle() -> ClusterHandle {
    ClusterHandle::new("p1", "us-central1-a", "c1")
}

#[rstest]
#[tokio::test]
async fn create_cluster_posts_both_node_pools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/p1/locations/us-central1-a/clusters"))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(json!({
            "cluster": {
                "name": "c1",
                "initialClusterVersion": "1.17",
                "nodePools": [
                    {
                        "name": "gantry-operator",
                        "initialNodeCount": 1,
                        "config": {
                            "machineType": "n1-standard-2",
                            "serviceAccount": "deployer@p1.iam.gserviceaccount.com"
                        }
                    },
                    {
                        "name": "gantry-worker-on-demand",
                        "initialNodeCount": 1,
                        "autoscaling": { "enabled": true, "minNodeCount": 1, "maxNodeCount": 3 },
                        "config": {
                            "machineType": "n1-standard-4",
                            "labels": { "workload": "true", "nvidia.com/gpu": "present" },
                            "taints": [{ "key": "workload", "value": "true", "effect": "NO_SCHEDULE" }],
                            "accelerators": [{ "acceleratorCount": "1", "acceleratorType": "nvidia-tesla-t4" }]
                        }
                    }
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operation-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClusterConfig {
        access: AccessConfig::new("c1", "p1", "us-central1-a")
            .unwrap_or_else(|err| panic!("access: {err}")),
        instance_type: String::from("n1-standard-4"),
        min_instances: 1,
        max_instances: 3,
        accelerator_type: Some(String::from("nvidia-tesla-t4")),
    };
    let created = provider(&server)
        .await
        .create_cluster(&ClusterSpec::from_config(&config))
        .await
        .expect("create cluster");

    assert_eq!(created, handle());
}

#[rstest]
#[tokio::test]
async fn get_cluster_maps_status_endpoint_and_ca() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/p1/locations/us-central1-a/clusters/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "c1",
            "status": "RUNNING",
            "endpoint": "34.1.2.3",
            "masterAuth": { "clusterCaCertificate": "Q0E=" }
        })))
        .mount(&server)
        .await;

    let gcp = provider(&server).await;
    let snapshot = gcp.get_cluster(&handle()).await.expect("get cluster");

    assert_eq!(snapshot.status, ClusterStatus::Running);
    assert_eq!(snapshot.endpoint.as_deref(), Some("34.1.2.3"));

    let credentials = gcp
        .derive_credentials(&snapshot)
        .await
        .expect("credentials");
    assert_eq!(credentials.server, "https://34.1.2.3");
    assert_eq!(credentials.ca_certificate, "Q0E=");
    assert_eq!(credentials.token, "tok");
}

#[rstest]
#[tokio::test]
async fn provisioning_cluster_has_no_credentials_yet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/p1/locations/us-central1-a/clusters/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "PROVISIONING",
            "endpoint": ""
        })))
        .mount(&server)
        .await;

    let gcp = provider(&server).await;
    let snapshot = gcp.get_cluster(&handle()).await.expect("get cluster");
    let err = gcp
        .derive_credentials(&snapshot)
        .await
        .expect_err("no endpoint yet");

    assert_eq!(snapshot.status, ClusterStatus::Provisioning);
    assert_eq!(err, ProviderError::MissingClusterField { field: "endpoint" });
}

#[rstest]
#[tokio::test]
async fn api_errors_surface_google_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/projects/p1/locations/us-central1-a/clusters/c1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Not found: c1." }
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .await
        .delete_cluster(&handle())
        .await
        .expect_err("missing cluster");

    assert_eq!(
        err,
        ProviderError::Api {
            operation: String::from("delete cluster"),
            status: 404,
            message: String::from("Not found: c1."),
        }
    );
}

#[rstest]
#[case::owned(200, true)]
#[case::foreign(403, false)]
#[tokio::test]
async fn bucket_conflict_is_success_only_when_readable(#[case] get_status: u16, #[case] ok: bool) {
    let server = MockServer::start().await;
    let bucket = BucketName::derive("c1", "p1", "us-central1-a");
    Mock::given(method("POST"))
        .and(path("/storage/v1/b"))
        .and(query_param("project", "p1"))
        .and(body_partial_json(json!({
            "name": bucket.as_str(),
            "location": "us-central1",
            "iamConfiguration": { "uniformBucketLevelAccess": { "enabled": true } }
        })))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{bucket}")))
        .respond_with(ResponseTemplate::new(get_status))
        .mount(&server)
        .await;

    let result = provider(&server)
        .await
        .create_bucket(&BucketSpec {
            name: bucket.clone(),
            project: String::from("p1"),
            region: String::from("us-central1"),
        })
        .await;

    if ok {
        assert_eq!(result.expect("existing bucket is reused"), BucketState::AlreadyOwned);
    } else {
        assert_eq!(
            result.expect_err("collision"),
            ProviderError::BucketCollision {
                bucket: bucket.to_string()
            }
        );
    }
}

#[rstest]
#[tokio::test]
async fn delete_bucket_removes_every_object_first() {
    let server = MockServer::start().await;
    let bucket = BucketName::derive("c1", "p1", "us-central1-a");
    let objects = format!("/storage/v1/b/{bucket}/o");
    Mock::given(method("GET"))
        .and(path(objects.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "name": "state.json" }, { "name": "logs" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{objects}/state.json")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{objects}/logs")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/storage/v1/b/{bucket}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .await
        .delete_bucket(&bucket)
        .await
        .expect("bucket deleted");
}

#[rstest]
fn console_url_points_at_cluster_details() {
    let runner = ScriptedRunner::new();
    let gcp = GcpProvider::new(
        GcloudTokenSource::new(runner, "gcloud"),
        None,
        GcpEndpoints::default(),
    )
    .unwrap_or_else(|err| panic!("provider: {err}"));

    assert_eq!(
        gcp.console_url(&handle()),
        "https://console.cloud.google.com/kubernetes/clusters/details/us-central1-a/c1?project=p1"
    );
}
