//! Client for the operator's cluster status endpoint.

use std::fmt::Write as _;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::provider::BackendFuture;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while talking to the operator.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum OperatorError {
    /// The HTTP client could not be built.
    #[error("failed to configure the operator client: {0}")]
    Client(String),
    /// The operator could not be reached.
    #[error("unable to reach the operator at {endpoint}: {message}")]
    Unreachable {
        /// Operator URL.
        endpoint: String,
        /// Transport error text.
        message: String,
    },
    /// The operator answered with an error status.
    #[error("the operator at {endpoint} responded with HTTP {status}: {body}")]
    Status {
        /// Operator URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The response was not JSON.
    #[error("the operator at {endpoint} returned an unreadable response: {message}")]
    Decode {
        /// Operator URL.
        endpoint: String,
        /// Decoder error text.
        message: String,
    },
}

/// Cluster status reported by the operator.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorInfo {
    /// Response document as returned.
    pub raw: Value,
}

impl OperatorInfo {
    /// Renders the status for the terminal. Objects become aligned
    /// `key: value` lines with nested objects indented; anything else is
    /// pretty-printed JSON.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.raw {
            Value::Object(_) => render_value(&mut out, &self.raw, 0),
            other => out.push_str(&serde_json::to_string_pretty(other).unwrap_or_default()),
        }
        out.trim_end().to_owned()
    }
}

fn render_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let Value::Object(map) = value else {
        return;
    };
    let width = map.keys().map(String::len).max().unwrap_or_default();
    for (key, entry) in map {
        match entry {
            Value::Object(_) => {
                writeln!(out, "{indent}{key}:").ok();
                render_value(out, entry, depth + 1);
            }
            Value::String(text) => {
                writeln!(out, "{indent}{key:width$}  {text}").ok();
            }
            Value::Null => {
                writeln!(out, "{indent}{key:width$}  -").ok();
            }
            scalar => {
                writeln!(out, "{indent}{key:width$}  {scalar}").ok();
            }
        }
    }
}

/// Fetches cluster status from an operator.
pub trait OperatorClient: Send + Sync {
    /// Calls the operator's `/info` endpoint.
    fn cluster_info<'a>(&'a self, endpoint: &'a str) -> BackendFuture<'a, OperatorInfo, OperatorError>;
}

/// HTTPS operator client. The operator's load balancer serves a
/// self-signed certificate, so certificate verification is disabled.
#[derive(Clone, Debug)]
pub struct HttpOperatorClient {
    http: Client,
}

impl HttpOperatorClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::Client`] when the TLS stack cannot be set up.
    pub fn new() -> Result<Self, OperatorError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| OperatorError::Client(err.to_string()))?;
        Ok(Self { http })
    }
}

impl OperatorClient for HttpOperatorClient {
    fn cluster_info<'a>(&'a self, endpoint: &'a str) -> BackendFuture<'a, OperatorInfo, OperatorError> {
        Box::pin(async move {
            let url = format!("{}/info", endpoint.trim_end_matches('/'));
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|err| OperatorError::Unreachable {
                    endpoint: endpoint.to_owned(),
                    message: err.to_string(),
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(OperatorError::Status {
                    endpoint: endpoint.to_owned(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default().trim().to_owned(),
                });
            }
            let raw = response
                .json::<Value>()
                .await
                .map_err(|err| OperatorError::Decode {
                    endpoint: endpoint.to_owned(),
                    message: err.to_string(),
                })?;
            Ok(OperatorInfo { raw })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    fn render_aligns_keys_and_nests_objects() {
        let info = OperatorInfo {
            raw: json!({
                "cluster_name": "c1",
                "nodes": 3,
                "config": { "zone": "us-central1-a", "spot": false },
                "bucket": null
            }),
        };

        let rendered = info.render();

        assert!(rendered.contains("cluster_name  c1"), "{rendered}");
        assert!(rendered.contains("nodes         3"), "{rendered}");
        assert!(rendered.contains("bucket        -"), "{rendered}");
        assert!(rendered.contains("\nconfig:\n"), "{rendered}");
        assert!(rendered.contains("\n  spot  false"), "{rendered}");
        assert!(rendered.contains("\n  zone  us-central1-a"), "{rendered}");
    }

    #[rstest]
    fn non_object_documents_are_pretty_printed() {
        let info = OperatorInfo { raw: json!(["a", "b"]) };
        assert_eq!(info.render(), "[\n  \"a\",\n  \"b\"\n]");
    }

    #[rstest]
    #[tokio::test]
    async fn cluster_info_reads_json_from_info_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cluster_name": "c1" })))
            .mount(&server)
            .await;
        let client = HttpOperatorClient::new().unwrap_or_else(|err| panic!("client: {err}"));

        let info = client
            .cluster_info(&format!("{}/", server.uri()))
            .await
            .expect("info");

        assert_eq!(info.raw, json!({ "cluster_name": "c1" }));
    }

    #[rstest]
    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;
        let client = HttpOperatorClient::new().unwrap_or_else(|err| panic!("client: {err}"));
        let endpoint = server.uri();

        let err = client.cluster_info(&endpoint).await.expect_err("503");

        assert_eq!(
            err,
            OperatorError::Status {
                endpoint,
                status: 503,
                body: String::from("warming up"),
            }
        );
    }
}
