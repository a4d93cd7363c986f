//! Google Kubernetes Engine and Cloud Storage over their REST APIs.

mod token;
mod wire;

#[cfg(test)]
mod tests;

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tracing::{debug, info};

use crate::bucket::BucketName;
use crate::runner::CommandRunner;

use super::{
    BackendFuture, BucketSpec, BucketState, ClusterCredentials, ClusterHandle, ClusterProvider,
    ClusterSnapshot, ClusterSpec, ProviderError, StorageProvider,
};

pub use token::{GcloudTokenSource, ServiceAccountKey};
use wire::{
    ClusterResource, CreateBucketRequest, CreateClusterRequest, IamConfiguration, ObjectList,
    UniformAccess, api_error_message,
};

/// Base URLs of the Google APIs in use.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GcpEndpoints {
    /// Kubernetes Engine API, including the version segment.
    pub container: String,
    /// Cloud Storage JSON API, including the version segment.
    pub storage: String,
    /// Cloud console root.
    pub console: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            container: String::from("https://container.googleapis.com/v1"),
            storage: String::from("https://storage.googleapis.com/storage/v1"),
            console: String::from("https://console.cloud.google.com"),
        }
    }
}

/// Cluster and storage provider for Google Cloud.
pub struct GcpProvider<R> {
    http: Client,
    tokens: GcloudTokenSource<R>,
    service_account: Option<String>,
    endpoints: GcpEndpoints,
}

impl<R: CommandRunner + Send + Sync> GcpProvider<R> {
    /// Creates a provider using `tokens` for authentication. Node pools run
    /// as `service_account` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the HTTP client cannot be
    /// built.
    pub fn new(
        tokens: GcloudTokenSource<R>,
        service_account: Option<String>,
        endpoints: GcpEndpoints,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .user_agent(concat!("gantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ProviderError::Config(err.to_string()))?;
        Ok(Self {
            http,
            tokens,
            service_account,
            endpoints,
        })
    }

    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Response, ProviderError> {
        let token = self.tokens.token()?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ProviderError::Transport {
                operation: operation.to_owned(),
                message: err.to_string(),
            })?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            operation: operation.to_owned(),
            status,
            message: api_error_message(&body),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        operation: &str,
        response: Response,
    ) -> Result<T, ProviderError> {
        response.json().await.map_err(|err| ProviderError::Decode {
            operation: operation.to_owned(),
            message: err.to_string(),
        })
    }

    fn cluster_url(&self, handle: &ClusterHandle) -> String {
        format!("{}/{handle}", self.endpoints.container)
    }

    fn bucket_url(&self, bucket: &BucketName) -> String {
        format!("{}/b/{bucket}", self.endpoints.storage)
    }

    fn object_url(&self, bucket: &BucketName, object: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/o", self.bucket_url(bucket)))
            .map_err(|err| ProviderError::Config(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Config(String::from("storage endpoint cannot hold paths")))?
            .push(object);
        Ok(url)
    }

    async fn bucket_is_ours(&self, bucket: &BucketName) -> bool {
        self.send("get bucket", self.http.get(self.bucket_url(bucket)))
            .await
            .is_ok()
    }

    async fn empty_bucket(&self, bucket: &BucketName) -> Result<(), ProviderError> {
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(format!("{}/o", self.bucket_url(bucket)));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let response = self.send("list bucket objects", request).await?;
            let page: ObjectList = Self::decode("list bucket objects", response).await?;
            for object in &page.items {
                debug!(bucket = %bucket, object = %object.name, "deleting object");
                let url = self.object_url(bucket, &object.name)?;
                self.send("delete bucket object", self.http.delete(url)).await?;
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(()),
            }
        }
    }
}

impl<R: CommandRunner + Send + Sync> ClusterProvider for GcpProvider<R> {
    fn create_cluster<'a>(
        &'a self,
        spec: &'a ClusterSpec,
    ) -> BackendFuture<'a, ClusterHandle, ProviderError> {
        Box::pin(async move {
            let body = CreateClusterRequest::from_spec(spec, self.service_account.as_deref());
            let url = format!("{}/{}/clusters", self.endpoints.container, spec.handle.parent());
            self.send("create cluster", self.http.post(url).json(&body))
                .await?;
            Ok(spec.handle.clone())
        })
    }

    fn get_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, ClusterSnapshot, ProviderError> {
        Box::pin(async move {
            let response = self
                .send("get cluster", self.http.get(self.cluster_url(handle)))
                .await?;
            let resource: ClusterResource = Self::decode("get cluster", response).await?;
            Ok(resource.into())
        })
    }

    fn delete_cluster<'a>(
        &'a self,
        handle: &'a ClusterHandle,
    ) -> BackendFuture<'a, (), ProviderError> {
        Box::pin(async move {
            self.send("delete cluster", self.http.delete(self.cluster_url(handle)))
                .await?;
            Ok(())
        })
    }

    fn derive_credentials<'a>(
        &'a self,
        snapshot: &'a ClusterSnapshot,
    ) -> BackendFuture<'a, ClusterCredentials, ProviderError> {
        Box::pin(async move {
            let endpoint = snapshot
                .endpoint
                .as_deref()
                .ok_or(ProviderError::MissingClusterField { field: "endpoint" })?;
            let ca_certificate = snapshot
                .ca_certificate
                .clone()
                .ok_or(ProviderError::MissingClusterField {
                    field: "CA certificate",
                })?;
            Ok(ClusterCredentials {
                server: format!("https://{endpoint}"),
                ca_certificate,
                token: self.tokens.token()?,
            })
        })
    }

    fn console_url(&self, handle: &ClusterHandle) -> String {
        format!(
            "{}/kubernetes/clusters/details/{}/{}?project={}",
            self.endpoints.console, handle.zone, handle.name, handle.project
        )
    }
}

impl<R: CommandRunner + Send + Sync> StorageProvider for GcpProvider<R> {
    fn create_bucket<'a>(
        &'a self,
        spec: &'a BucketSpec,
    ) -> BackendFuture<'a, BucketState, ProviderError> {
        Box::pin(async move {
            let body = CreateBucketRequest {
                name: spec.name.as_str(),
                location: &spec.region,
                iam_configuration: IamConfiguration {
                    uniform_bucket_level_access: UniformAccess { enabled: true },
                },
            };
            let request = self
                .http
                .post(format!("{}/b", self.endpoints.storage))
                .query(&[("project", spec.project.as_str())])
                .json(&body);
            match self.send("create bucket", request).await {
                Ok(_) => Ok(BucketState::Created),
                Err(ProviderError::Api { status, .. })
                    if status == StatusCode::CONFLICT.as_u16() =>
                {
                    if self.bucket_is_ours(&spec.name).await {
                        info!(bucket = %spec.name, "bucket already exists");
                        Ok(BucketState::AlreadyOwned)
                    } else {
                        Err(ProviderError::BucketCollision {
                            bucket: spec.name.to_string(),
                        })
                    }
                }
                Err(err) => Err(err),
            }
        })
    }

    fn delete_bucket<'a>(&'a self, name: &'a BucketName) -> BackendFuture<'a, (), ProviderError> {
        Box::pin(async move {
            self.empty_bucket(name).await?;
            self.send("delete bucket", self.http.delete(self.bucket_url(name)))
                .await?;
            Ok(())
        })
    }
}
