//! HTTP client for the provider's pod API.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::api::models::{NetworkVolume, PodRecord, PodRequest};
use crate::error::{Error, Result};

/// Default REST endpoint for the provider API
pub const DEFAULT_BASE_URL: &str = "https://rest.runpod.io/v1";

/// Stateless, authenticated API client.
///
/// Each method performs exactly one request; no retries are attempted here.
/// Callers decide whether a failure is worth retrying.
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl ApiClient {
    /// Creates a new API client against the given base URL.
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .tcp_keepalive(Some(Duration::from_secs(60 * 5)))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Map non-2xx responses onto the error taxonomy, passing the provider's
    /// message through verbatim.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(message)),
            StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
            _ => Err(Error::Provider {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        Self::check(response).await
    }

    /// List all pods in the account
    pub async fn list_pods(&self) -> Result<Vec<PodRecord>> {
        debug!("listing pods");
        Ok(self.get("pods").await?.json().await?)
    }

    /// Fetch a single pod by its provider-assigned id
    pub async fn get_pod(&self, pod_id: &str) -> Result<PodRecord> {
        debug!(pod_id, "fetching pod");
        Ok(self.get(&format!("pods/{pod_id}")).await?.json().await?)
    }

    /// Create a pod. The request must already be validated and carry a
    /// canonical GPU type id.
    pub async fn create_pod(&self, request: &PodRequest) -> Result<PodRecord> {
        debug!(
            name = %request.name,
            gpu_type_id = %request.gpu_type_id,
            gpu_count = request.gpu_count,
            "creating pod"
        );
        let response = self
            .http
            .post(self.url("pods"))
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Terminate a pod. Returns `Error::NotFound` if the pod no longer
    /// exists; idempotency on top of that is the orchestrator's concern.
    pub async fn terminate_pod(&self, pod_id: &str) -> Result<()> {
        debug!(pod_id, "terminating pod");
        let response = self
            .http
            .delete(self.url(&format!("pods/{pod_id}")))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Fetch a network volume, mainly to learn which region it lives in
    pub async fn get_network_volume(&self, volume_id: &str) -> Result<NetworkVolume> {
        debug!(volume_id, "fetching network volume");
        Ok(self
            .get(&format!("networkvolumes/{volume_id}"))
            .await?
            .json()
            .await?)
    }
}
