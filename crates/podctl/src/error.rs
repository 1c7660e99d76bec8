use thiserror::Error;

/// Error type for pod operations
#[derive(Debug, Error)]
pub enum Error {
    /// API key is missing, malformed, or rejected by the provider
    #[error("authentication failed: {0}")]
    Auth(String),

    /// GPU name did not match any catalog entry
    #[error("unknown GPU type: {0:?}")]
    UnknownGpu(String),

    /// GPU name matched more than one catalog entry
    #[error("ambiguous GPU name {name:?}, matches: {matches:?}")]
    AmbiguousGpuName { name: String, matches: Vec<String> },

    /// Requested resource does not exist on the provider
    #[error("not found: {0}")]
    NotFound(String),

    /// Provider returned a non-2xx response; message passed through verbatim
    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// Transport-level failure before a response was received
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Pod never reported an SSH endpoint within the polling budget.
    /// The pod is left running; terminating on timeout is not assumed safe.
    #[error("pod {pod_id} did not become ready after {attempts} attempts")]
    ProvisioningTimeout { pod_id: String, attempts: u32 },

    /// Request failed local validation; no network call was made
    #[error("invalid pod request: {0}")]
    InvalidRequest(String),

    /// Best-effort provisioning failed and configuration demanded teardown
    #[error("provisioning setup failed: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, Error>;
