//! Pod lifecycle orchestration: turn one CLI invocation into the minimal
//! sequence of side effects producing a reachable pod, or tearing one down.
//!
//! Create path: resolve GPU, validate, create, best-effort provisioning
//! (script upload over the volume's object API), then poll until the provider
//! reports an SSH endpoint. Terminate path: a single idempotent delete.
//!
//! Interrupting the process mid-create does not guarantee the pod was not
//! created; the provider may already have accepted the request. The remedy is
//! `podctl list` followed by `podctl terminate`.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::api::models::{CloudType, PodRecord, PodRequest};
use crate::cli::CreateArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::VolumeStore;
use crate::{gpu, provision, ssh};

/// Grace window before retrying a failed terminate, covering the provider
/// refusing deletes while the pod is still being created
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Typed creation parameters, resolved at the CLI boundary
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub name: Option<String>,
    pub gpu_type: String,
    pub gpu_count: u32,
    pub runtime_minutes: u32,
    pub image_name: String,
    pub cloud_type: CloudType,
    pub volume_in_gb: u32,
    pub container_disk_in_gb: u32,
    pub min_vcpu_count: u32,
    pub min_memory_in_gb: u32,
    pub volume_mount_path: String,
    pub env: BTreeMap<String, String>,
    pub extra_command: Option<String>,
    pub update_ssh_config: bool,
    pub update_known_hosts: bool,
    pub forward_agent: bool,
}

impl TryFrom<CreateArgs> for CreateOptions {
    type Error = Error;

    fn try_from(args: CreateArgs) -> Result<Self> {
        let mut env = BTreeMap::new();
        for pair in &args.env {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::InvalidRequest(format!("env entry {pair:?} is not KEY=VALUE")))?;
            env.insert(key.to_string(), value.to_string());
        }

        Ok(Self {
            name: args.name,
            gpu_type: args.gpu_type,
            gpu_count: args.gpu_count,
            runtime_minutes: args.runtime,
            image_name: args.image,
            cloud_type: args.cloud_type,
            volume_in_gb: args.volume_in_gb,
            container_disk_in_gb: args.container_disk_in_gb,
            min_vcpu_count: args.min_vcpu_count,
            min_memory_in_gb: args.min_memory_in_gb,
            volume_mount_path: args.volume_mount_path,
            env,
            extra_command: args.args,
            update_ssh_config: !args.no_ssh_config,
            update_known_hosts: !args.no_known_hosts,
            forward_agent: args.forward_agent,
        })
    }
}

fn default_pod_name(display_name: &str) -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "podctl".to_string());
    format!("{user}-{display_name}")
}

/// Build the provider request from resolved options. Fails locally, before
/// any network call, if the parameters are invalid.
fn build_request(options: &CreateOptions, config: &Config) -> Result<PodRequest> {
    let entry = gpu::resolve(&options.gpu_type)?;

    let mut env = options.env.clone();
    if let Some(path) = &config.ssh_public_key_path {
        let key = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidRequest(format!("cannot read SSH public key {path}: {e}")))?;
        env.entry("PUBLIC_KEY".to_string())
            .or_insert_with(|| key.trim().to_string());
    }

    let request = PodRequest {
        name: options
            .name
            .clone()
            .unwrap_or_else(|| default_pod_name(entry.display_name)),
        image_name: options.image_name.clone(),
        gpu_type_id: entry.id.to_string(),
        cloud_type: options.cloud_type,
        gpu_count: options.gpu_count,
        runtime_minutes: options.runtime_minutes,
        volume_in_gb: options.volume_in_gb,
        container_disk_in_gb: options.container_disk_in_gb,
        min_vcpu_count: options.min_vcpu_count,
        min_memory_in_gb: options.min_memory_in_gb,
        docker_args: provision::docker_args(
            options.runtime_minutes,
            &options.volume_mount_path,
            options.extra_command.as_deref(),
        ),
        ports: provision::POD_PORTS.to_string(),
        volume_mount_path: options.volume_mount_path.clone(),
        network_volume_id: config.network_volume_id.clone(),
        env,
    };
    request.validate()?;
    Ok(request)
}

/// Connect to the network volume's object store, if one is configured with
/// credentials. Returns `None` (after logging) when script upload is not
/// possible; pods still work, they just boot unprovisioned.
async fn open_volume_store(api: &ApiClient, config: &Config) -> Option<VolumeStore> {
    let volume_id = config.network_volume_id.as_ref()?;
    let Some(credentials) = config.storage.credentials() else {
        warn!("S3 credentials not configured, skipping script upload");
        return None;
    };

    let volume = match api.get_network_volume(volume_id).await {
        Ok(volume) => volume,
        Err(error) => {
            warn!(%error, "could not look up network volume region");
            return None;
        }
    };

    match VolumeStore::connect(
        &volume.s3_endpoint(),
        &volume.data_center_id,
        volume_id,
        &credentials,
    )
    .await
    {
        Ok(store) => Some(store),
        Err(error) => {
            warn!(%error, "could not connect to volume object store");
            None
        }
    }
}

/// Upload the in-pod provisioning scripts. Best-effort: returns whether every
/// upload succeeded so the caller can apply the setup-failure policy.
async fn upload_scripts(store: &VolumeStore, options: &CreateOptions, config: &Config) -> bool {
    let git_email = config.git_email.clone().unwrap_or_default();
    let git_name = config.git_name.clone().unwrap_or_default();
    let scripts = provision::all_scripts(&options.volume_mount_path, &git_email, &git_name);

    let mut ok = true;
    for script in &scripts {
        if let Err(error) = store.put_script(script).await {
            warn!(script = script.name, %error, "script upload failed");
            ok = false;
        }
    }
    ok
}

/// Poll `get_pod` at a fixed interval until the pod reports an SSH endpoint.
///
/// Bounded: after `attempts` polls without an endpoint the pod is declared
/// timed out and left running, since terminating on timeout is not assumed
/// safe.
pub async fn wait_until_ready(
    api: &ApiClient,
    pod_id: &str,
    interval: Duration,
    attempts: u32,
) -> Result<PodRecord> {
    for attempt in 1..=attempts {
        let pod = api.get_pod(pod_id).await?;
        if pod.is_ready() {
            info!(pod_id, attempt, "pod is ready");
            return Ok(pod);
        }
        if attempt < attempts {
            sleep(interval).await;
        }
    }
    Err(Error::ProvisioningTimeout {
        pod_id: pod_id.to_string(),
        attempts,
    })
}

/// Create a pod and wait for it to become reachable.
///
/// Script upload happens after creation; a failure there is logged and, when
/// `terminate_on_setup_failure` is set, tears the fresh pod down instead of
/// stranding a paying half-configured instance.
pub async fn create(api: &ApiClient, config: &Config, options: CreateOptions) -> Result<PodRecord> {
    let request = build_request(&options, config)?;

    info!(
        name = %request.name,
        gpu_type_id = %request.gpu_type_id,
        gpu_count = request.gpu_count,
        runtime_minutes = request.runtime_minutes,
        cloud_type = ?request.cloud_type,
        "creating pod"
    );

    let store = open_volume_store(api, config).await;

    let pod = api.create_pod(&request).await?;
    info!(pod_id = %pod.id, "pod created, provisioning");

    if let Some(store) = &store {
        if !upload_scripts(store, &options, config).await {
            if config.terminate_on_setup_failure {
                warn!(pod_id = %pod.id, "setup failed, terminating pod per configuration");
                terminate(api, &pod.id).await?;
                return Err(Error::Setup(
                    "pod terminated after script upload failed".into(),
                ));
            }
            warn!(pod_id = %pod.id, "setup failed, pod left running unprovisioned");
        }
    }

    let pod = wait_until_ready(api, &pod.id, config.poll_interval, config.poll_attempts).await?;

    if let Some((ip, port)) = pod.public_endpoint() {
        info!(ip, port, "pod reachable over SSH");
        finalize_ssh(&pod, store.as_ref(), &options).await;
    }

    Ok(pod)
}

/// Best-effort local SSH bookkeeping once the pod has an endpoint
async fn finalize_ssh(pod: &PodRecord, store: Option<&VolumeStore>, options: &CreateOptions) {
    let Some((ip, port)) = pod.public_endpoint() else {
        return;
    };

    if options.update_ssh_config {
        match ssh::ssh_dir() {
            Ok(dir) => {
                let path = dir.join("runpod_config");
                if let Err(error) = ssh::write_ssh_config(&path, ip, port, options.forward_agent) {
                    warn!(%error, "failed to write SSH config");
                }
            }
            Err(error) => warn!(%error, "failed to locate SSH directory"),
        }
    }

    if options.update_known_hosts {
        if let Some(store) = store {
            let host_keys = store.fetch_host_keys().await;
            if host_keys.is_empty() {
                warn!("no host keys published yet, skipping known_hosts update");
            } else if let Ok(dir) = ssh::ssh_dir() {
                let path = dir.join("known_hosts");
                if let Err(error) = ssh::append_known_hosts(&path, ip, port, &host_keys) {
                    warn!(%error, "failed to update known_hosts");
                }
            }
        }
    }
}

/// Terminate a pod, treating an already-gone pod as success.
///
/// A pod can vanish without this process's involvement (self-termination from
/// inside the instance), so `NotFound` means the desired state already holds.
/// One retry is attempted after a grace delay for provider-side errors, which
/// covers terminating a pod the provider is still finishing creating.
pub async fn terminate(api: &ApiClient, pod_id: &str) -> Result<()> {
    terminate_with_grace(api, pod_id, TERMINATE_GRACE).await
}

pub async fn terminate_with_grace(api: &ApiClient, pod_id: &str, grace: Duration) -> Result<()> {
    match api.terminate_pod(pod_id).await {
        Ok(()) => {
            info!(pod_id, "pod terminated");
            Ok(())
        }
        Err(Error::NotFound(_)) => {
            info!(pod_id, "pod already terminated");
            Ok(())
        }
        Err(error @ Error::Provider { .. }) => {
            warn!(pod_id, %error, "terminate failed, retrying once after grace window");
            sleep(grace).await;
            match api.terminate_pod(pod_id).await {
                Ok(()) => {
                    info!(pod_id, "pod terminated on retry");
                    Ok(())
                }
                Err(Error::NotFound(_)) => {
                    info!(pod_id, "pod already terminated");
                    Ok(())
                }
                Err(error) => Err(error),
            }
        }
        // Auth, network and validation failures are fatal as-is
        Err(error) => Err(error),
    }
}
