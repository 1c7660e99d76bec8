//! Wire types for the provider's pod API.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Desired lifecycle state of a pod as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DesiredStatus {
    Running,
    Exited,
    Terminated,
}

/// Cloud tier the pod is scheduled onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudType {
    Secure,
    Community,
}

/// Parameters for a pod creation call.
///
/// Constructed once per invocation and never mutated afterwards. The GPU type
/// must already be resolved to its canonical id before building this.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRequest {
    pub name: String,
    pub image_name: String,
    /// Canonical GPU type id (already resolved, never a display alias)
    pub gpu_type_id: String,
    pub cloud_type: CloudType,
    pub gpu_count: u32,
    /// Server-side runtime cap in minutes, 0 = unlimited
    #[serde(skip)]
    pub runtime_minutes: u32,
    pub volume_in_gb: u32,
    pub container_disk_in_gb: u32,
    pub min_vcpu_count: u32,
    pub min_memory_in_gb: u32,
    pub docker_args: String,
    pub ports: String,
    pub volume_mount_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_volume_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl PodRequest {
    /// Local validation, performed before any network call
    pub fn validate(&self) -> Result<()> {
        if self.gpu_count == 0 {
            return Err(Error::InvalidRequest("gpu_count must be at least 1".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidRequest("pod name must not be empty".into()));
        }
        Ok(())
    }
}

/// A single exposed port on a running pod
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub ip: String,
    pub is_ip_public: bool,
    pub private_port: u16,
    pub public_port: u16,
    #[serde(rename = "type")]
    pub protocol: String,
}

/// Runtime details, populated by the provider once the pod is provisioned
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodRuntime {
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineInfo {
    #[serde(default)]
    pub gpu_display_name: Option<String>,
    #[serde(default)]
    pub pod_host_id: Option<String>,
}

/// Provider-side record of a pod.
///
/// The `id` is assigned by the provider and immutable. `runtime` stays absent
/// for a grace period after creation while the instance is provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desired_status: Option<DesiredStatus>,
    #[serde(default)]
    pub gpu_count: Option<u32>,
    #[serde(default)]
    pub cost_per_hr: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub machine: Option<MachineInfo>,
    #[serde(default)]
    pub runtime: Option<PodRuntime>,
    /// Free-form provider text, e.g. "Rented by User: Thu Dec 28 2023 10:21:34 GMT+0000"
    #[serde(default)]
    pub last_status_change: Option<String>,
    #[serde(default)]
    pub docker_args: Option<String>,
}

/// The `sleep <seconds>` the docker args schedule before self-termination
static SLEEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsleep\s+(\d+)\b").expect("valid regex"));

/// Start timestamp embedded in the provider's lastStatusChange text
static STATUS_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":\s*(\w{3}\s+\w{3}\s+\d{2}\s+\d{4}\s+\d{2}:\d{2}:\d{2})\s+GMT")
        .expect("valid regex")
});

fn parse_sleep_seconds(docker_args: &str) -> Option<i64> {
    SLEEP_RE.captures(docker_args)?.get(1)?.as_str().parse().ok()
}

fn parse_status_change(text: &str) -> Option<DateTime<Utc>> {
    let captured = STATUS_DATE_RE.captures(text)?.get(1)?.as_str();
    let normalized = captured.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%a %b %d %Y %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

impl PodRecord {
    /// The pod's public SSH endpoint, if the provider has assigned one yet.
    ///
    /// Exactly one public-IP mapping is expected on a ready pod; anything
    /// else means the pod is still provisioning.
    pub fn public_endpoint(&self) -> Option<(&str, u16)> {
        let runtime = self.runtime.as_ref()?;
        let public: Vec<&PortMapping> =
            runtime.ports.iter().filter(|p| p.is_ip_public).collect();
        match public.as_slice() {
            [mapping] => Some((mapping.ip.as_str(), mapping.public_port)),
            _ => None,
        }
    }

    /// Whether the pod is reachable over SSH
    pub fn is_ready(&self) -> bool {
        self.public_endpoint().is_some()
    }

    /// Estimated time until the pod self-terminates, derived from the
    /// scheduled `sleep` in its docker args and the start timestamp in
    /// `lastStatusChange`. `None` when either is missing, unparseable, or
    /// the budget has already elapsed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        let started = parse_status_change(self.last_status_change.as_deref()?)?;
        let sleep_seconds = parse_sleep_seconds(self.docker_args.as_deref()?)?;
        let remaining = started + TimeDelta::seconds(sleep_seconds) - now;
        (remaining > TimeDelta::zero()).then_some(remaining)
    }
}

/// Provider-managed persistent storage volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkVolume {
    pub id: String,
    /// Region the volume lives in, e.g. "EU-RO-1"
    pub data_center_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl NetworkVolume {
    /// S3-compatible endpoint serving this volume's region
    pub fn s3_endpoint(&self) -> String {
        format!("https://s3api-{}.runpod.io/", self.data_center_id.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ready_pod_json() -> serde_json::Value {
        serde_json::json!({
            "id": "abc123",
            "name": "user-RTX A4000",
            "desiredStatus": "RUNNING",
            "gpuCount": 1,
            "costPerHr": 0.17,
            "machine": { "gpuDisplayName": "RTX A4000", "podHostId": "host-1" },
            "runtime": {
                "ports": [
                    { "ip": "203.0.113.7", "isIpPublic": true, "privatePort": 22, "publicPort": 10022, "type": "tcp" },
                    { "ip": "10.0.0.3", "isIpPublic": false, "privatePort": 8888, "publicPort": 8888, "type": "http" }
                ]
            }
        })
    }

    #[test]
    fn public_endpoint_picks_the_unique_public_mapping() {
        let pod: PodRecord = serde_json::from_value(ready_pod_json()).unwrap();
        assert_eq!(pod.public_endpoint(), Some(("203.0.113.7", 10022)));
        assert!(pod.is_ready());
        assert_eq!(
            pod.machine.as_ref().and_then(|m| m.pod_host_id.as_deref()),
            Some("host-1")
        );
    }

    #[test]
    fn pod_without_runtime_is_not_ready() {
        let pod: PodRecord = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "name": "fresh",
            "desiredStatus": "RUNNING"
        }))
        .unwrap();
        assert!(!pod.is_ready());
        assert_eq!(pod.public_endpoint(), None);
    }

    #[test]
    fn zero_gpu_count_fails_validation() {
        let mut request = PodRequest {
            name: "test".into(),
            image_name: "runpod/pytorch".into(),
            gpu_type_id: "NVIDIA RTX A4000".into(),
            cloud_type: CloudType::Secure,
            gpu_count: 0,
            runtime_minutes: 60,
            volume_in_gb: 10,
            container_disk_in_gb: 30,
            min_vcpu_count: 1,
            min_memory_in_gb: 1,
            docker_args: String::new(),
            ports: "22/tcp".into(),
            volume_mount_path: "/network".into(),
            network_volume_id: None,
            env: BTreeMap::new(),
        };
        assert!(matches!(
            request.validate(),
            Err(crate::error::Error::InvalidRequest(_))
        ));
        request.gpu_count = 1;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn sleep_seconds_are_parsed_out_of_docker_args() {
        let args = "/bin/bash -c 'mkdir -p /network/podctl; bash /network/podctl/start_pod.sh; \
                    sleep 3600; bash /network/podctl/terminate_pod.sh'";
        assert_eq!(parse_sleep_seconds(args), Some(3600));
        assert_eq!(parse_sleep_seconds("no schedule here"), None);
        assert_eq!(parse_sleep_seconds("sleep infinity"), None);
    }

    #[test]
    fn status_change_timestamp_is_parsed() {
        let text = "Rented by User: Thu Dec 28 2023 10:21:34 GMT+0000 (Coordinated Universal Time)";
        let parsed = parse_status_change(text).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2023, 12, 28, 10, 21, 34).unwrap()
        );
        assert_eq!(parse_status_change("no timestamp"), None);
    }

    #[test]
    fn time_remaining_counts_down_from_the_scheduled_sleep() {
        let pod: PodRecord = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "name": "timed",
            "lastStatusChange": "Rented by User: Thu Dec 28 2023 10:00:00 GMT+0000 (Coordinated Universal Time)",
            "dockerArgs": "/bin/bash -c 'bash start_pod.sh; sleep 3600; bash terminate_pod.sh'"
        }))
        .unwrap();

        // Half the budget spent
        let now = Utc.with_ymd_and_hms(2023, 12, 28, 10, 30, 0).unwrap();
        assert_eq!(pod.time_remaining(now), Some(TimeDelta::seconds(1800)));

        // Budget exhausted
        let later = Utc.with_ymd_and_hms(2023, 12, 28, 11, 30, 0).unwrap();
        assert_eq!(pod.time_remaining(later), None);
    }

    #[test]
    fn time_remaining_is_unknown_without_both_fields() {
        let pod: PodRecord = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "name": "unlimited",
            "dockerArgs": "/bin/bash -c 'bash start_pod.sh; sleep infinity'"
        }))
        .unwrap();
        assert_eq!(pod.time_remaining(Utc::now()), None);
    }

    #[test]
    fn volume_s3_endpoint_is_derived_from_region() {
        let volume = NetworkVolume {
            id: "vol1".into(),
            data_center_id: "EU-RO-1".into(),
            name: None,
            size: None,
        };
        assert_eq!(volume.s3_endpoint(), "https://s3api-eu-ro-1.runpod.io/");
    }
}
