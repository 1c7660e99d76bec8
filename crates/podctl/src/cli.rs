//! Command-line surface. Arguments are parsed into typed structs here and
//! handed to the orchestrator; nothing below this layer touches argv.

use clap::{Parser, Subcommand};

use crate::api::models::CloudType;
use crate::provision::DEFAULT_IMAGE_NAME;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format(), global = true)]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum TracingFormat {
    /// Use pretty formatter (default in debug mode)
    Pretty,
    /// Use JSON formatter (default in release mode)
    Json,
}

#[cfg(debug_assertions)]
const DEFAULT_TRACING_FORMAT: TracingFormat = TracingFormat::Pretty;
#[cfg(not(debug_assertions))]
const DEFAULT_TRACING_FORMAT: TracingFormat = TracingFormat::Json;

fn default_tracing_format() -> TracingFormat {
    DEFAULT_TRACING_FORMAT
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a pod and wait for it to become reachable over SSH
    Create(CreateArgs),
    /// List all pods in the account
    List,
    /// Show details for a single pod
    Get {
        /// Provider-assigned pod id
        pod_id: String,
    },
    /// Terminate a pod (safe to repeat; an already-gone pod is a success)
    Terminate {
        /// Provider-assigned pod id
        pod_id: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Name for the pod (default: "$USER-$GPU_TYPE")
    #[arg(long)]
    pub name: Option<String>,

    /// GPU type, by display name or canonical id (e.g. "RTX A4000")
    #[arg(long, default_value = "RTX A4000")]
    pub gpu_type: String,

    /// Number of GPUs to allocate
    #[arg(long, default_value_t = 1)]
    pub gpu_count: u32,

    /// Minutes before the pod self-terminates, 0 = unlimited
    #[arg(long, default_value_t = 120)]
    pub runtime: u32,

    /// Container image to boot
    #[arg(long, default_value = DEFAULT_IMAGE_NAME)]
    pub image: String,

    #[arg(long, value_enum, default_value = "secure")]
    pub cloud_type: CloudType,

    /// Ephemeral volume size in GB
    #[arg(long, default_value_t = 10)]
    pub volume_in_gb: u32,

    /// Container disk size in GB
    #[arg(long, default_value_t = 30)]
    pub container_disk_in_gb: u32,

    #[arg(long, default_value_t = 1)]
    pub min_vcpu_count: u32,

    #[arg(long, default_value_t = 1)]
    pub min_memory_in_gb: u32,

    /// Mount path for the network volume inside the pod
    #[arg(long, default_value = "/network")]
    pub volume_mount_path: String,

    /// Environment variables for the container, as KEY=VALUE (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Command to run inside the pod before it self-terminates
    #[arg(long)]
    pub args: Option<String>,

    /// Skip writing ~/.ssh/runpod_config
    #[arg(long)]
    pub no_ssh_config: bool,

    /// Skip appending the pod's host keys to ~/.ssh/known_hosts
    #[arg(long)]
    pub no_known_hosts: bool,

    /// Enable SSH agent forwarding in the generated config
    #[arg(long)]
    pub forward_agent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["podctl", "create"]).unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.gpu_type, "RTX A4000");
                assert_eq!(args.gpu_count, 1);
                assert_eq!(args.runtime, 120);
                assert_eq!(args.volume_mount_path, "/network");
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn negative_runtime_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["podctl", "create", "--runtime", "-5"]);
        assert!(result.is_err());
    }

    #[test]
    fn terminate_takes_a_pod_id() {
        let cli = Cli::try_parse_from(["podctl", "terminate", "abc123"]).unwrap();
        match cli.command {
            Command::Terminate { pod_id } => assert_eq!(pod_id, "abc123"),
            other => panic!("expected terminate, got {other:?}"),
        }
    }
}
