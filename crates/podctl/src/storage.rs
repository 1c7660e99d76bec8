//! Object-storage access to the pod's network volume.
//!
//! The provider exposes network volumes through an S3-compatible endpoint per
//! region; the volume id doubles as the bucket name. Everything here is used
//! for best-effort provisioning, so failures are reported with context and
//! left to the caller to log or escalate.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, primitives::ByteStream};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::StorageCredentials;
use crate::provision::{SCRIPT_DIR, Script};

/// Host key object names written by the pod's start script, in preference order
const HOST_KEY_OBJECTS: &[(&str, &str)] = &[
    ("ssh_ed25519_host_key", "ed25519"),
    ("ssh_ecdsa_host_key", "ecdsa"),
    ("ssh_rsa_host_key", "rsa"),
    ("ssh_dsa_host_key", "dsa"),
];

/// S3 client bound to one network volume
pub struct VolumeStore {
    client: Client,
    bucket: String,
}

impl VolumeStore {
    /// Connect to the volume's regional S3 endpoint.
    ///
    /// `bucket` is the network volume id; `region` its data-center id.
    pub async fn connect(
        endpoint: &str,
        region: &str,
        bucket: &str,
        credentials: &StorageCredentials,
    ) -> Result<Self> {
        let creds = aws_sdk_s3::config::Credentials::new(
            credentials.access_key_id.expose_secret(),
            credentials.secret_key.expose_secret(),
            None,
            None,
            "podctl",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(creds)
            .endpoint_url(endpoint)
            .load()
            .await;

        // Path-style addressing; the provider's endpoint is not a real AWS host
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
        })
    }

    /// Upload a rendered provisioning script under the script prefix
    pub async fn put_script(&self, script: &Script) -> Result<()> {
        let key = format!("{SCRIPT_DIR}/{}", script.name);
        debug!(bucket = %self.bucket, %key, "uploading script");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(script.content.clone().into_bytes()))
            .send()
            .await
            .with_context(|| format!("failed to upload {key}"))?;
        Ok(())
    }

    /// Download a text object and return its contents
    pub async fn get_text(&self, key: &str) -> Result<String> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to fetch {key}"))?;
        let bytes = output
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read body of {key}"))?
            .into_bytes();
        String::from_utf8(bytes.to_vec()).with_context(|| format!("{key} is not valid UTF-8"))
    }

    /// Fetch the SSH host keys the pod's start script published.
    ///
    /// Returns `(algorithm, key)` pairs for whichever key types exist; a pod
    /// only writes the types it generated, so absences are expected.
    pub async fn fetch_host_keys(&self) -> Vec<(String, String)> {
        let mut keys = Vec::new();
        for (object, key_type) in HOST_KEY_OBJECTS {
            match self.get_text(&format!("{SCRIPT_DIR}/{object}")).await {
                Ok(text) => match parse_host_key(&text) {
                    Some((algorithm, key)) => keys.push((algorithm, key)),
                    None => warn!(key_type, "host key object is malformed"),
                },
                Err(error) => {
                    debug!(key_type, error = %error, "host key not present on volume");
                }
            }
        }
        keys
    }
}

/// Parse an OpenSSH public key line into its algorithm and base64 key parts
fn parse_host_key(text: &str) -> Option<(String, String)> {
    let mut parts = text.trim().split_whitespace();
    let algorithm = parts.next()?;
    let key = parts.next()?;
    Some((algorithm.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_line_parses_into_algorithm_and_key() {
        let parsed = parse_host_key("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAA root@pod\n");
        assert_eq!(
            parsed,
            Some(("ssh-ed25519".to_string(), "AAAAC3NzaC1lZDI1NTE5AAAA".to_string()))
        );
    }

    #[test]
    fn malformed_host_key_is_rejected() {
        assert_eq!(parse_host_key("   "), None);
        assert_eq!(parse_host_key("only-algorithm"), None);
    }
}
