//! Local SSH convenience: a dedicated config stanza for the pod and
//! known_hosts entries built from the host keys the pod published.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use tracing::info;

/// Render the config stanza for connecting to a pod as `ssh runpod`
pub fn generate_ssh_config(ip: &str, port: u16, forward_agent: bool) -> String {
    let mut config = format!("Host runpod\n  HostName {ip}\n  User user\n  Port {port}\n");
    if forward_agent {
        config.push_str("  ForwardAgent yes\n");
    }
    config
}

/// The user's ~/.ssh directory
pub fn ssh_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    Ok(dirs.home_dir().join(".ssh"))
}

/// Write the pod's config stanza to the given file, replacing any previous one
pub fn write_ssh_config(path: &Path, ip: &str, port: u16, forward_agent: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, generate_ssh_config(ip, port, forward_agent))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "SSH config updated");
    Ok(())
}

/// Append the pod's host keys to a known_hosts file.
///
/// Entries are scoped to `[ip]:port`, so stale entries from previous pods on
/// other endpoints never conflict.
pub fn append_known_hosts(
    path: &Path,
    ip: &str,
    port: u16,
    host_keys: &[(String, String)],
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    for (algorithm, key) in host_keys {
        writeln!(file, "# podctl:\n[{ip}]:{port} {algorithm} {key}")
            .with_context(|| format!("failed to append to {}", path.display()))?;
        info!(algorithm, "added host key to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_stanza_contains_endpoint() {
        let config = generate_ssh_config("203.0.113.7", 10022, false);
        assert!(config.contains("HostName 203.0.113.7"));
        assert!(config.contains("Port 10022"));
        assert!(!config.contains("ForwardAgent"));
    }

    #[test]
    fn forward_agent_is_opt_in() {
        let config = generate_ssh_config("203.0.113.7", 10022, true);
        assert!(config.contains("ForwardAgent yes"));
    }

    #[test]
    fn known_hosts_entries_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        std::fs::write(&path, "existing-line\n").unwrap();

        let keys = vec![("ssh-ed25519".to_string(), "AAAA1234".to_string())];
        append_known_hosts(&path, "203.0.113.7", 10022, &keys).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("existing-line\n"));
        assert!(contents.contains("[203.0.113.7]:10022 ssh-ed25519 AAAA1234"));
    }

    #[test]
    fn ssh_config_write_replaces_previous_stanza() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runpod_config");

        write_ssh_config(&path, "198.51.100.2", 2222, false).unwrap();
        write_ssh_config(&path, "203.0.113.7", 10022, true).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("198.51.100.2"));
        assert!(contents.contains("HostName 203.0.113.7"));
    }
}
