//! In-pod provisioning scripts and docker argument assembly.
//!
//! The scripts are uploaded to the network volume before the pod boots and
//! executed by the docker entrypoint: `start_pod.sh` configures SSH and the
//! environment, then the pod sleeps for its runtime budget and runs
//! `terminate_pod.sh`, which calls the provider's terminate endpoint with the
//! pod's own credentials (self-termination; the CLI never observes it).

/// Default Docker image for pods
pub const DEFAULT_IMAGE_NAME: &str =
    "runpod/pytorch:2.8.0-py3.11-cuda12.8.1-cudnn-devel-ubuntu22.04";

/// Directory on the network volume (and object-store key prefix) holding the scripts
pub const SCRIPT_DIR: &str = "podctl";

/// Ports requested for every pod: Jupyter over the provider proxy, SSH direct
pub const POD_PORTS: &str = "8888/http,22/tcp";

/// A rendered script, ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: &'static str,
    pub content: String,
}

fn script_path(volume_mount_path: &str) -> String {
    format!("{}/{}", volume_mount_path.trim_end_matches('/'), SCRIPT_DIR)
}

/// Entry script: host keys, authorized_keys, env export, then the setup scripts
pub fn start_pod(volume_mount_path: &str) -> Script {
    const TEMPLATE: &str = r#"#!/bin/bash
exec >> @SCRIPT_PATH@/log.txt 2>&1
echo "=== $(date -Iseconds) start_pod.sh ==="
set -e

setup_ssh() {
    if [[ $PUBLIC_KEY ]]; then
        echo "Setting up SSH..."
        mkdir -p ~/.ssh
        echo "$PUBLIC_KEY" >> ~/.ssh/authorized_keys
        chmod 700 -R ~/.ssh

        for type in rsa dsa ecdsa ed25519; do
            if [ ! -f /etc/ssh/ssh_host_${type}_key ]; then
                ssh-keygen -t $type -f /etc/ssh/ssh_host_${type}_key -q -N ''
                cp /etc/ssh/ssh_host_${type}_key.pub @SCRIPT_PATH@/ssh_${type}_host_key
            fi
        done

        service ssh start

        echo "SSH host keys:"
        for key in /etc/ssh/*.pub; do
            ssh-keygen -lf $key
        done
    fi
}

export_env_vars() {
    echo "Exporting environment variables..."
    printenv | grep -E '^RUNPOD_|^PATH=|^_=' | awk -F = '{ print "export " $1 "=\"" $2 "\"" }' >> ~/.runpod_env
    echo 'source ~/.runpod_env' >> ~/.bashrc
}

setup_ssh
export_env_vars
bash @SCRIPT_PATH@/setup_root.sh
su -c "bash @SCRIPT_PATH@/setup_user.sh" user

echo "Start script(s) finished, pod is ready to use."
"#;

    Script {
        name: "start_pod.sh",
        content: TEMPLATE.replace("@SCRIPT_PATH@", &script_path(volume_mount_path)),
    }
}

/// System-level setup: unprivileged user, workspace symlink, base packages
pub fn setup_root(volume_mount_path: &str) -> Script {
    const TEMPLATE: &str = r#"#!/bin/bash
exec >> @SCRIPT_PATH@/log.txt 2>&1
echo "=== $(date -Iseconds) setup_root.sh ==="

echo "Setting up system environment..."

useradd --uid 1000 --shell /bin/bash user --groups sudo --create-home
mkdir -p /home/user/.ssh/
cat /root/.ssh/authorized_keys >> /home/user/.ssh/authorized_keys
chown -R user:user /home/user/.ssh

if [[ "@MOUNT_PATH@" != "/workspace" ]]; then
    rmdir /workspace
    ln -s @MOUNT_PATH@ /workspace
fi

apt-get update
apt-get install -y sudo git vim ssh net-tools htop curl zip unzip tmux rsync make ripgrep wget nano locales
echo 'user ALL=(ALL) NOPASSWD:ALL' >> /etc/sudoers
echo "export HF_HOME=/workspace/hf_home/" >> /home/user/.bashrc
echo 'export PATH="$HOME/.local/bin:$PATH"' >> /home/user/.bashrc
chmod a+x @SCRIPT_PATH@/terminate_pod.sh
ln -s @SCRIPT_PATH@/terminate_pod.sh /usr/local/bin/terminate_pod

echo "...system setup completed!"
"#;

    Script {
        name: "setup_root.sh",
        content: TEMPLATE
            .replace("@SCRIPT_PATH@", &script_path(volume_mount_path))
            .replace("@MOUNT_PATH@", volume_mount_path),
    }
}

/// Per-user setup: git identity, prompt, working tooling
pub fn setup_user(volume_mount_path: &str, git_email: &str, git_name: &str) -> Script {
    const TEMPLATE: &str = r#"#!/bin/bash
exec >> @SCRIPT_PATH@/log.txt 2>&1
echo "=== $(date -Iseconds) setup_user.sh ==="

echo "Setting up user environment..."

git config --global user.email "@GIT_EMAIL@"
git config --global user.name "@GIT_NAME@"
git config --global init.defaultBranch main

# Shell prompt with hostname and exit status colouring
cat >> ~/.bashrc <<'PROMPT'
export PS1='\[\e[0;32m\]\u@pod\[\e[0m\]:\[\e[0;34m\]\w\[\e[0m\]\$ '
PROMPT

sudo pip install uv
uv venv ~/.venv --system-site-packages

echo "...user setup completed!"
"#;

    Script {
        name: "setup_user.sh",
        content: TEMPLATE
            .replace("@SCRIPT_PATH@", &script_path(volume_mount_path))
            .replace("@GIT_EMAIL@", git_email)
            .replace("@GIT_NAME@", git_name),
    }
}

/// Self-termination: calls the terminate endpoint with the pod's own credentials
pub fn terminate_pod(volume_mount_path: &str) -> Script {
    const TEMPLATE: &str = r#"#!/bin/bash
exec >> @SCRIPT_PATH@/log.txt 2>&1
echo "=== $(date -Iseconds) terminate_pod.sh ==="

if [ "$(id -u)" -ne 0 ]; then
    sudo cp /root/.runpod_env /home/user/.runpod_env
    sudo chown user /home/user/.runpod_env
    source /home/user/.runpod_env
else
    source /root/.runpod_env
fi

echo "Requesting pod termination..."
curl --request DELETE \
    --header "Authorization: Bearer ${RUNPOD_API_KEY}" \
    --url "https://rest.runpod.io/v1/pods/${RUNPOD_POD_ID}"
"#;

    Script {
        name: "terminate_pod.sh",
        content: TEMPLATE.replace("@SCRIPT_PATH@", &script_path(volume_mount_path)),
    }
}

/// All scripts a pod needs, in upload order
pub fn all_scripts(volume_mount_path: &str, git_email: &str, git_name: &str) -> Vec<Script> {
    vec![
        setup_root(volume_mount_path),
        setup_user(volume_mount_path, git_email, git_name),
        start_pod(volume_mount_path),
        terminate_pod(volume_mount_path),
    ]
}

/// Docker args string driving the pod's lifetime: run the start script, hold
/// the pod open for the runtime budget, then self-terminate. A runtime of 0
/// means unlimited, so the pod sleeps forever and never self-terminates.
pub fn docker_args(runtime_minutes: u32, volume_mount_path: &str, extra: Option<&str>) -> String {
    let path = script_path(volume_mount_path);
    let mut sequence = format!("mkdir -p {path}; bash {path}/start_pod.sh");
    if let Some(command) = extra {
        sequence.push_str(&format!("; {command}"));
    }
    if runtime_minutes == 0 {
        sequence.push_str("; sleep infinity");
    } else {
        // Floor of 20 seconds so a tiny runtime still lets startup finish
        let seconds = u64::from(runtime_minutes) * 60;
        sequence.push_str(&format!("; sleep {}; bash {path}/terminate_pod.sh", seconds.max(20)));
    }
    format!("/bin/bash -c '{sequence}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_substitute_all_placeholders() {
        for script in all_scripts("/network", "dev@example.com", "Dev Name") {
            for placeholder in ["@SCRIPT_PATH@", "@MOUNT_PATH@", "@GIT_EMAIL@", "@GIT_NAME@"] {
                assert!(
                    !script.content.contains(placeholder),
                    "{} has a leftover {placeholder}",
                    script.name
                );
            }
        }
    }

    #[test]
    fn setup_user_carries_git_identity() {
        let script = setup_user("/network", "dev@example.com", "Dev Name");
        assert!(script.content.contains(r#"user.email "dev@example.com""#));
        assert!(script.content.contains(r#"user.name "Dev Name""#));
    }

    #[test]
    fn docker_args_schedules_self_termination() {
        let args = docker_args(60, "/network", None);
        assert_eq!(
            args,
            "/bin/bash -c 'mkdir -p /network/podctl; bash /network/podctl/start_pod.sh; \
             sleep 3600; bash /network/podctl/terminate_pod.sh'"
        );
    }

    #[test]
    fn zero_runtime_means_no_self_termination() {
        let args = docker_args(0, "/network", None);
        assert!(args.contains("sleep infinity"));
        assert!(!args.contains("terminate_pod.sh"));
    }

    #[test]
    fn extra_command_runs_after_startup() {
        let args = docker_args(1, "/network", Some("python train.py"));
        assert!(args.contains("start_pod.sh; python train.py; sleep 60;"));
    }
}
