//! Process configuration and its discovery chain (§10 "Configuration").
//!
//! Modeled directly on the teacher's `clawft-platform::config_loader`:
//! an environment variable names an explicit file first, then a
//! conventional path is tried, then compiled-in defaults apply. Like the
//! teacher's loader, a missing file is never an error -- it just means
//! "use the defaults".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How the Kubernetes client should be initialized (§4.1, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KubeClientMode {
    /// Prefer in-cluster config, fall back to local kubeconfig, fall back
    /// to "no Kubernetes" mode. This is the default.
    #[default]
    Auto,
    /// Force "no Kubernetes" mode regardless of cluster availability
    /// (useful for local development and tests).
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    #[serde(default)]
    pub kube_client_mode: KubeClientMode,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,
    #[serde(default = "default_baseline_concurrency")]
    pub baseline_concurrency: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_evaluation_timeout_secs() -> u64 {
    300
}

fn default_baseline_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: default_bind_address(),
            default_namespace: default_namespace(),
            kube_client_mode: KubeClientMode::default(),
            request_timeout_secs: default_request_timeout_secs(),
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            baseline_concurrency: default_baseline_concurrency(),
        }
    }
}

/// Discover the config file path using the fallback chain (§10):
/// 1. Path from the `ARK_EVALUATOR_CONFIG` environment variable.
/// 2. `./config.yaml` in the current working directory.
/// 3. `$XDG_CONFIG_HOME/ark-evaluator/config.yaml`.
pub fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ARK_EVALUATOR_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let cwd_path = Path::new("config.yaml");
    if cwd_path.exists() {
        return Some(cwd_path.to_path_buf());
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg).join("ark-evaluator").join("config.yaml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load configuration through the discovery chain, falling back to
/// compiled-in defaults when no file is found -- never panicking (§10).
pub fn load_config() -> Config {
    let Some(path) = discover_config_path() else {
        return Config::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_yaml::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
            Config::default()
        }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read config file, using defaults");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_address, "0.0.0.0:8080");
        assert_eq!(cfg.default_namespace, "default");
        assert_eq!(cfg.kube_client_mode, KubeClientMode::Auto);
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.evaluation_timeout_secs, 300);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        // SAFETY: this test does not run concurrently with other tests
        // that mutate these particular env vars.
        unsafe {
            std::env::remove_var("ARK_EVALUATOR_CONFIG");
            std::env::remove_var("XDG_CONFIG_HOME");
        }
        let cfg = load_config();
        assert_eq!(cfg.bind_address, default_bind_address());
    }

    #[test]
    fn env_var_names_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "bind_address: \"127.0.0.1:9000\"\n").unwrap();

        unsafe {
            std::env::set_var("ARK_EVALUATOR_CONFIG", &path);
        }
        let discovered = discover_config_path().unwrap();
        assert_eq!(discovered, path);
        unsafe {
            std::env::remove_var("ARK_EVALUATOR_CONFIG");
        }
    }
}
