use hodgepodge_core::{DEFAULT_STORE_PREFIX, HodgeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cluster_name: String,
    pub store: StoreConfig,
    #[serde(default)]
    pub spec_update: SpecUpdateConfig,
    #[serde(default)]
    pub stolonctl: StolonctlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Etcd,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Etcd => "etcd",
        }
    }
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Etcd
}

fn default_store_prefix() -> String {
    DEFAULT_STORE_PREFIX.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecUpdateConfig {
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: usize,
}

impl Default for SpecUpdateConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

fn default_max_conflict_retries() -> usize {
    hodgepodge_core::operations::update_spec::DEFAULT_MAX_CONFLICT_RETRIES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StolonctlConfig {
    #[serde(default = "default_stolonctl_path")]
    pub path: String,
}

impl Default for StolonctlConfig {
    fn default() -> Self {
        Self {
            path: default_stolonctl_path(),
        }
    }
}

fn default_stolonctl_path() -> String {
    "stolonctl".to_string()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("HODGEPODGE"))
            .build()
            .map_err(|e| HodgeError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| HodgeError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.trim().is_empty() {
            return Err(HodgeError::Config("cluster_name cannot be empty".to_string()));
        }

        if self.store.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(HodgeError::Config(
                "store.endpoints are required for etcd backend".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_with_defaults() {
        let file = write_config(
            "cluster_name: main\nstore:\n  endpoints:\n    - http://127.0.0.1:2379\n",
        );
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.cluster_name, "main");
        assert_eq!(config.store.backend, StoreBackend::Etcd);
        assert_eq!(config.store.prefix, "hodgepodge");
        assert_eq!(config.spec_update.max_conflict_retries, 3);
        assert_eq!(config.stolonctl.path, "stolonctl");
    }

    #[test]
    fn test_rejects_missing_endpoints() {
        let file = write_config("cluster_name: main\nstore:\n  backend: etcd\n");
        let err = Config::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("store.endpoints"));
    }

    #[test]
    fn test_rejects_process_local_backend() {
        let file = write_config(
            "cluster_name: dev\nstore:\n  backend: memory\n  endpoints:\n    - http://127.0.0.1:2379\n",
        );
        let err = Config::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, HodgeError::Config(_)));
    }
}
