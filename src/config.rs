//! Fleet configuration with builder pattern

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default location of the out-of-band management probe, relative to a search path
pub const DEFAULT_PROBE_SCRIPT: &str = "scripts/util/ipmi.py";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Probe script, relative to one of `script_search_paths` or absolute
    pub probe_script: PathBuf,
    pub script_search_paths: Vec<PathBuf>,
    /// Program the probe script is run with; executed directly when unset
    pub probe_interpreter: Option<PathBuf>,
    /// Name given to each discovered resource handle
    pub agent_name: String,
    /// Parameters every resource handle starts from
    pub discovery_defaults: BTreeMap<String, String>,
    pub management_server_id: u64,
    /// Caller-side limit on one blocking discovery call. The core has none.
    pub discovery_timeout_secs: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            probe_script: PathBuf::from(DEFAULT_PROBE_SCRIPT),
            script_search_paths: vec![PathBuf::from(".")],
            probe_interpreter: None,
            agent_name: "Bare Metal Agent".to_string(),
            discovery_defaults: BTreeMap::new(),
            management_server_id: 1,
            discovery_timeout_secs: None,
        }
    }
}

impl FleetConfig {
    pub fn builder() -> FleetConfigBuilder {
        FleetConfigBuilder::default()
    }

    /// Load from a JSON file; missing fields fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: FleetConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.probe_script.as_os_str().is_empty() {
            return Err(crate::Error::FatalConfiguration("probe_script cannot be empty".into()));
        }
        if self.agent_name.is_empty() {
            return Err(crate::Error::FatalConfiguration("agent_name cannot be empty".into()));
        }
        if self.discovery_timeout_secs == Some(0) {
            return Err(crate::Error::FatalConfiguration(
                "discovery_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FleetConfigBuilder {
    config: FleetConfig,
}

impl FleetConfigBuilder {
    pub fn probe_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.probe_script = path.into();
        self
    }

    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.script_search_paths.push(dir.into());
        self
    }

    pub fn probe_interpreter(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.probe_interpreter = Some(program.into());
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.agent_name = name.into();
        self
    }

    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.discovery_defaults.insert(key.into(), value.into());
        self
    }

    pub fn management_server_id(mut self, id: u64) -> Self {
        self.config.management_server_id = id;
        self
    }

    pub fn discovery_timeout_secs(mut self, secs: u64) -> Self {
        self.config.discovery_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> FleetConfig {
        self.config
    }

    pub fn build_validated(self) -> crate::Result<FleetConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_builder() {
        let config = FleetConfig::builder()
            .agent_name("agent")
            .default_param("memory", "1024")
            .search_path("/opt/fleet")
            .management_server_id(7)
            .build();

        assert_eq!(config.agent_name, "agent");
        assert_eq!(config.discovery_defaults.get("memory").map(String::as_str), Some("1024"));
        assert_eq!(config.script_search_paths.len(), 2);
        assert_eq!(config.management_server_id, 7);
        assert_eq!(config.probe_script, PathBuf::from(DEFAULT_PROBE_SCRIPT));
    }

    #[test]
    fn test_config_validation() {
        assert!(FleetConfig::default().validate().is_ok());
        assert!(FleetConfig::builder().agent_name("").build_validated().is_err());
        assert!(FleetConfig::builder().probe_script("").build_validated().is_err());
        assert!(FleetConfig::builder().discovery_timeout_secs(0).build_validated().is_err());
    }

    #[test]
    fn test_config_from_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fleet.json");
        std::fs::write(&path, r#"{ "agent_name": "rack-7", "discovery_timeout_secs": 30 }"#).unwrap();

        let config = FleetConfig::from_file(&path).unwrap();
        assert_eq!(config.agent_name, "rack-7");
        assert_eq!(config.discovery_timeout_secs, Some(30));
        assert_eq!(config.probe_script, PathBuf::from(DEFAULT_PROBE_SCRIPT));
    }

    #[test]
    fn test_config_from_file_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fleet.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FleetConfig::from_file(&path), Err(crate::Error::Json(_))));
    }
}
