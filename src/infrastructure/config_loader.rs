//! Hierarchical configuration loading (§6): programmatic defaults, then an
//! optional YAML file, then `SWARM_`-prefixed environment variables, highest
//! precedence last — the same merge order as the teacher's `ConfigLoader`.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::error::ConfigError;
use crate::domain::models::config::SwarmSettings;

const ENV_PREFIX: &str = "SWARM_";
const DEFAULT_CONFIG_PATH: &str = ".swarm/config.yaml";
const DEFAULT_LOCAL_CONFIG_PATH: &str = ".swarm/local.yaml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from the default project config locations plus
    /// environment overrides, then validate.
    pub fn load() -> Result<SwarmSettings, ConfigError> {
        let settings: SwarmSettings = Figment::new()
            .merge(Serialized::defaults(SwarmSettings::default()))
            .merge(Yaml::file(DEFAULT_CONFIG_PATH))
            .merge(Yaml::file(DEFAULT_LOCAL_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load settings from a specific YAML file, skipping the default
    /// project paths and environment layer. Used by tests and by tooling
    /// that points at an explicit config file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SwarmSettings, ConfigError> {
        let settings: SwarmSettings = Figment::new()
            .merge(Serialized::defaults(SwarmSettings::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    fn validate(settings: &SwarmSettings) -> Result<(), ConfigError> {
        settings.validate().map_err(|message| {
            if message.contains("max_agents") {
                ConfigError::InvalidMaxAgents
            } else if message.contains("max_cpu_percent") {
                ConfigError::InvalidCpuPercent
            } else if message.contains("logging format") {
                ConfigError::InvalidLogFormat(settings.logging.format.clone())
            } else {
                ConfigError::LoadFailed(message)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_agents: 25\nlogging:\n  level: debug").unwrap();
        file.flush().unwrap();

        let settings = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(settings.max_agents, 25);
        assert_eq!(settings.logging.level, "debug");
        // Untouched fields keep their defaults.
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn load_from_file_rejects_invalid_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_agents: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = ConfigLoader::load_from_file("/nonexistent/path.yaml").unwrap();
        assert_eq!(settings, SwarmSettings::default());
    }
}
