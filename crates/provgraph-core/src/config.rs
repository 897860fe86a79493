//! Configuration management for provgraph services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`PROVGRAPH_` prefix, `__` between sections)
//! 2. Config file (`provgraph.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Environment variable prefix, e.g. `PROVGRAPH_NEO4J__URI`.
pub const ENV_PREFIX: &str = "PROVGRAPH";

/// Default config file prefix (`provgraph.toml`, `provgraph.yaml`, ...).
pub const DEFAULT_FILE_PREFIX: &str = "provgraph";

/// Build the layered configuration source.
pub fn load(file_prefix: &str) -> Result<config::Config, ConfigError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one section, falling back to its defaults when absent.
///
/// A section that is present but malformed is an error rather than a silent
/// fallback.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = key, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(ConfigError::Section {
            section: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Limits {
        #[serde(default = "default_max")]
        max: u32,
    }

    fn default_max() -> u32 {
        7
    }

    impl Default for Limits {
        fn default() -> Self {
            Self { max: default_max() }
        }
    }

    #[test]
    fn absent_section_uses_defaults() {
        let cfg = config::Config::builder().build().unwrap();
        let limits: Limits = section(&cfg, "limits").unwrap();
        assert_eq!(limits, Limits::default());
    }

    #[test]
    fn present_section_is_deserialized() {
        let cfg = config::Config::builder()
            .set_override("limits.max", 3)
            .unwrap()
            .build()
            .unwrap();
        let limits: Limits = section(&cfg, "limits").unwrap();
        assert_eq!(limits.max, 3);
    }

    #[test]
    fn malformed_section_is_an_error() {
        let cfg = config::Config::builder()
            .set_override("limits.max", "lots")
            .unwrap()
            .build()
            .unwrap();
        assert!(section::<Limits>(&cfg, "limits").is_err());
    }
}
