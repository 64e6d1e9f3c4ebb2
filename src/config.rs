//! Engine configuration.
//!
//! YAML configuration with precedence: ENV > file > defaults.
//!
//! ```yaml
//! cache_max_mb: 512
//! default_palette: heat
//! interpolate: true
//! contour_levels: 0
//! ward_workers: 4
//! ```

use crate::algo::ward;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`EngineConfig::cache_max_mb`].
pub const ENV_CACHE_MB: &str = "SOM_VIZ_CACHE_MB";
/// Environment variable overriding [`EngineConfig::default_palette`].
pub const ENV_PALETTE: &str = "SOM_VIZ_PALETTE";

/// Largest accepted number of contour bands.
const MAX_CONTOUR_LEVELS: usize = 256;

/// Settings shared by the cache and all visualizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Image cache ceiling in megabytes.
    #[serde(default = "default_cache_max_mb")]
    pub cache_max_mb: usize,

    /// Short name of the palette matrix visualizers start with.
    #[serde(default = "default_palette")]
    pub default_palette: String,

    /// Smooth matrices with bicubic interpolation.
    #[serde(default = "default_interpolate")]
    pub interpolate: bool,

    /// Number of contour bands; 0 disables contours.
    #[serde(default)]
    pub contour_levels: usize,

    /// Ward clustering threads; derived from the core count when absent.
    #[serde(default)]
    pub ward_workers: Option<usize>,
}

fn default_cache_max_mb() -> usize {
    250
}
fn default_palette() -> String {
    "rainbow".to_string()
}
fn default_interpolate() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_max_mb: default_cache_max_mb(),
            default_palette: default_palette(),
            interpolate: default_interpolate(),
            contour_levels: 0,
            ward_workers: None,
        }
    }
}

impl EngineConfig {
    /// Load a YAML file, apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] with the line number if parsing fails.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            Error::Config {
                key: "yaml".to_string(),
                message: format!("line {line}: {e}"),
            }
        })
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| Error::Config {
            key: "yaml".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`EngineConfig::load`]).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(ENV_CACHE_MB) {
            self.cache_max_mb = raw.trim().parse().map_err(|e| Error::Config {
                key: ENV_CACHE_MB.to_string(),
                message: format!("'{raw}' is not a size in MB: {e}"),
            })?;
        }
        if let Some(raw) = lookup(ENV_PALETTE) {
            self.default_palette = raw.trim().to_string();
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.cache_max_mb == 0 {
            return Err(Error::Config {
                key: "cache_max_mb".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.default_palette.is_empty() {
            return Err(Error::Config {
                key: "default_palette".to_string(),
                message: "must name a palette".to_string(),
            });
        }
        if self.contour_levels > MAX_CONTOUR_LEVELS {
            return Err(Error::Config {
                key: "contour_levels".to_string(),
                message: format!("at most {MAX_CONTOUR_LEVELS} bands, got {}", self.contour_levels),
            });
        }
        if self.ward_workers == Some(0) {
            return Err(Error::Config {
                key: "ward_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cache ceiling in bytes.
    #[must_use]
    pub fn cache_max_bytes(&self) -> usize {
        self.cache_max_mb.saturating_mul(1024 * 1024)
    }

    /// Ward worker threads: configured, or derived from available cores.
    #[must_use]
    pub fn ward_worker_count(&self) -> usize {
        self.ward_workers.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
            ward::worker_count(cpus)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_max_mb, 250);
        assert_eq!(config.cache_max_bytes(), 250 * 1024 * 1024);
        assert_eq!(config.default_palette, "rainbow");
        assert!(config.interpolate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_partial() {
        let config = EngineConfig::from_yaml("contour_levels: 8\nward_workers: 2").unwrap();
        assert_eq!(config.contour_levels, 8);
        assert_eq!(config.ward_worker_count(), 2);
        assert_eq!(config.cache_max_mb, 250);
    }

    #[test]
    fn test_config_parse_error_includes_line() {
        let yaml = "interpolate: true\ncache_max_mb: lots\n";
        let err = EngineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_CACHE_MB, "64"), (ENV_PALETTE, "heat")].into();
        let mut config = EngineConfig::from_yaml("cache_max_mb: 1000\ndefault_palette: grey").unwrap();
        config
            .apply_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.cache_max_mb, 64);
        assert_eq!(config.default_palette, "heat");
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|k| (k == ENV_CACHE_MB).then(|| "huge".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = EngineConfig::default();
        config.ward_workers = Some(0);
        assert!(config.validate().is_err());
        config.ward_workers = None;
        config.cache_max_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        let yaml = EngineConfig {
            contour_levels: 5,
            ..EngineConfig::default()
        }
        .to_yaml()
        .unwrap();
        std::fs::write(&path, yaml).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.contour_levels, 5);
        assert!(EngineConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
