//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::schema::SupervisorConfig;

/// Environment variables that override file settings.
pub const ENV_OVERRIDES: &[&str] = &[
    "CARETAKER_HEALTH_URL",
    "CARETAKER_SERVICE",
    "CARETAKER_MEMORY_THRESHOLD",
    "CARETAKER_BACKUP_RETENTION",
    "CARETAKER_REMOTE_HOST",
    "CARETAKER_REMOTE_PATH",
    "CARETAKER_SOURCE",
    "CARETAKER_RESTART_CEILING",
    "CARETAKER_ROOT",
    "CARETAKER_VOLUME",
    "CARETAKER_TRIGGER_URL",
];

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<SupervisorConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<SupervisorConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: SupervisorConfig = toml::from_str(&expanded)?;
        Self::expand_paths(&mut config);
        Ok(config)
    }

    /// Load the file if given (defaults otherwise), then apply process
    /// environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<SupervisorConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => SupervisorConfig::default(),
        };
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CARETAKER_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(
        config: &mut SupervisorConfig,
        lookup: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CARETAKER_HEALTH_URL") {
            config.service.health_url = v;
        }
        if let Some(v) = get("CARETAKER_SERVICE") {
            config.service.name = v;
        }
        if let Some(v) = get("CARETAKER_MEMORY_THRESHOLD") {
            config.memory.threshold_percent = parse_value("CARETAKER_MEMORY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("CARETAKER_BACKUP_RETENTION") {
            config.backup.retention = parse_value("CARETAKER_BACKUP_RETENTION", &v)?;
        }
        if let Some(v) = get("CARETAKER_REMOTE_HOST") {
            config.sync.remote_host = Some(v);
        }
        if let Some(v) = get("CARETAKER_REMOTE_PATH") {
            config.sync.remote_path = Some(v);
        }
        if let Some(v) = get("CARETAKER_SOURCE") {
            config.sync.source = Some(PathBuf::from(Self::expand_path(&v)));
        }
        if let Some(v) = get("CARETAKER_RESTART_CEILING") {
            config.service.restart_ceiling = parse_value("CARETAKER_RESTART_CEILING", &v)?;
        }
        if let Some(v) = get("CARETAKER_ROOT") {
            config.paths.root = PathBuf::from(Self::expand_path(&v));
        }
        if let Some(v) = get("CARETAKER_VOLUME") {
            config.paths.volume = PathBuf::from(Self::expand_path(&v));
        }
        if let Some(v) = get("CARETAKER_TRIGGER_URL") {
            config.sync.trigger_url = v;
        }

        Ok(())
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/caretaker`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }

    fn expand_paths(config: &mut SupervisorConfig) {
        let expand = |p: &Path| PathBuf::from(Self::expand_path(&p.to_string_lossy()));
        config.paths.root = expand(&config.paths.root);
        config.paths.volume = expand(&config.paths.volume);
        if let Some(source) = config.sync.source.as_deref() {
            config.sync.source = Some(expand(source));
        }
    }
}

fn parse_value<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("cannot parse {:?}", value),
    })
}
