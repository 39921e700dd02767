//! Service settings loaded from TOML with environment overrides
use super::error::ConfigError;
use super::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

const ENV_MAX_FILE_SIZE_MB: &str = "HR_REQUESTS_MAX_FILE_SIZE_MB";
const ENV_ITEMS_PER_PAGE: &str = "HR_REQUESTS_ITEMS_PER_PAGE";
const ENV_ADMIN_GROUP: &str = "HR_REQUESTS_ADMIN_GROUP";
const ENV_LOG_LEVEL: &str = "HR_REQUESTS_LOG_LEVEL";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name of the list (and sled tree) holding requests.
    pub list_title: String,
    /// Members of this group are HR admins.
    pub admin_group: String,
    pub max_file_size_mb: u64,
    /// Offered on the request form. Not enforced by the core.
    pub request_types: Vec<String>,
    pub items_per_page: usize,
    pub search_limit: usize,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            list_title: "HR Requests".to_string(),
            admin_group: "HR Admins".to_string(),
            max_file_size_mb: 10,
            request_types: Vec::new(),
            items_per_page: 50,
            search_limit: 50,
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("'{raw}' is not a number"),
    })
}

impl ServiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then let `HR_REQUESTS_*` variables override it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_MAX_FILE_SIZE_MB) {
            self.max_file_size_mb = parse_number("max_file_size_mb", &raw)?;
        }
        if let Some(raw) = lookup(ENV_ITEMS_PER_PAGE) {
            self.items_per_page = parse_number("items_per_page", &raw)?;
        }
        if let Some(group) = lookup(ENV_ADMIN_GROUP) {
            self.admin_group = group;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list_title.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "list_title",
                reason: "must not be empty".into(),
            });
        }
        if self.admin_group.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "admin_group",
                reason: "must not be empty".into(),
            });
        }
        if self.max_file_size_mb == 0 {
            return Err(ConfigError::Invalid {
                field: "max_file_size_mb",
                reason: "must be at least 1".into(),
            });
        }
        if self.items_per_page == 0 {
            return Err(ConfigError::Invalid {
                field: "items_per_page",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Split a comma separated request type property into trimmed tags.
pub fn parse_request_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}
