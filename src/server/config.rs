use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::generation::text::{gemini, openai};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_dir: String,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,

    pub midjourney_api_key: Option<String>,
    pub midjourney_base_url: String,
    pub midjourney_process_mode: String,

    pub text_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub image_poll_interval_secs: u64,
    pub image_max_polls: u32,
    pub temperature: f32,
    pub max_tags: usize,
    pub batch_concurrency: usize,

    pub package_max_age_hours: i64,
    pub cleanup_interval_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    listen_addr: Option<String>,
    log_dir: Option<String>,
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    midjourney_api_key: Option<String>,
    piapi_api_key: Option<String>,
    midjourney_base_url: Option<String>,
    midjourney_process_mode: Option<String>,
    text_timeout_secs: Option<u64>,
    image_timeout_secs: Option<u64>,
    image_poll_interval_secs: Option<u64>,
    image_max_polls: Option<u32>,
    temperature: Option<f32>,
    max_tags: Option<usize>,
    batch_concurrency: Option<usize>,
    package_max_age_hours: Option<i64>,
    cleanup_interval_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            log_dir: "logs".to_string(),
            gemini_api_key: None,
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            openai_api_key: None,
            openai_model: openai::DEFAULT_MODEL.to_string(),
            openai_base_url: openai::DEFAULT_BASE_URL.to_string(),
            midjourney_api_key: None,
            midjourney_base_url: crate::generation::image::midjourney::DEFAULT_BASE_URL.to_string(),
            midjourney_process_mode: "fast".to_string(),
            text_timeout_secs: 60,
            image_timeout_secs: 600,
            image_poll_interval_secs: 5,
            image_max_polls: 120,
            temperature: 0.8,
            max_tags: 15,
            batch_concurrency: 2,
            package_max_age_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Keys copied from an `.env.example` are treated as missing.
fn usable_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| {
        let lower = k.to_ascii_lowercase();
        !k.is_empty() && !lower.starts_with("your-") && !lower.starts_with("your_") && lower != "changeme"
    })
}

impl ServerConfig {
    /// Loads configuration: optional TOML file, overridden by environment
    /// variables (a `.env` file is honoured). The result is validated.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        let config = Self::from_layers(file_config, env_config);
        config.validate()?;
        Ok(config)
    }

    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn read_file(path: &Path) -> Result<PartialServerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge: environment overrides file, file overrides defaults.
    pub fn from_layers(file: PartialServerConfig, env: PartialServerConfig) -> Self {
        let defaults = ServerConfig::default();
        ServerConfig {
            listen_addr: env.listen_addr.or(file.listen_addr).unwrap_or(defaults.listen_addr),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or(defaults.log_dir),
            gemini_api_key: usable_key(env.gemini_api_key.or(file.gemini_api_key)),
            gemini_model: env.gemini_model.or(file.gemini_model).unwrap_or(defaults.gemini_model),
            gemini_base_url: env
                .gemini_base_url
                .or(file.gemini_base_url)
                .unwrap_or(defaults.gemini_base_url),
            openai_api_key: usable_key(env.openai_api_key.or(file.openai_api_key)),
            openai_model: env.openai_model.or(file.openai_model).unwrap_or(defaults.openai_model),
            openai_base_url: env
                .openai_base_url
                .or(file.openai_base_url)
                .unwrap_or(defaults.openai_base_url),
            midjourney_api_key: usable_key(
                env.midjourney_api_key
                    .or(env.piapi_api_key)
                    .or(file.midjourney_api_key)
                    .or(file.piapi_api_key),
            ),
            midjourney_base_url: env
                .midjourney_base_url
                .or(file.midjourney_base_url)
                .unwrap_or(defaults.midjourney_base_url),
            midjourney_process_mode: env
                .midjourney_process_mode
                .or(file.midjourney_process_mode)
                .unwrap_or(defaults.midjourney_process_mode),
            text_timeout_secs: env
                .text_timeout_secs
                .or(file.text_timeout_secs)
                .unwrap_or(defaults.text_timeout_secs),
            image_timeout_secs: env
                .image_timeout_secs
                .or(file.image_timeout_secs)
                .unwrap_or(defaults.image_timeout_secs),
            image_poll_interval_secs: env
                .image_poll_interval_secs
                .or(file.image_poll_interval_secs)
                .unwrap_or(defaults.image_poll_interval_secs),
            image_max_polls: env
                .image_max_polls
                .or(file.image_max_polls)
                .unwrap_or(defaults.image_max_polls),
            temperature: env.temperature.or(file.temperature).unwrap_or(defaults.temperature),
            max_tags: env.max_tags.or(file.max_tags).unwrap_or(defaults.max_tags),
            batch_concurrency: env
                .batch_concurrency
                .or(file.batch_concurrency)
                .unwrap_or(defaults.batch_concurrency),
            package_max_age_hours: env
                .package_max_age_hours
                .or(file.package_max_age_hours)
                .unwrap_or(defaults.package_max_age_hours),
            cleanup_interval_secs: env
                .cleanup_interval_secs
                .or(file.cleanup_interval_secs)
                .unwrap_or(defaults.cleanup_interval_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini_api_key.is_none() && self.openai_api_key.is_none() {
            return Err(ConfigError::Invalid(
                "GEMINI_API_KEY or OPENAI_API_KEY is required".to_string(),
            ));
        }
        if self.midjourney_api_key.is_none() {
            return Err(ConfigError::Invalid(
                "MIDJOURNEY_API_KEY (or PIAPI_API_KEY) is required".to_string(),
            ));
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Invalid("batch_concurrency must be at least 1".to_string()));
        }
        if self.max_tags == 0 {
            return Err(ConfigError::Invalid("max_tags must be at least 1".to_string()));
        }
        if self.package_max_age_hours <= 0 {
            return Err(ConfigError::Invalid(
                "package_max_age_hours must be positive".to_string(),
            ));
        }
        if self.text_timeout_secs == 0 || self.image_timeout_secs == 0 {
            return Err(ConfigError::Invalid("provider timeouts must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn text_timeout(&self) -> Duration {
        Duration::from_secs(self.text_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    pub fn image_poll_interval(&self) -> Duration {
        Duration::from_secs(self.image_poll_interval_secs)
    }

    pub fn package_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.package_max_age_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn partial(toml_src: &str) -> PartialServerConfig {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_defaults_when_no_layers() {
        let config = ServerConfig::from_layers(PartialServerConfig::default(), PartialServerConfig::default());
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.openai_model, "gpt-4");
        assert_eq!(config.midjourney_base_url, "https://api.piapi.ai");
        assert_eq!(config.batch_concurrency, 2);
        assert_eq!(config.max_tags, 15);
        assert_eq!(config.image_max_polls, 120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = partial(
            r#"
            listen_addr = "127.0.0.1:9000"
            gemini_api_key = "file-key"
            max_tags = 10
            "#,
        );
        let env = partial(
            r#"
            gemini_api_key = "env-key"
            piapi_api_key = "mj-key"
            "#,
        );
        let config = ServerConfig::from_layers(file, env);
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.gemini_api_key.as_deref(), Some("env-key"));
        assert_eq!(config.midjourney_api_key.as_deref(), Some("mj-key"));
        assert_eq!(config.max_tags, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_placeholder_keys_are_absent() {
        let file = partial(
            r#"
            gemini_api_key = "your-gemini-api-key"
            openai_api_key = "   "
            midjourney_api_key = "real"
            "#,
        );
        let config = ServerConfig::from_layers(file, PartialServerConfig::default());
        assert!(config.gemini_api_key.is_none());
        assert!(config.openai_api_key.is_none());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_image_key_fails() {
        let file = partial(r#"openai_api_key = "sk-real""#);
        let err = ServerConfig::from_layers(file, PartialServerConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("MIDJOURNEY_API_KEY"));
    }

    #[test]
    fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_dir = \"/var/log/tubeforge\"\nbatch_concurrency = 4").unwrap();
        let partial = ServerConfig::read_file(file.path()).unwrap();
        let config = ServerConfig::from_layers(partial, PartialServerConfig::default());
        assert_eq!(config.log_dir, "/var/log/tubeforge");
        assert_eq!(config.batch_concurrency, 4);
    }

    #[test]
    fn test_read_file_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::read_file(&dir.path().join("absent.toml")).is_ok());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "max_tags = \"many\"").unwrap();
        assert!(matches!(
            ServerConfig::read_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
