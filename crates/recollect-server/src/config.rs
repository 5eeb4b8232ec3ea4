//! Server settings from the environment

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use recollect_core::RecollectConfig;
use thiserror::Error;

use crate::auth::AuthUser;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Settings the server reads at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`RECOLLECT_ADDR`)
    pub addr: String,
    /// CORS origins (`ALLOW_ORIGINS`, comma-separated); permissive when unset
    pub allow_origins: Option<Vec<String>>,
    /// Put error details in 401 bodies; off when `ENV=prod`
    pub detailed_errors: bool,
    /// Pipeline config file, TOML or JSON (`RECOLLECT_CONFIG`)
    pub config_path: Option<PathBuf>,
    /// Flag file, TOML or JSON (`RECOLLECT_FLAGS`)
    pub flags_path: Option<PathBuf>,
    /// Token table, JSON object of token to user (`RECOLLECT_TOKENS`)
    pub tokens_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            allow_origins: None,
            detailed_errors: true,
            config_path: None,
            flags_path: None,
            tokens_path: None,
        }
    }
}

/// Startup configuration error
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] recollect_core::ConfigError),
}

impl ServerConfig {
    /// Read settings from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allow_origins = non_empty("ALLOW_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        });

        let env = non_empty("ENV").unwrap_or_else(|| "dev".to_string());

        Self {
            addr: non_empty("RECOLLECT_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            allow_origins,
            detailed_errors: !env.eq_ignore_ascii_case("prod"),
            config_path: non_empty("RECOLLECT_CONFIG").map(PathBuf::from),
            flags_path: non_empty("RECOLLECT_FLAGS").map(PathBuf::from),
            tokens_path: non_empty("RECOLLECT_TOKENS").map(PathBuf::from),
        }
    }

    /// Load and validate the pipeline configuration, or defaults when unset
    pub fn pipeline_config(&self) -> Result<RecollectConfig, ConfigLoadError> {
        let config = match &self.config_path {
            Some(path) => load_pipeline_config(path)?,
            None => RecollectConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the token table, or an empty one when unset
    pub fn token_table(&self) -> Result<HashMap<String, AuthUser>, ConfigLoadError> {
        let Some(path) = &self.tokens_path else {
            return Ok(HashMap::new());
        };
        let text = read(path)?;
        serde_json::from_str(&text).map_err(|e| ConfigLoadError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn read(path: &Path) -> Result<String, ConfigLoadError> {
    std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn load_pipeline_config(path: &Path) -> Result<RecollectConfig, ConfigLoadError> {
    let text = read(path)?;
    let parse_error = |reason: String| ConfigLoadError::Parse {
        path: path.display().to_string(),
        reason,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => RecollectConfig::from_json(&text).map_err(|e| parse_error(e.to_string())),
        _ => RecollectConfig::from_toml(&text).map_err(|e| parse_error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.addr, DEFAULT_ADDR);
        assert!(config.allow_origins.is_none());
        assert!(config.detailed_errors);
        assert!(config.pipeline_config().is_ok());
        assert!(config.token_table().unwrap().is_empty());
    }

    #[test]
    fn reads_origins_and_prod_mode() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("RECOLLECT_ADDR", "0.0.0.0:9000"),
            ("ALLOW_ORIGINS", "https://app.example.com, https://admin.example.com,"),
            ("ENV", "prod"),
        ]));
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(
            config.allow_origins.unwrap(),
            vec!["https://app.example.com", "https://admin.example.com"]
        );
        assert!(!config.detailed_errors);
    }

    #[test]
    fn loads_pipeline_and_tokens_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("recollect.toml");
        std::fs::write(&config_path, "[worker]\nbatch_size = 5\n").unwrap();
        let tokens_path = dir.path().join("tokens.json");
        std::fs::write(
            &tokens_path,
            r#"{"secret": {"id": "92074329-d7e2-4bc7-a1cb-4a9c62477b4d", "email": "ada@example.com"}}"#,
        )
        .unwrap();

        let config = ServerConfig {
            config_path: Some(config_path),
            tokens_path: Some(tokens_path),
            ..Default::default()
        };
        assert_eq!(config.pipeline_config().unwrap().worker.batch_size, 5);
        let tokens = config.token_table().unwrap();
        assert_eq!(tokens["secret"].email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn invalid_pipeline_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recollect.json");
        std::fs::write(&path, r#"{"worker": {"min_delay_secs": 0}}"#).unwrap();

        let config = ServerConfig {
            config_path: Some(path),
            ..Default::default()
        };
        assert!(matches!(config.pipeline_config(), Err(ConfigLoadError::Invalid(_))));
    }
}
