//! Process-wide configuration for MagnetoDB.
//!
//! All configuration is driven by environment variables.

use crate::types::ProjectId;

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line records.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

/// Global configuration for MagnetoDB.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnetoConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log record format.
    pub log_format: LogFormat,
    /// Project used for requests that do not carry one.
    pub default_project: ProjectId,
}

impl Default for MagnetoConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: LogFormat::Text,
            default_project: ProjectId::default(),
        }
    }
}

impl MagnetoConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if `MAGNETODB_DEFAULT_PROJECT` is not a valid project id
    /// or `LOG_FORMAT` is neither `text` nor `json`.
    pub fn from_env() -> crate::MagnetoCoreResult<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            config.log_format = parse_log_format(&v)?;
        }
        if let Ok(v) = std::env::var("MAGNETODB_DEFAULT_PROJECT") {
            config.default_project = ProjectId::new(v)?;
        }

        Ok(config)
    }
}

fn parse_log_format(raw: &str) -> crate::MagnetoCoreResult<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(crate::MagnetoCoreError::Config(format!(
            "unsupported LOG_FORMAT '{other}', expected 'text' or 'json'"
        ))),
    }
}
