//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod conversion;
pub mod logging;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::app::ServerConfig;
use self::conversion::ConversionConfig;
use self::logging::LoggingConfig;

pub use self::app::CorsConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Conversion pipeline settings.
    #[serde(default)]
    #[validate(nested)]
    pub conversion: ConversionConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `DOCFORGE__`. A bare `PORT`
    /// variable overrides `server.port`.
    pub fn load(env: &str) -> AppResult<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<i64>().ok());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCFORGE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("conversion.disabled_operations")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port)?
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        tracing::debug!(env, port = config.server.port, "Configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [server]
            port = 8081

            [conversion]
            ghostscript_bin = "/opt/gs/bin/gs"
        "#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse toml");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.conversion.ghostscript_bin, "/opt/gs/bin/gs");
        assert_eq!(config.conversion.libreoffice_bin, "libreoffice");
        assert_eq!(config.conversion.image_quality, 80);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let mut config = AppConfig::default();
        config.conversion.image_quality = 0;
        assert!(config.validate().is_err());
    }
}
