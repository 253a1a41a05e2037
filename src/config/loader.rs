use config::{Config, Environment, File, FileFormat, Map};
use std::path::Path;
use tracing::{debug, info};

use super::runtime::RuntimeConfig;
use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "BOT";

/// Defaults, then the TOML file (optional), then `BOT_*` environment variables.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
    load_with_env(path, None)
}

/// Same as [`load_config`], reading variables from `env` instead of the process
/// environment when given.
pub fn load_with_env(
    path: Option<&Path>,
    env: Option<Map<String, String>>,
) -> Result<RuntimeConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&RuntimeConfig::default())?);

    if let Some(path) = path {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
        } else {
            debug!("Config file {} not found, using defaults", path.display());
        }
        builder = builder.add_source(
            File::new(&path.to_string_lossy(), FileFormat::Toml).required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let loaded: RuntimeConfig = builder.build()?.try_deserialize()?;
    loaded.validate().map_err(ConfigError::Invalid)?;
    Ok(loaded)
}

pub fn render_toml(config: &RuntimeConfig) -> anyhow::Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrailingSettings;
    use crate::risk::RatchetStep;
    use rust_decimal_macros::dec;
    use std::path::PathBuf;

    fn empty_env() -> Option<Map<String, String>> {
        Some(Map::new())
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("roi_trailing_bot_{}_{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("roi_trailing_bot_does_not_exist.toml");
        let config = load_with_env(Some(&path), empty_env()).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_file(
            "file_overrides",
            r#"
leverage = 10
initial_sl_roe = -30

[trailing]
mode = "table"

[[trailing.steps]]
threshold_roe = 10
floor_roe = 0

[[trailing.steps]]
threshold_roe = 50
floor_roe = 30

[server]
port = 8081
"#,
        );
        let config = load_with_env(Some(&path), empty_env()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.leverage, 10);
        assert_eq!(config.initial_sl_roe, dec!(-30));
        assert_eq!(config.margin_usdt, dec!(5));
        assert_eq!(config.server.port, 8081);
        assert_eq!(
            config.trailing,
            TrailingSettings::Table {
                steps: vec![
                    RatchetStep::new(dec!(10), dec!(0)),
                    RatchetStep::new(dec!(50), dec!(30)),
                ]
            }
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let path = temp_file("env_overrides", "leverage = 10\n");
        let mut env = Map::new();
        env.insert("BOT_LEVERAGE".to_string(), "25".to_string());
        env.insert("BOT_MARGIN_USDT".to_string(), "7.5".to_string());
        env.insert("BOT_SERVER__PORT".to_string(), "9000".to_string());

        let config = load_with_env(Some(&path), Some(env)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.leverage, 25);
        assert_eq!(config.margin_usdt, dec!(7.5));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut env = Map::new();
        env.insert("BOT_INITIAL_SL_ROE".to_string(), "15".to_string());
        let err = load_with_env(None, Some(env)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_render_toml_round_trips() {
        let rendered = render_toml(&RuntimeConfig::default()).unwrap();
        assert!(rendered.contains("mode = \"ladder\""));

        let parsed: RuntimeConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, RuntimeConfig::default());
    }
}
