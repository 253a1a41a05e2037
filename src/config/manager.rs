use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use super::runtime::RuntimeConfig;
use crate::error::ConfigError;

/// Dashboard builds that predate the lowercase schema still post these keys.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("BOT_MARGIN_USDT", "margin_usdt"),
    ("BOT_LEVERAGE", "leverage"),
    ("BOT_INITIAL_SL_ROE", "initial_sl_roe"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "config")]
pub enum ConfigChangeEvent {
    Updated(RuntimeConfig),
    Reset(RuntimeConfig),
}

impl ConfigChangeEvent {
    pub fn config(&self) -> &RuntimeConfig {
        match self {
            Self::Updated(config) | Self::Reset(config) => config,
        }
    }
}

pub struct RuntimeConfigManager {
    config: Arc<RwLock<RuntimeConfig>>,
    change_tx: broadcast::Sender<ConfigChangeEvent>,
}

impl RuntimeConfigManager {
    pub fn new(initial: RuntimeConfig) -> Self {
        let (change_tx, _) = broadcast::channel(32);
        Self {
            config: Arc::new(RwLock::new(initial)),
            change_tx,
        }
    }

    pub async fn get_config(&self) -> RuntimeConfig {
        self.config.read().await.clone()
    }

    /// Merges a partial settings object over the current config.
    pub async fn update_partial(&self, patch: Value) -> Result<RuntimeConfig, ConfigError> {
        let Value::Object(patch) = patch else {
            return Err(ConfigError::Invalid(vec!["config update must be a JSON object".to_string()]));
        };

        let mut config = self.config.write().await;
        let mut merged = serde_json::to_value(&*config)
            .map_err(|e| ConfigError::Invalid(vec![e.to_string()]))?;
        merge_object(&mut merged, normalize_keys(patch));

        let candidate: RuntimeConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::Invalid(vec![e.to_string()]))?;
        candidate.validate().map_err(ConfigError::Invalid)?;

        *config = candidate.clone();
        info!(
            "Configuration updated: margin={} leverage={}x initial_sl_roe={}%",
            candidate.margin_usdt, candidate.leverage, candidate.initial_sl_roe
        );
        let _ = self.change_tx.send(ConfigChangeEvent::Updated(candidate.clone()));
        Ok(candidate)
    }

    pub async fn reset(&self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        *self.config.write().await = defaults.clone();

        info!("Configuration reset to defaults");
        let _ = self.change_tx.send(ConfigChangeEvent::Reset(defaults.clone()));
        defaults
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_tx.subscribe()
    }
}

impl Clone for RuntimeConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            change_tx: self.change_tx.clone(),
        }
    }
}

fn normalize_keys(patch: Map<String, Value>) -> Map<String, Value> {
    patch
        .into_iter()
        .map(|(key, value)| {
            let key = LEGACY_KEYS
                .iter()
                .find(|(legacy, _)| *legacy == key)
                .map(|(_, current)| current.to_string())
                .unwrap_or(key);
            (key, value)
        })
        .collect()
}

fn merge_object(target: &mut Value, patch: Map<String, Value>) {
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in patch {
        if let Value::Object(nested) = value {
            if let Some(existing @ Value::Object(_)) = target.get_mut(&key) {
                merge_object(existing, nested);
                continue;
            }
            target.insert(key, Value::Object(nested));
        } else {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrailingSettings;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_partial_update_merges_and_notifies() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        let mut rx = manager.subscribe();

        let updated = manager
            .update_partial(json!({"leverage": 10, "server": {"port": 8080}}))
            .await
            .unwrap();

        assert_eq!(updated.leverage, 10);
        assert_eq!(updated.server.port, 8080);
        assert_eq!(updated.server.cors_origins, RuntimeConfig::default().server.cors_origins);
        assert_eq!(manager.get_config().await, updated);
        assert!(matches!(rx.recv().await.unwrap(), ConfigChangeEvent::Updated(c) if c.leverage == 10));
    }

    #[tokio::test]
    async fn test_legacy_keys_are_accepted() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        let updated = manager
            .update_partial(json!({"BOT_MARGIN_USDT": 12.5, "BOT_INITIAL_SL_ROE": -35, "TEST_MODE": true}))
            .await
            .unwrap();

        assert_eq!(updated.margin_usdt, dec!(12.5));
        assert_eq!(updated.initial_sl_roe, dec!(-35));
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_previous_config() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        let err = manager.update_partial(json!({"margin_usdt": -1})).await.unwrap_err();

        assert!(err.to_string().contains("margin_usdt must be > 0"));
        assert_eq!(manager.get_config().await, RuntimeConfig::default());
    }

    #[tokio::test]
    async fn test_switching_to_table_mode() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        let updated = manager
            .update_partial(json!({
                "trailing": {"mode": "table", "steps": [
                    {"threshold_roe": 10, "floor_roe": 0},
                    {"threshold_roe": 40, "floor_roe": 25}
                ]}
            }))
            .await
            .unwrap();

        assert!(matches!(updated.trailing, TrailingSettings::Table { ref steps } if steps.len() == 2));
        assert!(updated.policy().is_ok());
    }

    #[tokio::test]
    async fn test_non_object_patch_is_rejected() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        assert!(manager.update_partial(json!([1, 2])).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let manager = RuntimeConfigManager::new(RuntimeConfig::default());
        manager.update_partial(json!({"leverage": 3})).await.unwrap();

        let mut rx = manager.subscribe();
        let restored = manager.reset().await;

        assert_eq!(restored, RuntimeConfig::default());
        assert_eq!(manager.get_config().await, RuntimeConfig::default());
        assert!(matches!(rx.recv().await.unwrap(), ConfigChangeEvent::Reset(_)));
    }
}
