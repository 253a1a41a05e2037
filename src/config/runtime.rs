use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::risk::{validate_initial_floor, validate_table, ConfiguredPolicy, RatchetStep, RatchetTable, RoeLadder};
use crate::types::RequestDefaults;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Margin per position when a request omits it.
    pub margin_usdt: Decimal,
    pub leverage: u32,
    /// ROE the stop guarantees before any trailing.
    pub initial_sl_roe: Decimal,
    pub trailing: TrailingSettings,
    pub server: ServerSettings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            margin_usdt: dec!(5),
            leverage: 20,
            initial_sl_roe: dec!(-20),
            trailing: TrailingSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.margin_usdt <= Decimal::ZERO {
            errors.push("margin_usdt must be > 0".to_string());
        }
        if self.leverage == 0 {
            errors.push("leverage must be >= 1".to_string());
        }
        if let Some(error) = validate_initial_floor(self.initial_sl_roe) {
            errors.push(error);
        }

        match &self.trailing {
            TrailingSettings::Ladder { step_roe } => {
                if *step_roe <= Decimal::ZERO {
                    errors.push(format!("trailing.step_roe must be > 0, got {}", step_roe));
                }
            }
            TrailingSettings::Table { steps } => {
                // initial floor problems were reported above
                errors.extend(
                    validate_table(self.initial_sl_roe, steps)
                        .into_iter()
                        .filter(|e| !e.starts_with("initial_sl_roe")),
                );
            }
        }

        if self.server.port == 0 {
            errors.push("server.port must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Builds the trailing policy; the initial floor always comes from `initial_sl_roe`.
    pub fn policy(&self) -> Result<ConfiguredPolicy, Vec<String>> {
        match &self.trailing {
            TrailingSettings::Ladder { step_roe } => {
                RoeLadder::new(self.initial_sl_roe, *step_roe).map(ConfiguredPolicy::Ladder)
            }
            TrailingSettings::Table { steps } => {
                RatchetTable::new(self.initial_sl_roe, steps.clone()).map(ConfiguredPolicy::Table)
            }
        }
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            margin: self.margin_usdt,
            leverage: self.leverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TrailingSettings {
    /// Floor rises by `step_roe` for every full `step_roe` of peak ROE.
    Ladder { step_roe: Decimal },
    /// Explicit (threshold_roe, floor_roe) rows, ascending.
    Table { steps: Vec<RatchetStep> },
}

impl Default for TrailingSettings {
    fn default() -> Self {
        TrailingSettings::Ladder { step_roe: dec!(5) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 5000,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}
