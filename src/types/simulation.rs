use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Direction, LeveragedPosition};
use crate::error::SimulationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub entry_price: Decimal,
    pub direction: Direction,
    pub margin: Decimal,
    pub leverage: u32,
    pub prices: Vec<Decimal>,
}

impl SimulationRequest {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.entry_price <= Decimal::ZERO {
            return Err(SimulationError::invalid("entry_price", "must be greater than 0"));
        }
        if self.margin <= Decimal::ZERO {
            return Err(SimulationError::invalid("margin", "must be greater than 0"));
        }
        if self.leverage < 1 {
            return Err(SimulationError::invalid("leverage", "must be at least 1"));
        }
        if self.prices.is_empty() {
            return Err(SimulationError::invalid("prices", "must contain at least one price"));
        }
        if let Some(idx) = self.prices.iter().position(|p| *p <= Decimal::ZERO) {
            return Err(SimulationError::invalid(
                format!("prices[{}]", idx),
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn position(&self) -> LeveragedPosition {
        LeveragedPosition::new(self.direction, self.entry_price, self.margin, self.leverage)
    }
}

/// One evaluated price of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStep {
    /// 1-based position in the input price path.
    pub step: usize,
    pub price: Decimal,
    /// Stop trigger resting when this price printed.
    pub sl_price: Decimal,
    pub sl_roe: Decimal,
    pub roe: Decimal,
    pub peak_roe: Decimal,
    pub pnl: Decimal,
    /// Set on the terminal step where the stop closed the position.
    #[serde(default)]
    pub stopped_out: bool,
}

/// Fallbacks for fields the dashboard may leave out of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    pub margin: Decimal,
    pub leverage: u32,
}

/// Loosely typed request body, so every rejection can name its field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationPayload {
    #[serde(default)]
    pub entry_price: Option<Value>,
    #[serde(default)]
    pub direction: Option<Value>,
    #[serde(default)]
    pub margin: Option<Value>,
    #[serde(default)]
    pub leverage: Option<Value>,
    #[serde(default)]
    pub prices: Option<Value>,
}

impl SimulationPayload {
    pub fn into_request(self, defaults: RequestDefaults) -> Result<SimulationRequest, SimulationError> {
        let entry_price = match present(self.entry_price) {
            Some(value) => number_field("entry_price", &value)?,
            None => return Err(SimulationError::invalid("entry_price", "is required")),
        };

        let direction = match present(self.direction) {
            Some(Value::String(raw)) => raw
                .parse::<Direction>()
                .map_err(|reason| SimulationError::invalid("direction", reason))?,
            Some(_) => return Err(SimulationError::invalid("direction", "must be a string")),
            None => return Err(SimulationError::invalid("direction", "is required")),
        };

        let margin = match present(self.margin) {
            Some(value) => number_field("margin", &value)?,
            None => defaults.margin,
        };

        let leverage = match present(self.leverage) {
            Some(value) => leverage_field(&value)?,
            None => defaults.leverage,
        };

        let prices = match present(self.prices) {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| number_field(&format!("prices[{}]", idx), item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SimulationError::invalid("prices", "must be a list of numbers")),
            None => return Err(SimulationError::invalid("prices", "is required")),
        };

        let request = SimulationRequest {
            entry_price,
            direction,
            margin,
            leverage,
            prices,
        };
        request.validate()?;
        Ok(request)
    }
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn number_field(field: &str, value: &Value) -> Result<Decimal, SimulationError> {
    if !value.is_number() {
        return Err(SimulationError::invalid(field, "must be a number"));
    }
    <Decimal as Deserialize>::deserialize(value)
        .map_err(|_| SimulationError::invalid(field, "must be a finite number"))
}

fn leverage_field(value: &Value) -> Result<u32, SimulationError> {
    let raw = number_field("leverage", value)?;
    if !raw.fract().is_zero() {
        return Err(SimulationError::invalid("leverage", "must be a whole number"));
    }
    if raw < Decimal::ONE {
        return Err(SimulationError::invalid("leverage", "must be at least 1"));
    }
    raw.to_u32()
        .ok_or_else(|| SimulationError::invalid("leverage", "is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            margin: dec!(5),
            leverage: 20,
        }
    }

    fn payload(value: Value) -> SimulationPayload {
        serde_json::from_value(value).unwrap()
    }

    fn rejected_field(value: Value) -> String {
        payload(value)
            .into_request(defaults())
            .unwrap_err()
            .field()
            .to_string()
    }

    #[test]
    fn test_full_payload_converts() {
        let request = payload(json!({
            "entry_price": 100,
            "direction": "short",
            "margin": 7.5,
            "leverage": 10,
            "prices": [100, 99.5, 101]
        }))
        .into_request(defaults())
        .unwrap();

        assert_eq!(request.direction, Direction::Short);
        assert_eq!(request.margin, dec!(7.5));
        assert_eq!(request.leverage, 10);
        assert_eq!(request.prices, vec![dec!(100), dec!(99.5), dec!(101)]);
    }

    #[test]
    fn test_margin_and_leverage_fall_back_to_defaults() {
        let request = payload(json!({
            "entry_price": 100,
            "direction": "LONG",
            "prices": [101]
        }))
        .into_request(defaults())
        .unwrap();

        assert_eq!(request.margin, dec!(5));
        assert_eq!(request.leverage, 20);
    }

    #[test]
    fn test_rejections_name_the_field() {
        let base = json!({"entry_price": 100, "direction": "LONG", "prices": [100]});

        let mut missing_entry = base.clone();
        missing_entry.as_object_mut().unwrap().remove("entry_price");
        assert_eq!(rejected_field(missing_entry), "entry_price");

        let mut bad_direction = base.clone();
        bad_direction["direction"] = json!("SIDEWAYS");
        assert_eq!(rejected_field(bad_direction), "direction");

        let mut zero_margin = base.clone();
        zero_margin["margin"] = json!(0);
        assert_eq!(rejected_field(zero_margin), "margin");

        let mut negative_leverage = base.clone();
        negative_leverage["leverage"] = json!(-3);
        assert_eq!(rejected_field(negative_leverage), "leverage");

        let mut fractional_leverage = base.clone();
        fractional_leverage["leverage"] = json!(2.5);
        assert_eq!(rejected_field(fractional_leverage), "leverage");

        let mut empty_prices = base.clone();
        empty_prices["prices"] = json!([]);
        assert_eq!(rejected_field(empty_prices), "prices");

        let mut bad_price = base.clone();
        bad_price["prices"] = json!([100, 101, -1]);
        assert_eq!(rejected_field(bad_price), "prices[2]");

        let mut text_price = base;
        text_price["prices"] = json!([100, "abc"]);
        assert_eq!(rejected_field(text_price), "prices[1]");
    }

    #[test]
    fn test_numbers_beyond_decimal_range_are_rejected() {
        let err = payload(json!({"entry_price": 1e30, "direction": "LONG", "prices": [100]}))
            .into_request(defaults())
            .unwrap_err();
        assert_eq!(err.field(), "entry_price");
        assert!(err.to_string().contains("finite number"));

        let request = payload(json!({"entry_price": 0.5, "direction": "LONG", "prices": [1e20]}))
            .into_request(defaults())
            .unwrap();
        assert_eq!(request.entry_price, dec!(0.5));
        assert_eq!(request.prices, vec![dec!(100000000000000000000)]);
    }

    #[test]
    fn test_whole_float_leverage_is_accepted() {
        let request = payload(json!({
            "entry_price": 100,
            "direction": "LONG",
            "leverage": 25.0,
            "prices": [100]
        }))
        .into_request(defaults())
        .unwrap();
        assert_eq!(request.leverage, 25);
    }

    #[test]
    fn test_validate_rejects_non_positive_entry() {
        let request = SimulationRequest {
            entry_price: dec!(0),
            direction: Direction::Long,
            margin: dec!(5),
            leverage: 20,
            prices: vec![dec!(1)],
        };
        assert_eq!(request.validate().unwrap_err().field(), "entry_price");
    }
}
