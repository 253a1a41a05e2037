use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of a leveraged futures position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Fractional price move in the position's favour (0.01 = 1%).
    /// `None` when the ratio does not fit in a `Decimal`.
    pub fn favourable_move(&self, entry: Decimal, price: Decimal) -> Option<Decimal> {
        let delta = match self {
            Direction::Long => price.checked_sub(entry)?,
            Direction::Short => entry.checked_sub(price)?,
        };
        delta.checked_div(entry)
    }

    /// Price at which the favourable move from `entry` equals `fraction`.
    pub fn price_for_move(&self, entry: Decimal, fraction: Decimal) -> Option<Decimal> {
        let factor = match self {
            Direction::Long => Decimal::ONE.checked_add(fraction)?,
            Direction::Short => Decimal::ONE.checked_sub(fraction)?,
        };
        entry.checked_mul(factor)
    }

    /// True when `price` has reached a protective stop at `stop`.
    pub fn stop_hit(&self, price: Decimal, stop: Decimal) -> bool {
        match self {
            Direction::Long => price <= stop,
            Direction::Short => price >= stop,
        }
    }

    /// True when `candidate` locks in more profit than `current`.
    pub fn is_tighter(&self, candidate: Decimal, current: Decimal) -> bool {
        match self {
            Direction::Long => candidate > current,
            Direction::Short => candidate < current,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(format!("must be LONG or SHORT, got {:?}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
