use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Maps the best ROE a position has reached to the ROE its stop must guarantee.
///
/// Implementations must be monotonic: a higher peak never yields a lower floor.
pub trait TrailingPolicy: Send + Sync {
    /// Floor in force before the position has made any progress.
    fn initial_floor(&self) -> Decimal;

    fn floor_for_peak(&self, peak_roe: Decimal) -> Decimal;
}

/// One row of a ratchet table: once peak ROE reaches `threshold_roe`, the stop
/// guarantees at least `floor_roe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetStep {
    pub threshold_roe: Decimal,
    pub floor_roe: Decimal,
}

impl RatchetStep {
    #[cfg(test)]
    pub fn new(threshold_roe: Decimal, floor_roe: Decimal) -> Self {
        Self {
            threshold_roe,
            floor_roe,
        }
    }
}

/// Explicit, ordered ratchet table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetTable {
    initial_floor: Decimal,
    steps: Vec<RatchetStep>,
}

impl RatchetTable {
    pub fn new(initial_floor: Decimal, steps: Vec<RatchetStep>) -> Result<Self, Vec<String>> {
        let errors = validate_table(initial_floor, &steps);
        if errors.is_empty() {
            Ok(Self {
                initial_floor,
                steps,
            })
        } else {
            Err(errors)
        }
    }
}

impl TrailingPolicy for RatchetTable {
    fn initial_floor(&self) -> Decimal {
        self.initial_floor
    }

    fn floor_for_peak(&self, peak_roe: Decimal) -> Decimal {
        self.steps
            .iter()
            .take_while(|step| step.threshold_roe <= peak_roe)
            .last()
            .map(|step| step.floor_roe)
            .unwrap_or(self.initial_floor)
    }
}

/// Initial floor must sit in (-100, 0): at -100% ROE a 1x long is already at price zero.
pub fn validate_initial_floor(initial_floor: Decimal) -> Option<String> {
    if initial_floor >= Decimal::ZERO || initial_floor <= dec!(-100) {
        Some(format!(
            "initial_sl_roe must be between -100 and 0 (exclusive), got {}",
            initial_floor
        ))
    } else {
        None
    }
}

pub fn validate_table(initial_floor: Decimal, steps: &[RatchetStep]) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(error) = validate_initial_floor(initial_floor) {
        errors.push(error);
    }

    for (idx, step) in steps.iter().enumerate() {
        if step.floor_roe >= step.threshold_roe {
            errors.push(format!(
                "trailing.steps[{}]: floor_roe {} must be below threshold_roe {}",
                idx, step.floor_roe, step.threshold_roe
            ));
        }
    }

    if let Some(first) = steps.first() {
        if first.floor_roe <= initial_floor {
            errors.push(format!(
                "trailing.steps[0]: floor_roe {} must be above initial_sl_roe {}",
                first.floor_roe, initial_floor
            ));
        }
    }

    for (idx, pair) in steps.windows(2).enumerate() {
        if pair[1].threshold_roe <= pair[0].threshold_roe {
            errors.push(format!(
                "trailing.steps[{}]: threshold_roe must increase strictly",
                idx + 1
            ));
        }
        if pair[1].floor_roe <= pair[0].floor_roe {
            errors.push(format!(
                "trailing.steps[{}]: floor_roe must increase strictly",
                idx + 1
            ));
        }
    }

    errors
}

/// Unbounded staircase: every full `step_roe` of peak ROE lifts the floor by `step_roe`.
///
/// With the defaults (-20, 5) a peak of 12% ROE gives a floor of -10%, a peak of
/// 20% gives break-even, and so on without limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoeLadder {
    pub initial_floor: Decimal,
    pub step_roe: Decimal,
}

impl RoeLadder {
    pub fn new(initial_floor: Decimal, step_roe: Decimal) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();
        if let Some(error) = validate_initial_floor(initial_floor) {
            errors.push(error);
        }
        if step_roe <= Decimal::ZERO {
            errors.push(format!("trailing.step_roe must be > 0, got {}", step_roe));
        }
        if errors.is_empty() {
            Ok(Self {
                initial_floor,
                step_roe,
            })
        } else {
            Err(errors)
        }
    }
}

impl Default for RoeLadder {
    fn default() -> Self {
        Self {
            initial_floor: dec!(-20),
            step_roe: dec!(5),
        }
    }
}

impl TrailingPolicy for RoeLadder {
    fn initial_floor(&self) -> Decimal {
        self.initial_floor
    }

    fn floor_for_peak(&self, peak_roe: Decimal) -> Decimal {
        if peak_roe <= Decimal::ZERO {
            return self.initial_floor;
        }
        let steps = (peak_roe / self.step_roe).floor();
        (steps * self.step_roe + self.initial_floor).max(self.initial_floor)
    }
}

/// Policy chosen at runtime from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfiguredPolicy {
    Ladder(RoeLadder),
    Table(RatchetTable),
}

impl TrailingPolicy for ConfiguredPolicy {
    fn initial_floor(&self) -> Decimal {
        match self {
            Self::Ladder(ladder) => ladder.initial_floor(),
            Self::Table(table) => table.initial_floor(),
        }
    }

    fn floor_for_peak(&self, peak_roe: Decimal) -> Decimal {
        match self {
            Self::Ladder(ladder) => ladder.floor_for_peak(peak_roe),
            Self::Table(table) => table.floor_for_peak(peak_roe),
        }
    }
}
