use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Margin-sized leveraged position, the unit every ROE figure is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeveragedPosition {
    pub direction: Direction,
    pub entry_price: Decimal,
    pub margin: Decimal,
    pub leverage: u32,
}

impl LeveragedPosition {
    pub fn new(direction: Direction, entry_price: Decimal, margin: Decimal, leverage: u32) -> Self {
        Self {
            direction,
            entry_price,
            margin,
            leverage,
        }
    }

    /// Unrealized PnL in quote currency. `None` on `Decimal` overflow.
    pub fn pnl_at(&self, price: Decimal) -> Option<Decimal> {
        self.direction
            .favourable_move(self.entry_price, price)?
            .checked_mul(self.margin)?
            .checked_mul(Decimal::from(self.leverage))
    }

    /// ROE in percent for a given PnL.
    pub fn roe_from_pnl(&self, pnl: Decimal) -> Option<Decimal> {
        pnl.checked_div(self.margin)?.checked_mul(Decimal::ONE_HUNDRED)
    }

    /// Price at which the position shows `roe` percent.
    pub fn price_at_roe(&self, roe: Decimal) -> Option<Decimal> {
        let fraction = roe
            .checked_div(Decimal::ONE_HUNDRED)?
            .checked_div(Decimal::from(self.leverage))?;
        self.direction.price_for_move(self.entry_price, fraction)
    }
}
