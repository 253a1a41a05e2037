use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::SimulationError;
use crate::risk::TrailingPolicy;
use crate::types::{SimulationRequest, SimulationStep};

const OUT_OF_RANGE: &str = "is out of range for the given entry, margin and leverage";

/// Replays a price path against an ROE-anchored trailing stop.
///
/// The stop reported on each step is the one resting when that price printed;
/// the ratchet computed from the step's peak ROE takes effect from the next
/// step. The first step therefore always carries the initial stop.
pub struct RoiTrailingSimulator<P> {
    policy: P,
}

impl<P: TrailingPolicy> RoiTrailingSimulator<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn run(&self, request: &SimulationRequest) -> Result<Vec<SimulationStep>, SimulationError> {
        simulate_roi_trailing(request, &self.policy)
    }
}

pub fn simulate_roi_trailing(
    request: &SimulationRequest,
    policy: &dyn TrailingPolicy,
) -> Result<Vec<SimulationStep>, SimulationError> {
    request.validate()?;

    let position = request.position();
    let direction = request.direction;

    let mut sl_roe = policy.initial_floor();
    let mut sl_price = position
        .price_at_roe(sl_roe)
        .ok_or_else(|| SimulationError::invalid("entry_price", OUT_OF_RANGE))?;
    let mut peak_roe: Option<Decimal> = None;
    let mut steps = Vec::with_capacity(request.prices.len());

    for (idx, &price) in request.prices.iter().enumerate() {
        let out_of_range = || SimulationError::invalid(format!("prices[{}]", idx), OUT_OF_RANGE);
        let pnl = position.pnl_at(price).ok_or_else(out_of_range)?;
        let roe = position.roe_from_pnl(pnl).ok_or_else(out_of_range)?;
        let peak = peak_roe.map_or(roe, |p| p.max(roe));
        peak_roe = Some(peak);

        let stopped_out = direction.stop_hit(price, sl_price);
        steps.push(SimulationStep {
            step: idx + 1,
            price,
            sl_price,
            sl_roe,
            roe,
            peak_roe: peak,
            pnl,
            stopped_out,
        });

        if stopped_out {
            debug!("step {}: {} stopped out at {} (sl {})", idx + 1, direction, price, sl_price);
            break;
        }

        let target_roe = policy.floor_for_peak(peak);
        let candidate = position.price_at_roe(target_roe).ok_or_else(out_of_range)?;
        if direction.is_tighter(candidate, sl_price) {
            debug!(
                "step {}: SL moved {} -> {} (roe floor {} -> {}, peak {})",
                idx + 1,
                sl_price,
                candidate,
                sl_roe,
                target_roe,
                peak
            );
            sl_price = candidate;
            sl_roe = target_roe;
        }
    }

    Ok(steps)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    pub steps_evaluated: usize,
    pub stopped_out: bool,
    pub exit_price: Decimal,
    pub final_pnl: Decimal,
    pub final_roe: Decimal,
    pub peak_roe: Decimal,
    pub final_sl_price: Decimal,
}

impl SimulationSummary {
    pub fn from_steps(steps: &[SimulationStep]) -> Option<Self> {
        let last = steps.last()?;
        Some(Self {
            steps_evaluated: steps.len(),
            stopped_out: last.stopped_out,
            exit_price: last.price,
            final_pnl: last.pnl,
            final_roe: last.roe,
            peak_roe: last.peak_roe,
            final_sl_price: last.sl_price,
        })
    }
}
