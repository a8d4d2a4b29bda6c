//! Incremental aggregators.
//!
//! Both functions are pure O(1) updates from the prior snapshot — never a
//! recomputation over history. Replaying the full ledger through them from
//! the zero state must reproduce the stored aggregate exactly; that equality
//! is the correctness contract the store's key locks protect.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{AgentStats, KnowledgeStats};

/// Round-half-up to the nearest integer: floor(x + 1/2).
///
/// Matches JS `Math.round`, including negative halves (−0.5 → 0, −2.5 → −2),
/// which `MidpointAwayFromZero` would not.
fn round_half_up(x: Decimal) -> i64 {
    let floored = (x + dec!(0.5)).floor();
    floored.to_i64().unwrap_or(if floored.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Apply one settled trade to an agent's running aggregate.
pub fn agent_update(old: &AgentStats, success: bool, profit_loss: Decimal) -> AgentStats {
    let total_trades = old.total_trades + 1;
    let winning_trades = old.winning_trades + u64::from(success);
    let total_pnl = old.total_pnl + profit_loss;

    // 0–1000-scaled win-rate term plus the raw pnl term, as the upstream
    // contract defines it. The units deliberately do not match.
    let rate = Decimal::from(winning_trades) / Decimal::from(total_trades);
    let performance_score = round_half_up(rate * dec!(1000) + total_pnl);

    AgentStats {
        total_trades,
        winning_trades,
        total_pnl,
        performance_score,
    }
}

/// Apply one observation of a strategy fingerprint.
///
/// Online mean weighted by the OLD usage count — weighting by the new count
/// would skew every mean. Requires updates to one fingerprint to be applied
/// serially; under that ordering the result equals the arithmetic mean over
/// all historical observations regardless of arrival interleaving.
pub fn collective_update(
    old: Option<&KnowledgeStats>,
    success: bool,
    profit_loss: Decimal,
    now: DateTime<Utc>,
) -> KnowledgeStats {
    let indicator = if success { Decimal::ONE } else { Decimal::ZERO };

    match old {
        None => KnowledgeStats {
            success_rate: indicator,
            usage_count: 1,
            average_profit: profit_loss,
            last_used: now,
        },
        Some(k) => {
            let n = Decimal::from(k.usage_count);
            let n1 = n + Decimal::ONE;
            KnowledgeStats {
                success_rate: (k.success_rate * n + indicator) / n1,
                average_profit: (k.average_profit * n + profit_loss) / n1,
                usage_count: k.usage_count + 1,
                last_used: now,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
