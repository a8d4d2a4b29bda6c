//! Domain snapshots and wire types.
//!
//! Snapshots are plain value structs: aggregators consume an old snapshot and
//! produce a new one, the store only ever swaps whole snapshots under a key
//! lock. Wire types carry the camelCase field names of the public API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────

/// Per-agent running aggregate. Mutated only by the agent aggregator,
/// exactly once per settled trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub total_pnl: Decimal,
    /// Derived: round_half_up(win_rate * 1000 + total_pnl). Unbounded.
    pub performance_score: i64,
}

impl AgentStats {
    /// winning / total, 4 decimal places. Zero for a fresh agent.
    pub fn win_rate(&self) -> Decimal {
        if self.total_trades == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.winning_trades) / Decimal::from(self.total_trades)).round_dp(4)
    }
}

/// Registered agent: identity plus its running stats.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub stats: AgentStats,
}

// ─────────────────────────────────────────────────────────
// Trade
// ─────────────────────────────────────────────────────────

/// Immutable ledger entry. Never mutated or deleted once committed
/// (except by agent removal, which cascades).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub id: u64,
    pub agent_key: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// amount_out - amount_in.
    pub profit_loss: Decimal,
    /// Strict: profit_loss > 0. Break-even counts as a loss.
    pub success: bool,
    pub strategy_fingerprint: Option<String>,
    pub committed_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Collective knowledge
// ─────────────────────────────────────────────────────────

/// Cross-agent aggregate for one strategy fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeStats {
    /// Arithmetic mean of success indicators, always within [0, 1].
    pub success_rate: Decimal,
    /// Observations of this fingerprint. Starts at 1, +1 per observation.
    pub usage_count: u64,
    pub average_profit: Decimal,
    pub last_used: DateTime<Utc>,
}

// ═════════════════════════════════════════════════════════
// Wire types (public API surface — field names are a
// compatibility contract, do not rename)
// ═════════════════════════════════════════════════════════

/// POST /api/trade request body. Amounts arrive as decimal strings and are
/// parsed at the boundary; parse failure is a validation error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub agent_key: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    #[serde(default)]
    pub strategy_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    pub success: bool,
    pub trade: TradeReceipt,
    pub updated_stats: UpdatedStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub id: u64,
    pub agent_key: String,
    pub profit_loss: Decimal,
    pub success: bool,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub performance_score: i64,
}

impl From<AgentStats> for UpdatedStats {
    fn from(s: AgentStats) -> Self {
        Self {
            total_trades: s.total_trades,
            winning_trades: s.winning_trades,
            win_rate: s.win_rate(),
            total_pnl: s.total_pnl,
            performance_score: s.performance_score,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentResponse {
    pub success: bool,
    pub agent_key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightEntry {
    pub strategy_fingerprint: String,
    pub success_rate: Decimal,
    pub usage_count: u64,
    pub average_profit: Decimal,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    pub insights: Vec<InsightEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub agent_key: String,
    pub name: String,
    pub performance_score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_agents: u64,
    pub total_trades: u64,
    pub total_volume: Decimal,
    pub avg_win_rate: Decimal,
    pub total_profit: Decimal,
    pub top_performers: Vec<TopPerformer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSummary {
    pub id: u64,
    pub committed_at: DateTime<Utc>,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub pnl: Decimal,
    pub success: bool,
}

impl From<&TradeRecord> for TradeSummary {
    fn from(t: &TradeRecord) -> Self {
        Self {
            id: t.id,
            committed_at: t.committed_at,
            token_in: t.token_in.clone(),
            token_out: t.token_out.clone(),
            amount_in: t.amount_in,
            amount_out: t.amount_out,
            pnl: t.profit_loss,
            success: t.success,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub agent_key: String,
    pub name: String,
    pub performance_score: i64,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub recent_trades: Vec<TradeSummary>,
    pub network_stats: NetworkSummary,
}

/// Compact network roll-up embedded in the agent profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub total_agents: u64,
    pub total_trades: u64,
    pub avg_win_rate: Decimal,
}
