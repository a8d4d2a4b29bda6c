//! Trade settlement — the one component allowed to decide atomicity
//! outcomes.
//!
//! A submission is one synchronous unit of work: validate, lock the agent key
//! (and the fingerprint key if present), stage both aggregate updates, then
//! commit ledger append + agent snapshot + knowledge snapshot together. Every
//! fallible step (validation, lookup, lock acquisition) completes before the
//! first write; the writes themselves happen with no await between them, so a
//! dropped caller either committed everything or nothing.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::aggregate::{agent_update, collective_update};
use super::error::HiveError;
use super::store::Store;
use super::types::{AgentStats, TradeRecord};

/// One submission, already parsed to primitives at the boundary.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub agent_key: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    pub strategy_fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub trade: TradeRecord,
    pub stats: AgentStats,
}

pub struct Settlement {
    store: Arc<Store>,
}

impl Settlement {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, req: SubmitRequest) -> Result<SettlementOutcome, HiveError> {
        validate(&req)?;

        // ── Acquire the key locks (agent first, then fingerprint) ──
        let handle = self
            .store
            .agent_handle(&req.agent_key)
            .await
            .ok_or_else(|| HiveError::NotFound(format!("agent {}", req.agent_key)))?;
        let mut agent = self.store.lock_record(&handle, "agent").await?;
        if !self.store.agent_still_linked(&req.agent_key, &handle).await {
            // Removed while the lock was pending.
            return Err(HiveError::NotFound(format!("agent {}", req.agent_key)));
        }

        let mut knowledge = match req.strategy_fingerprint.as_deref() {
            Some(fp) => {
                let slot = self.store.knowledge_slot(fp).await;
                Some(self.store.lock_record(&slot, "knowledge").await?)
            }
            None => None,
        };

        // ── Derive the outcome and stage both updates ──
        let now = Utc::now();
        let profit_loss = req.amount_out - req.amount_in;
        let success = profit_loss > Decimal::ZERO;

        let new_stats = agent_update(&agent.stats, success, profit_loss);
        let new_knowledge = knowledge
            .as_deref()
            .map(|k| collective_update(k.as_ref(), success, profit_loss, now));

        // ── Commit: ledger row, agent snapshot, knowledge snapshot ──
        let trade = self
            .store
            .append_trade(TradeRecord {
                id: 0,
                agent_key: req.agent_key.clone(),
                token_in: req.token_in,
                token_out: req.token_out,
                amount_in: req.amount_in,
                amount_out: req.amount_out,
                profit_loss,
                success,
                strategy_fingerprint: req.strategy_fingerprint,
                committed_at: now,
            })
            .await;
        agent.stats = new_stats;
        if let (Some(guard), Some(next)) = (knowledge.as_mut(), new_knowledge) {
            **guard = Some(next);
        }

        info!(
            "💰 Settled trade #{} agent={} pnl={} success={} score={}",
            trade.id, trade.agent_key, trade.profit_loss, trade.success, new_stats.performance_score,
        );

        Ok(SettlementOutcome {
            trade,
            stats: new_stats,
        })
    }
}

fn validate(req: &SubmitRequest) -> Result<(), HiveError> {
    if req.agent_key.trim().is_empty() {
        return Err(HiveError::Validation("agentKey is required".into()));
    }
    if req.token_in.trim().is_empty() || req.token_out.trim().is_empty() {
        return Err(HiveError::Validation(
            "tokenIn and tokenOut are required".into(),
        ));
    }
    if req.amount_in <= Decimal::ZERO {
        warn!("🚫 Rejected trade for {}: non-positive amountIn", req.agent_key);
        return Err(HiveError::Validation("amountIn must be > 0".into()));
    }
    if req.amount_out < Decimal::ZERO {
        return Err(HiveError::Validation("amountOut must be >= 0".into()));
    }
    if matches!(req.strategy_fingerprint.as_deref(), Some(fp) if fp.trim().is_empty()) {
        return Err(HiveError::Validation(
            "strategyFingerprint must not be blank".into(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
