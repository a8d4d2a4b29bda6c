//! Read-only projections over the maintained aggregates.
//!
//! No aggregation logic of its own — filtering, sorting, truncating. Every
//! value served here was produced by the settlement path.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::error::HiveError;
use super::store::Store;
use super::types::{
    AgentProfile, InsightEntry, NetworkStats, NetworkSummary, TopPerformer, TradeSummary,
};

pub const DEFAULT_INSIGHTS_LIMIT: usize = 10;
const TOP_PERFORMERS: usize = 10;
const RECENT_TRADES: usize = 10;

/// Knowledge records below this success rate are noise, not insight.
const INSIGHT_THRESHOLD: Decimal = Decimal::from_parts(6, 0, 0, false, 1); // 0.6

pub struct Queries {
    store: Arc<Store>,
}

impl Queries {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Proven strategies: success_rate > 0.6, best first.
    pub async fn insights(&self, limit: Option<usize>) -> Vec<InsightEntry> {
        let limit = limit.unwrap_or(DEFAULT_INSIGHTS_LIMIT);
        let mut entries: Vec<InsightEntry> = self
            .store
            .knowledge_snapshot()
            .await
            .into_iter()
            .filter(|(_, k)| k.success_rate > INSIGHT_THRESHOLD)
            .map(|(fp, k)| InsightEntry {
                strategy_fingerprint: fp,
                success_rate: k.success_rate,
                usage_count: k.usage_count,
                average_profit: k.average_profit,
                last_used: k.last_used,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.success_rate
                .cmp(&a.success_rate)
                .then(b.average_profit.cmp(&a.average_profit))
        });
        entries.truncate(limit);
        entries
    }

    pub async fn network_stats(&self) -> NetworkStats {
        let agents = self.store.agents_snapshot().await;
        let trades = self.store.trades_snapshot().await;

        let total_volume = trades.iter().map(|t| t.amount_out.abs()).sum();
        let total_profit = trades.iter().map(|t| t.profit_loss).sum();
        let avg_win_rate = win_rate_over(&trades);

        let mut performers: Vec<TopPerformer> = agents
            .iter()
            .map(|a| TopPerformer {
                agent_key: a.key.clone(),
                name: a.name.clone(),
                performance_score: a.stats.performance_score,
            })
            .collect();
        performers.sort_by(|a, b| b.performance_score.cmp(&a.performance_score));
        performers.truncate(TOP_PERFORMERS);

        NetworkStats {
            total_agents: agents.len() as u64,
            total_trades: trades.len() as u64,
            total_volume,
            avg_win_rate,
            total_profit,
            top_performers: performers,
        }
    }

    pub async fn agent_profile(&self, key: &str) -> Result<AgentProfile, HiveError> {
        let handle = self
            .store
            .agent_handle(key)
            .await
            .ok_or_else(|| HiveError::NotFound(format!("agent {key}")))?;
        let record = handle.lock().await.clone();

        let recent_trades: Vec<TradeSummary> = self
            .store
            .recent_trades(key, RECENT_TRADES)
            .await
            .iter()
            .map(TradeSummary::from)
            .collect();

        let agents = self.store.agents_snapshot().await;
        let trades = self.store.trades_snapshot().await;
        let network_stats = NetworkSummary {
            total_agents: agents.len() as u64,
            total_trades: trades.len() as u64,
            avg_win_rate: win_rate_over(&trades),
        };

        Ok(AgentProfile {
            agent_key: record.key,
            name: record.name,
            performance_score: record.stats.performance_score,
            total_trades: record.stats.total_trades,
            winning_trades: record.stats.winning_trades,
            win_rate: record.stats.win_rate(),
            total_pnl: record.stats.total_pnl,
            recent_trades,
            network_stats,
        })
    }
}

fn win_rate_over(trades: &[super::types::TradeRecord]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let wins = trades.iter().filter(|t| t.success).count();
    (Decimal::from(wins) / Decimal::from(trades.len())).round_dp(4)
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::service::{Settlement, SubmitRequest};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn seeded() -> (Arc<Store>, Settlement, Queries) {
        let store = Arc::new(Store::new(Duration::from_millis(200)));
        let settlement = Settlement::new(Arc::clone(&store));
        let queries = Queries::new(Arc::clone(&store));
        (store, settlement, queries)
    }

    fn req(key: &str, amount_out: Decimal, fp: &str) -> SubmitRequest {
        SubmitRequest {
            agent_key: key.to_string(),
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount_in: dec!(10),
            amount_out,
            strategy_fingerprint: Some(fp.to_string()),
        }
    }

    #[tokio::test]
    async fn test_insights_filter_order_and_limit() {
        let (store, svc, q) = seeded().await;
        let a = store.register_agent(None).await;

        // H_GOOD: 2/2 wins. H_MIXED: 1/2. H_BAD: 0/1.
        svc.submit(req(&a.key, dec!(15), "H_GOOD")).await.unwrap();
        svc.submit(req(&a.key, dec!(12), "H_GOOD")).await.unwrap();
        svc.submit(req(&a.key, dec!(15), "H_MIXED")).await.unwrap();
        svc.submit(req(&a.key, dec!(8), "H_MIXED")).await.unwrap();
        svc.submit(req(&a.key, dec!(8), "H_BAD")).await.unwrap();

        let insights = q.insights(None).await;
        assert_eq!(insights.len(), 1); // 0.5 and 0.0 filtered out
        assert_eq!(insights[0].strategy_fingerprint, "H_GOOD");
        assert_eq!(insights[0].success_rate, dec!(1));

        let capped = q.insights(Some(0)).await;
        assert!(capped.is_empty());
    }

    #[tokio::test]
    async fn test_insights_tiebreak_on_average_profit() {
        let (store, svc, q) = seeded().await;
        let a = store.register_agent(None).await;

        // Both 100% success; H_RICH earns more per trade.
        svc.submit(req(&a.key, dec!(12), "H_POOR")).await.unwrap();
        svc.submit(req(&a.key, dec!(19), "H_RICH")).await.unwrap();

        let insights = q.insights(None).await;
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].strategy_fingerprint, "H_RICH");
        assert_eq!(insights[1].strategy_fingerprint, "H_POOR");
    }

    #[tokio::test]
    async fn test_network_stats_roll_up() {
        let (store, svc, q) = seeded().await;
        let a = store.register_agent(None).await;
        let b = store.register_agent(None).await;

        svc.submit(req(&a.key, dec!(15), "H1")).await.unwrap(); // +5 win
        svc.submit(req(&b.key, dec!(8), "H1")).await.unwrap(); // −2 loss

        let stats = q.network_stats().await;
        assert_eq!(stats.total_agents, 2);
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.total_volume, dec!(23));
        assert_eq!(stats.total_profit, dec!(3));
        assert_eq!(stats.avg_win_rate, dec!(0.5));
        assert_eq!(stats.top_performers.len(), 2);
        // Winner first: a scored 1005, b scored −2.
        assert_eq!(stats.top_performers[0].agent_key, a.key);
    }

    #[tokio::test]
    async fn test_agent_profile_recent_trades_newest_first() {
        let (store, svc, q) = seeded().await;
        let a = store.register_agent(Some("Scout".into())).await;

        for i in 0..12u32 {
            svc.submit(req(&a.key, dec!(10) + Decimal::from(i), "H1"))
                .await
                .unwrap();
        }

        let profile = q.agent_profile(&a.key).await.unwrap();
        assert_eq!(profile.name, "Scout");
        assert_eq!(profile.total_trades, 12);
        assert_eq!(profile.recent_trades.len(), 10);
        assert_eq!(profile.recent_trades[0].id, 12); // newest first
        assert_eq!(profile.network_stats.total_trades, 12);
    }

    #[tokio::test]
    async fn test_agent_profile_not_found() {
        let (_store, _svc, q) = seeded().await;
        let err = q.agent_profile("agent_ghost").await.unwrap_err();
        assert!(matches!(err, HiveError::NotFound(_)));
    }
}
