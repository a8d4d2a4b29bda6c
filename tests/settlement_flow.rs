//! End-to-end settlement flow: concurrency, linearization, and the
//! replay-from-ledger equality that defines the incremental aggregators.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use hivemind::settlement::aggregate::{agent_update, collective_update};
use hivemind::settlement::service::{Settlement, SubmitRequest};
use hivemind::settlement::store::Store;
use hivemind::settlement::types::AgentStats;

fn harness(lock_timeout_ms: u64) -> (Arc<Store>, Arc<Settlement>) {
    let store = Arc::new(Store::new(Duration::from_millis(lock_timeout_ms)));
    let settlement = Arc::new(Settlement::new(Arc::clone(&store)));
    (store, settlement)
}

fn req(agent_key: &str, amount_out: Decimal, fp: Option<&str>) -> SubmitRequest {
    SubmitRequest {
        agent_key: agent_key.to_string(),
        token_in: "SOL".into(),
        token_out: "USDC".into(),
        amount_in: dec!(10),
        amount_out,
        strategy_fingerprint: fp.map(str::to_string),
    }
}

/// Rebuild an agent's aggregate from the committed ledger, zero state up.
async fn replay_agent(store: &Store, key: &str) -> AgentStats {
    let mut stats = AgentStats::default();
    for t in store.trades_snapshot().await {
        if t.agent_key == key {
            stats = agent_update(&stats, t.success, t.profit_loss);
        }
    }
    stats
}

#[tokio::test]
async fn concurrent_same_agent_submissions_lose_nothing() {
    let (store, svc) = harness(5_000);
    let agent = store.register_agent(None).await;

    const N: usize = 64;
    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let svc = Arc::clone(&svc);
            let key = agent.key.clone();
            // Alternate wins (+2) and losses (−3).
            let out = if i % 2 == 0 { dec!(12) } else { dec!(7) };
            tokio::spawn(async move { svc.submit(req(&key, out, Some("H1"))).await })
        })
        .collect();

    for r in join_all(tasks).await {
        r.expect("task panicked").expect("submission failed");
    }

    let live = store.agent_handle(&agent.key).await.unwrap().lock().await.stats;
    assert_eq!(live.total_trades as usize, N);
    assert_eq!(live.winning_trades as usize, N / 2);
    assert_eq!(live.total_pnl, dec!(2) * Decimal::from(32) - dec!(3) * Decimal::from(32));
    assert!(live.winning_trades <= live.total_trades);

    // The stored aggregate must equal a full replay of the ledger.
    assert_eq!(live, replay_agent(&store, &agent.key).await);

    let knowledge = store.knowledge_snapshot().await;
    assert_eq!(knowledge.len(), 1);
    let (_, k) = &knowledge[0];
    assert_eq!(k.usage_count as usize, N);
    // The online mean carries at most one 28-digit division rounding per
    // observation, so compare within a tolerance far above that noise floor.
    assert!((k.success_rate - dec!(0.5)).abs() < dec!(0.000000000000000000000001));
    assert!(k.success_rate >= Decimal::ZERO && k.success_rate <= Decimal::ONE);
}

#[tokio::test]
async fn shared_fingerprint_mean_is_order_independent() {
    // Two agents, interleaved observations of one fingerprint. Whatever the
    // commit order, the serialized per-key updates must land on the
    // arithmetic mean of the indicators.
    let (store, svc) = harness(5_000);
    let a = store.register_agent(None).await;
    let b = store.register_agent(None).await;

    const PER_AGENT: usize = 20;
    let mut tasks = Vec::new();
    for i in 0..PER_AGENT {
        for key in [&a.key, &b.key] {
            let svc = Arc::clone(&svc);
            let key = key.clone();
            // Every 4th submission wins.
            let out = if i % 4 == 0 { dec!(14) } else { dec!(6) };
            tasks.push(tokio::spawn(
                async move { svc.submit(req(&key, out, Some("SHARED"))).await },
            ));
        }
    }
    for r in join_all(tasks).await {
        r.expect("task panicked").expect("submission failed");
    }

    let knowledge = store.knowledge_snapshot().await;
    let (_, k) = &knowledge[0];
    assert_eq!(k.usage_count as usize, 2 * PER_AGENT);
    // 10 wins out of 40 observations, within division rounding noise.
    assert!((k.success_rate - dec!(0.25)).abs() < dec!(0.000000000000000000000001));

    // Replay the ledger through the collective rule, in commit order.
    let mut replayed = None;
    for t in store.trades_snapshot().await {
        if t.strategy_fingerprint.as_deref() == Some("SHARED") {
            replayed = Some(collective_update(
                replayed.as_ref(),
                t.success,
                t.profit_loss,
                t.committed_at,
            ));
        }
    }
    let replayed = replayed.unwrap();
    assert_eq!(replayed.success_rate, k.success_rate);
    assert_eq!(replayed.average_profit, k.average_profit);
    assert_eq!(replayed.usage_count, k.usage_count);
}

#[tokio::test]
async fn disjoint_keys_do_not_block_each_other() {
    // Tight lock timeout: if unrelated agents or fingerprints shared a lock,
    // 32 parallel writers would blow through 50ms and fail with Atomicity.
    let (store, svc) = harness(50);
    let agents = {
        let mut v = Vec::new();
        for _ in 0..32 {
            v.push(store.register_agent(None).await);
        }
        v
    };

    let tasks: Vec<_> = agents
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let svc = Arc::clone(&svc);
            let key = a.key.clone();
            let fp = format!("H{i}");
            tokio::spawn(async move { svc.submit(req(&key, dec!(12), Some(&fp))).await })
        })
        .collect();

    for r in join_all(tasks).await {
        r.expect("task panicked").expect("disjoint-key submission blocked");
    }

    assert_eq!(store.trades_snapshot().await.len(), 32);
    assert_eq!(store.knowledge_snapshot().await.len(), 32);
}

#[tokio::test]
async fn ledger_and_aggregates_commit_together() {
    let (store, svc) = harness(5_000);
    let agent = store.register_agent(None).await;

    svc.submit(req(&agent.key, dec!(15), Some("H1"))).await.unwrap();
    let err = svc
        .submit(SubmitRequest {
            amount_in: dec!(0),
            ..req(&agent.key, dec!(5), Some("H2"))
        })
        .await
        .unwrap_err();
    assert!(!err.is_retryable());

    // The failed submission left no trace: one trade, one knowledge record,
    // an agent aggregate that replays from the ledger exactly.
    assert_eq!(store.trades_snapshot().await.len(), 1);
    assert_eq!(store.knowledge_snapshot().await.len(), 1);
    let live = store.agent_handle(&agent.key).await.unwrap().lock().await.stats;
    assert_eq!(live.total_trades, 1);
    assert_eq!(live, replay_agent(&store, &agent.key).await);
}

#[tokio::test]
async fn removal_during_traffic_keeps_ledger_consistent() {
    let (store, svc) = harness(5_000);
    let doomed = store.register_agent(None).await;
    let survivor = store.register_agent(None).await;

    svc.submit(req(&doomed.key, dec!(15), None)).await.unwrap();
    svc.submit(req(&survivor.key, dec!(15), None)).await.unwrap();

    store.remove_agent(&doomed.key).await.unwrap();

    // Ledger only holds the survivor's row; a late submission for the
    // removed agent is NotFound and appends nothing.
    let err = svc.submit(req(&doomed.key, dec!(12), None)).await.unwrap_err();
    assert!(matches!(
        err,
        hivemind::settlement::error::HiveError::NotFound(_)
    ));
    let trades = store.trades_snapshot().await;
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].agent_key, survivor.key);
}
