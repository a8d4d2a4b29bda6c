//! In-memory transactional store.
//!
//! Three tables: agents and collective knowledge as maps of `Arc<Mutex<..>>`
//! records (the mutex IS the per-key lock arena — disjoint keys never
//! contend), and an append-only trade ledger. Lock acquisition is bounded by
//! a timeout; exceeding it surfaces as a retryable `Atomicity` error with
//! nothing committed.
//!
//! Lock order, everywhere: agent record → knowledge record → agents map →
//! ledger. The outer maps are only read/written while no acquisition of a
//! record lock is pending, so the order cannot cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use super::error::HiveError;
use super::types::{AgentRecord, AgentStats, KnowledgeStats, TradeRecord};

/// Reserved knowledge slot: `None` until the first observation commits.
/// Readers skip unset slots, so a rolled-back first observation is never
/// visible.
pub type KnowledgeSlot = Arc<Mutex<Option<KnowledgeStats>>>;
pub type AgentHandle = Arc<Mutex<AgentRecord>>;

struct Ledger {
    trades: Vec<TradeRecord>,
    next_id: u64,
}

pub struct Store {
    agents: RwLock<HashMap<String, AgentHandle>>,
    knowledge: RwLock<HashMap<String, KnowledgeSlot>>,
    ledger: Mutex<Ledger>,
    lock_timeout: Duration,
}

impl Store {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            knowledge: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger {
                trades: Vec::new(),
                next_id: 1,
            }),
            lock_timeout,
        }
    }

    // ═════════════════════════════════════════════════
    // Registry
    // ═════════════════════════════════════════════════

    /// Register a new agent under a minted key, zero stats.
    pub async fn register_agent(&self, name: Option<String>) -> AgentRecord {
        let key = format!("agent_{}", Uuid::new_v4().simple());
        let record = AgentRecord {
            key: key.clone(),
            name: name.unwrap_or_else(|| "My AI Agent".to_string()),
            created_at: Utc::now(),
            stats: AgentStats::default(),
        };
        self.agents
            .write()
            .await
            .insert(key, Arc::new(Mutex::new(record.clone())));
        info!("🐝 Registered agent {} ({})", record.key, record.name);
        record
    }

    /// Delete an agent and its ledger rows (cascade). Knowledge records are
    /// left untouched. Serialized against in-flight settlements by taking
    /// the agent's own key lock before unlinking it.
    pub async fn remove_agent(&self, key: &str) -> Result<(), HiveError> {
        let handle = match self.agents.read().await.get(key) {
            Some(h) => Arc::clone(h),
            None => return Err(HiveError::NotFound(format!("agent {key}"))),
        };
        let _guard = self.lock_record(&handle, "agent").await?;

        let removed = {
            let mut agents = self.agents.write().await;
            // ptr_eq guards against losing a race with another remover.
            let still_ours = agents.get(key).is_some_and(|h| Arc::ptr_eq(h, &handle));
            still_ours && agents.remove(key).is_some()
        };
        if !removed {
            return Err(HiveError::NotFound(format!("agent {key}")));
        }

        let mut ledger = self.ledger.lock().await;
        let before = ledger.trades.len();
        ledger.trades.retain(|t| t.agent_key != key);
        info!(
            "🗑️ Removed agent {} and {} ledger rows",
            key,
            before - ledger.trades.len()
        );
        Ok(())
    }

    // ═════════════════════════════════════════════════
    // Key locks
    // ═════════════════════════════════════════════════

    pub async fn agent_handle(&self, key: &str) -> Option<AgentHandle> {
        self.agents.read().await.get(key).map(Arc::clone)
    }

    /// Settlements must re-check this after locking the record: a concurrent
    /// removal may have unlinked the key while the lock was pending.
    pub async fn agent_still_linked(&self, key: &str, handle: &AgentHandle) -> bool {
        matches!(self.agents.read().await.get(key), Some(h) if Arc::ptr_eq(h, handle))
    }

    /// Fetch the slot serializing updates to one fingerprint, reserving an
    /// empty one on first sight.
    pub async fn knowledge_slot(&self, fingerprint: &str) -> KnowledgeSlot {
        if let Some(slot) = self.knowledge.read().await.get(fingerprint) {
            return Arc::clone(slot);
        }
        let mut map = self.knowledge.write().await;
        Arc::clone(
            map.entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    /// Bounded lock acquisition. Timing out means a same-key writer held the
    /// lock too long; nothing has been committed yet, so the caller's whole
    /// submission is safe to retry.
    pub async fn lock_record<T>(
        &self,
        record: &Arc<Mutex<T>>,
        what: &str,
    ) -> Result<OwnedMutexGuard<T>, HiveError> {
        timeout(self.lock_timeout, Arc::clone(record).lock_owned())
            .await
            .map_err(|_| {
                HiveError::Atomicity(format!(
                    "{what} key lock not acquired within {:?}",
                    self.lock_timeout
                ))
            })
    }

    // ═════════════════════════════════════════════════
    // Ledger
    // ═════════════════════════════════════════════════

    /// Append an immutable trade row and assign its identity. Callers hold
    /// the affected key locks, so the row and the aggregate snapshots it
    /// produced become visible together.
    pub async fn append_trade(&self, mut trade: TradeRecord) -> TradeRecord {
        let mut ledger = self.ledger.lock().await;
        trade.id = ledger.next_id;
        ledger.next_id += 1;
        ledger.trades.push(trade.clone());
        trade
    }

    // ═════════════════════════════════════════════════
    // Read projections
    // ═════════════════════════════════════════════════

    pub async fn agents_snapshot(&self) -> Vec<AgentRecord> {
        let handles: Vec<AgentHandle> =
            self.agents.read().await.values().map(Arc::clone).collect();
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.lock().await.clone());
        }
        out
    }

    pub async fn trades_snapshot(&self) -> Vec<TradeRecord> {
        self.ledger.lock().await.trades.clone()
    }

    /// Newest-first trades for one agent.
    pub async fn recent_trades(&self, key: &str, limit: usize) -> Vec<TradeRecord> {
        let ledger = self.ledger.lock().await;
        ledger
            .trades
            .iter()
            .rev()
            .filter(|t| t.agent_key == key)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn knowledge_snapshot(&self) -> Vec<(String, KnowledgeStats)> {
        let slots: Vec<(String, KnowledgeSlot)> = self
            .knowledge
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        let mut out = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            if let Some(stats) = *slot.lock().await {
                out.push((key, stats));
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
