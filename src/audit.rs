//! Calculation audit log.
//!
//! Every price served over HTTP is recorded together with its raw input
//! and output so it can be inspected later.  Entries live in a bounded
//! in-memory ring; once full, the oldest entry is dropped.

use crate::models::StrategyKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One served calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationLog {
    pub id: Uuid,
    /// The stored rule whose configuration was used, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
    pub strategy_type: StrategyKind,
    /// The pricing request as received.
    pub input_data: Value,
    /// The pricing response as returned to the caller.
    pub output_data: Value,
    /// Wall-clock time spent in the engine.
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl CalculationLog {
    pub fn new(
        strategy_type: StrategyKind,
        rule_id: Option<Uuid>,
        input_data: Value,
        output_data: Value,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id,
            strategy_type,
            input_data,
            output_data,
            execution_time_ms,
            created_at: Utc::now(),
        }
    }
}

/// Ring buffer of the most recent calculations.
pub struct AuditLog {
    /// Always at least 1.
    capacity: usize,
    entries: RwLock<VecDeque<CalculationLog>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, entry: CalculationLog) {
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        debug!(log_id = %entry.id, strategy = %entry.strategy_type, "calculation recorded");
        entries.push_back(entry);
    }

    /// Newest entries first, optionally restricted to one strategy.
    pub async fn recent(&self, limit: usize, strategy: Option<StrategyKind>) -> Vec<CalculationLog> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| strategy.map_or(true, |s| e.strategy_type == s))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
