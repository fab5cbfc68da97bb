// src/tasks/reconciliation.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::models::Reward;
use crate::repositories::postgres::reward::RewardRepo;
use crate::Error;

/// Result of a duplicate-reconciliation pass for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub deleted_count: u64,
    pub deleted_ids: Vec<Uuid>,
    pub new_balance: f64,
}

/// Collapse duplicate reward rows for one user and rewrite the cached
/// balance from the authoritative sum. This scans the user's full history,
/// so it is an explicit maintenance action, never part of the request path.
pub async fn reconcile_user_rewards(
    rewards: &dyn RewardRepo,
    user_id: Uuid,
) -> Result<ReconcileSummary, Error> {
    let history = rewards.list_for_user(user_id).await?;
    let duplicates = find_duplicates(&history);

    if duplicates.is_empty() {
        // Still rewrite the cache: reconciliation doubles as drift repair.
        let balance = rewards.recalculate_balance(user_id).await?;
        return Ok(ReconcileSummary {
            deleted_count: 0,
            deleted_ids: Vec::new(),
            new_balance: balance,
        });
    }

    info!(
        "reconciliation: user {} has {} duplicate reward(s)",
        user_id,
        duplicates.len()
    );
    let new_balance = rewards.delete_with_rebalance(user_id, &duplicates).await?;

    Ok(ReconcileSummary {
        deleted_count: duplicates.len() as u64,
        deleted_ids: duplicates,
        new_balance,
    })
}

/// Rewards with the same amount and source earned within the same
/// 60-second bucket record one real-world event. The earliest row wins;
/// the input must be ordered oldest first (`list_for_user` guarantees it).
pub fn find_duplicates(history: &[Reward]) -> Vec<Uuid> {
    let mut seen: HashMap<(u64, &str, i64), Uuid> = HashMap::new();
    let mut duplicates = Vec::new();

    for reward in history {
        let minute_bucket = reward.earned_at.timestamp().div_euclid(60);
        let key = (reward.amount.to_bits(), reward.source.as_str(), minute_bucket);
        match seen.get(&key) {
            Some(_) => duplicates.push(reward.reward_id),
            None => {
                seen.insert(key, reward.reward_id);
            }
        }
    }

    duplicates
}
