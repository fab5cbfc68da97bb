// src/tasks/balance_recalc.rs

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::repositories::postgres::reward::RewardRepo;
use crate::Error;

/// Result of a full cached-balance rewrite across all accounts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecalcSummary {
    pub processed_count: u64,
    pub error_count: u64,
}

/// Result of rewriting a single account's cached balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserRecalcSummary {
    pub user_id: Uuid,
    pub new_balance: f64,
}

/// Rewrite one user's cached balance from the authoritative active-reward
/// sum.
pub async fn recalculate_user_balance(
    rewards: &dyn RewardRepo,
    user_id: Uuid,
) -> Result<UserRecalcSummary, Error> {
    let new_balance = rewards.recalculate_balance(user_id).await?;
    Ok(UserRecalcSummary { user_id, new_balance })
}

/// Rewrite every user's cached balance from the authoritative active-reward
/// sum. Repair tool for drift accumulated before the ledger owned all
/// balance writes; per-user failures are logged and skipped.
pub async fn recalculate_all_balances(rewards: &dyn RewardRepo) -> Result<RecalcSummary, Error> {
    let users = rewards.user_ids().await?;
    info!("balance recalculation: {} user(s)", users.len());

    let mut summary = RecalcSummary::default();
    for user_id in users {
        match rewards.recalculate_balance(user_id).await {
            Ok(_) => summary.processed_count += 1,
            Err(e) => {
                error!("balance recalculation: user {} failed: {:?}", user_id, e);
                summary.error_count += 1;
            }
        }
    }

    Ok(summary)
}
