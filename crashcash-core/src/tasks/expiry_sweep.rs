// src/tasks/expiry_sweep.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::repositories::postgres::reward::RewardRepo;
use crate::Error;

/// What a sweep run reports back to its trigger (scheduler or operator).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Rewards transitioned to expired across all users.
    pub processed_count: u64,
    /// Users whose expiry update failed and was skipped.
    pub error_count: u64,
}

/// Spawns a background task that runs the expiry sweep on an interval,
/// for deployments without an external scheduler.
pub fn spawn_expiry_sweep_task(
    rewards: Arc<dyn RewardRepo>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match run_expiry_sweep(rewards.as_ref()).await {
                Ok(summary) => {
                    info!(
                        "expiry sweep done: {} expired, {} errors",
                        summary.processed_count, summary.error_count
                    );
                }
                Err(e) => error!("expiry sweep failed: {:?}", e),
            }
        }
    })
}

/// One sweep pass: find users holding past-due active rewards, then expire
/// and rebalance each user in its own transaction. A failure on one user is
/// logged and counted; the rest of the sweep continues. Running twice with
/// nothing newly due is a no-op.
pub async fn run_expiry_sweep(rewards: &dyn RewardRepo) -> Result<SweepSummary, Error> {
    let now = Utc::now();
    let due_users = rewards.users_with_due_rewards(now).await?;

    if due_users.is_empty() {
        return Ok(SweepSummary::default());
    }
    info!("expiry sweep: {} user(s) with past-due rewards", due_users.len());

    let mut summary = SweepSummary::default();
    for user_id in due_users {
        match rewards.expire_due_for_user(user_id, now).await {
            Ok(expired) => {
                summary.processed_count += expired;
            }
            Err(e) => {
                error!("expiry sweep: user {} failed: {:?}", user_id, e);
                summary.error_count += 1;
            }
        }
    }

    Ok(summary)
}
