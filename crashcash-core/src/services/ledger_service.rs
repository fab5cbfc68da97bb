use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::models::reward::{default_expiry, normalize_source};
use crate::models::{CreditOutcome, CreditRequest, Reward, RewardHistory, RewardStatus};
use crate::repositories::postgres::reward::RewardRepo;
use crate::Error;

/// The single authoritative entry point for balance-affecting operations.
/// Request handlers, order hooks, and cron triggers all call through here;
/// nothing else writes the rewards table or the cached balance.
pub struct LedgerService {
    rewards: Arc<dyn RewardRepo>,
}

impl LedgerService {
    pub fn new(rewards: Arc<dyn RewardRepo>) -> Self {
        Self { rewards }
    }

    /// Record one credit event. Validation happens before any write; the
    /// row insert and the cached-balance increment commit together or not
    /// at all. Notifying the user about the credit is the caller's job.
    pub async fn credit_reward(&self, req: CreditRequest) -> Result<CreditOutcome, Error> {
        validate_amount(req.amount)?;

        let earned_at = Utc::now();
        let expires_at = match req.expires_at {
            Some(override_exp) => override_exp,
            None => Some(default_expiry(earned_at)),
        };

        let reward = Reward {
            reward_id: Uuid::new_v4(),
            user_id: req.user_id,
            amount: req.amount,
            source: normalize_source(req.source.as_deref()),
            order_id: req.order_id,
            status: RewardStatus::Active,
            earned_at,
            expires_at,
        };

        let new_balance = self.rewards.credit(&reward).await?;
        info!(
            "credited {} to user {} from source '{}' (balance now {})",
            reward.amount, reward.user_id, reward.source, new_balance
        );

        Ok(CreditOutcome { reward, new_balance })
    }

    /// Live spendable balance, computed from the ledger. Consumers that
    /// need strong correctness (checkout) use this; the cached column on
    /// the user row is only a display optimization whose staleness is
    /// bounded by the sweep interval.
    pub async fn get_balance(&self, user_id: Uuid) -> Result<f64, Error> {
        self.rewards.active_total(user_id, Utc::now()).await
    }

    /// The user's ledger split into active and (effectively) expired sets.
    pub async fn list_rewards(&self, user_id: Uuid) -> Result<RewardHistory, Error> {
        let now = Utc::now();
        let active = self.rewards.list_active(user_id, now).await?;
        let expired = self.rewards.list_expired(user_id, now).await?;
        Ok(RewardHistory { active, expired })
    }
}

fn validate_amount(amount: f64) -> Result<(), Error> {
    if !amount.is_finite() {
        return Err(Error::Validation(format!(
            "reward amount must be a finite number, got {}",
            amount
        )));
    }
    if amount <= 0.0 {
        return Err(Error::Validation(format!(
            "reward amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-5.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn accepts_positive_amounts() {
        assert!(validate_amount(0.01).is_ok());
        assert!(validate_amount(50.0).is_ok());
    }
}
