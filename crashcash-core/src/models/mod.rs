// File: crashcash-core/src/models/mod.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub mod reward;
pub use reward::{CreditOutcome, CreditRequest, Reward, RewardHistory, RewardStatus};

#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub global_username: Option<String>,
    /// Denormalized cache of the active-reward sum. Re-derivable at any
    /// time; the aggregate query over `rewards` is the ground truth.
    pub crash_cash_balance: f64,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl User {
    pub fn new(user_id: Uuid, global_username: Option<String>) -> Self {
        Self {
            user_id,
            global_username,
            crash_cash_balance: 0.0,
            created_at: Utc::now(),
            is_active: true,
        }
    }
}
