use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Default lifetime of a credit before it stops counting toward balance.
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Source tag used when the caller does not say where a credit came from.
pub const DEFAULT_SOURCE: &str = "scratch_card";

/// Add sqlx::Type so that SQLx knows how to decode this enum.
/// Stored as lowercase TEXT in the `rewards.status` column.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum RewardStatus {
    Active,
    Expired,
    /// Reserved for redemption-against-order flows; nothing transitions
    /// into it yet.
    Used,
}

impl fmt::Display for RewardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardStatus::Active => write!(f, "active"),
            RewardStatus::Expired => write!(f, "expired"),
            RewardStatus::Used => write!(f, "used"),
        }
    }
}

impl FromStr for RewardStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RewardStatus::Active),
            "expired" => Ok(RewardStatus::Expired),
            "used" => Ok(RewardStatus::Used),
            other => Err(format!("Unknown reward status: {}", other)),
        }
    }
}

/// One ledger entry. `amount` is immutable after creation; the row either
/// stays active, gets flipped to expired by the sweep, or is deleted by
/// reconciliation when it turns out to be a duplicate.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct Reward {
    pub reward_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub source: String,
    pub order_id: Option<String>,
    pub status: RewardStatus,
    pub earned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for a single credit. Built by whichever handler or hook observed
/// the triggering event; the ledger only validates and records it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub user_id: Uuid,
    pub amount: f64,
    pub source: Option<String>,
    pub order_id: Option<String>,
    /// Explicit expiry override. `None` means "use the 30-day default";
    /// `Some(None)` means the credit never expires. In JSON, an absent
    /// field takes the default and an explicit `null` means never expires.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl CreditRequest {
    pub fn new(user_id: Uuid, amount: f64) -> Self {
        Self {
            user_id,
            amount,
            source: None,
            order_id: None,
            expires_at: None,
        }
    }
}

/// What a successful credit hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditOutcome {
    pub reward: Reward,
    pub new_balance: f64,
}

/// A user's ledger partitioned for display: effective expiry is
/// time-derived, so rows past `expires_at` land in `expired` even when a
/// sweep has not caught them yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardHistory {
    pub active: Vec<Reward>,
    pub expired: Vec<Reward>,
}

/// Distinguishes an absent `expires_at` field (keep the default) from an
/// explicit `null` (never expires); plain serde would fold both into the
/// outer `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Canonical underscore form: `scratch-card` and `scratch_card` are the
/// same source.
pub fn normalize_source(raw: Option<&str>) -> String {
    match raw {
        Some(s) if !s.trim().is_empty() => s.trim().replace('-', "_"),
        _ => DEFAULT_SOURCE.to_string(),
    }
}

/// Default expiry for a credit earned at `earned_at`.
pub fn default_expiry(earned_at: DateTime<Utc>) -> DateTime<Utc> {
    earned_at + Duration::days(DEFAULT_EXPIRY_DAYS)
}
