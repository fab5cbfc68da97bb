// src/repositories/postgres/reward.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::Reward;
use crate::Error;

/// All balance-affecting writes go through this trait. The cached
/// `users.crash_cash_balance` column is only ever touched inside the same
/// transaction as the ledger rows it is derived from.
#[async_trait]
pub trait RewardRepo: Send + Sync {
    /// Insert a reward and apply its amount to the user's cached balance,
    /// atomically. Returns the new cached balance.
    async fn credit(&self, reward: &Reward) -> Result<f64, Error>;

    /// Authoritative spendable balance: sum of active rewards whose expiry
    /// has not passed. Never reads the cache.
    async fn active_total(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<f64, Error>;

    async fn list_active(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Reward>, Error>;

    async fn list_expired(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Reward>, Error>;

    /// Full ledger history for one user, oldest first. Ties on `earned_at`
    /// are broken by `reward_id` so the order is stable.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reward>, Error>;

    /// Users currently holding active rewards that are past due.
    async fn users_with_due_rewards(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error>;

    /// Flip this user's past-due active rewards to expired and rewrite the
    /// cached balance from the authoritative sum. Returns how many rewards
    /// were expired.
    async fn expire_due_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete the given rewards and rewrite the cached balance from the
    /// authoritative sum, in one transaction. Returns the new balance.
    async fn delete_with_rebalance(&self, user_id: Uuid, reward_ids: &[Uuid]) -> Result<f64, Error>;

    /// Rewrite one user's cached balance from the authoritative sum.
    async fn recalculate_balance(&self, user_id: Uuid) -> Result<f64, Error>;

    async fn user_ids(&self) -> Result<Vec<Uuid>, Error>;
}

pub struct PostgresRewardRepository {
    pool: Pool<Postgres>,
}

impl PostgresRewardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the user row for the remainder of the transaction. Serializes
    /// concurrent balance mutations for one user; other users are never
    /// blocked.
    async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<f64, Error> {
        let row = sqlx::query(
            "SELECT crash_cash_balance FROM users WHERE user_id = $1 FOR UPDATE",
        )
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(r) => Ok(r.try_get("crash_cash_balance")?),
            None => Err(Error::UserNotFound(user_id)),
        }
    }

    /// The ground-truth sum, evaluated inside the caller's transaction so
    /// the cache write that follows cannot race a concurrent credit.
    async fn active_total_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<f64, Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0.0) AS total
            FROM rewards
            WHERE user_id = $1
              AND status = 'active'
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;

        Ok(row.try_get("total")?)
    }

    async fn write_cached_balance(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        balance: f64,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE users SET crash_cash_balance = $1 WHERE user_id = $2")
            .bind(balance)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RewardRepo for PostgresRewardRepository {
    async fn credit(&self, reward: &Reward) -> Result<f64, Error> {
        let mut tx = self.pool.begin().await?;

        Self::lock_user(&mut tx, reward.user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO rewards
                (reward_id, user_id, amount, source, order_id, status, earned_at, expires_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(reward.reward_id)
            .bind(reward.user_id)
            .bind(reward.amount)
            .bind(&reward.source)
            .bind(&reward.order_id)
            .bind(reward.status.to_string())
            .bind(reward.earned_at)
            .bind(reward.expires_at)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"
            UPDATE users
            SET crash_cash_balance = crash_cash_balance + $1
            WHERE user_id = $2
            RETURNING crash_cash_balance
            "#,
        )
            .bind(reward.amount)
            .bind(reward.user_id)
            .fetch_one(&mut *tx)
            .await?;

        let new_balance: f64 = row.try_get("crash_cash_balance")?;
        tx.commit().await?;
        Ok(new_balance)
    }

    async fn active_total(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<f64, Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0.0) AS total
            FROM rewards
            WHERE user_id = $1
              AND status = 'active'
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
            .bind(user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("total")?)
    }

    async fn list_active(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Reward>, Error> {
        let rows = sqlx::query_as::<_, Reward>(
            r#"
            SELECT reward_id, user_id, amount, source, order_id, status, earned_at, expires_at
            FROM rewards
            WHERE user_id = $1
              AND status = 'active'
              AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY earned_at DESC, reward_id
            "#,
        )
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_expired(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Reward>, Error> {
        // Time decides, not the stored status: a past-due row the sweep has
        // not visited yet still lists as expired.
        let rows = sqlx::query_as::<_, Reward>(
            r#"
            SELECT reward_id, user_id, amount, source, order_id, status, earned_at, expires_at
            FROM rewards
            WHERE user_id = $1
              AND (status = 'expired' OR (expires_at IS NOT NULL AND expires_at <= $2))
            ORDER BY earned_at DESC, reward_id
            "#,
        )
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Reward>, Error> {
        let rows = sqlx::query_as::<_, Reward>(
            r#"
            SELECT reward_id, user_id, amount, source, order_id, status, earned_at, expires_at
            FROM rewards
            WHERE user_id = $1
            ORDER BY earned_at ASC, reward_id ASC
            "#,
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn users_with_due_rewards(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT user_id
            FROM rewards
            WHERE status = 'active'
              AND expires_at IS NOT NULL
              AND expires_at <= $1
            "#,
        )
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for r in rows {
            ids.push(r.try_get("user_id")?);
        }
        Ok(ids)
    }

    async fn expire_due_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;

        Self::lock_user(&mut tx, user_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE rewards
            SET status = 'expired'
            WHERE user_id = $1
              AND status = 'active'
              AND expires_at IS NOT NULL
              AND expires_at <= $2
            "#,
        )
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let total = Self::active_total_in_tx(&mut tx, user_id, now).await?;
        Self::write_cached_balance(&mut tx, user_id, total).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn delete_with_rebalance(&self, user_id: Uuid, reward_ids: &[Uuid]) -> Result<f64, Error> {
        let mut tx = self.pool.begin().await?;

        Self::lock_user(&mut tx, user_id).await?;

        sqlx::query("DELETE FROM rewards WHERE user_id = $1 AND reward_id = ANY($2)")
            .bind(user_id)
            .bind(reward_ids)
            .execute(&mut *tx)
            .await?;

        let total = Self::active_total_in_tx(&mut tx, user_id, Utc::now()).await?;
        Self::write_cached_balance(&mut tx, user_id, total).await?;

        tx.commit().await?;
        Ok(total)
    }

    async fn recalculate_balance(&self, user_id: Uuid) -> Result<f64, Error> {
        let mut tx = self.pool.begin().await?;

        Self::lock_user(&mut tx, user_id).await?;

        let total = Self::active_total_in_tx(&mut tx, user_id, Utc::now()).await?;
        Self::write_cached_balance(&mut tx, user_id, total).await?;

        tx.commit().await?;
        Ok(total)
    }

    async fn user_ids(&self) -> Result<Vec<Uuid>, Error> {
        let rows = sqlx::query("SELECT user_id FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for r in rows {
            ids.push(r.try_get("user_id")?);
        }
        Ok(ids)
    }
}
