// tests/repository_tests.rs

use chrono::{Duration, Utc};
use uuid::Uuid;

use crashcash_core::models::{Reward, RewardStatus, User};
use crashcash_core::repositories::postgres::reward::{PostgresRewardRepository, RewardRepo};
use crashcash_core::repositories::postgres::user::{UserRepo, UserRepository};
use crashcash_core::test_utils::helpers::setup_test_database;
use crashcash_core::Error;

fn make_reward(user_id: Uuid, amount: f64, source: &str) -> Reward {
    let now = Utc::now();
    Reward {
        reward_id: Uuid::new_v4(),
        user_id,
        amount,
        source: source.to_string(),
        order_id: None,
        status: RewardStatus::Active,
        earned_at: now,
        expires_at: Some(now + Duration::days(30)),
    }
}

#[tokio::test]
async fn test_user_repository() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let repo = UserRepository::new(db.pool().clone());

    let user = User::new(Uuid::new_v4(), Some("test_user".to_string()));

    // Create
    repo.create(&user).await?;
    let retrieved = repo.get(user.user_id).await?.expect("User should exist");
    assert_eq!(user.user_id, retrieved.user_id);
    assert_eq!(retrieved.crash_cash_balance, 0.0);
    assert!(retrieved.is_active);

    // Update
    let mut updated_user = user.clone();
    updated_user.is_active = false;
    repo.update(&updated_user).await?;
    let retrieved = repo.get(user.user_id).await?.expect("User should exist");
    assert!(!retrieved.is_active);

    // Delete
    repo.delete(user.user_id).await?;
    let retrieved = repo.get(user.user_id).await?;
    assert!(retrieved.is_none());

    Ok(())
}

#[tokio::test]
async fn test_credit_writes_row_and_cache_together() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = PostgresRewardRepository::new(db.pool().clone());

    let user = User::new(Uuid::new_v4(), None);
    users.create(&user).await?;

    let reward = make_reward(user.user_id, 50.0, "scratch_card");
    let new_balance = rewards.credit(&reward).await?;
    assert_eq!(new_balance, 50.0);

    let stored = rewards.list_for_user(user.user_id).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].reward_id, reward.reward_id);
    assert_eq!(stored[0].amount, 50.0);
    assert_eq!(stored[0].status, RewardStatus::Active);

    let account = users.get(user.user_id).await?.expect("User should exist");
    assert_eq!(account.crash_cash_balance, 50.0);

    Ok(())
}

#[tokio::test]
async fn test_credit_unknown_user_writes_nothing() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let rewards = PostgresRewardRepository::new(db.pool().clone());

    let ghost = Uuid::new_v4();
    let reward = make_reward(ghost, 10.0, "scratch_card");
    match rewards.credit(&reward).await {
        Err(Error::UserNotFound(id)) => assert_eq!(id, ghost),
        other => panic!("expected UserNotFound, got {:?}", other.map(|_| ())),
    }

    assert!(rewards.list_for_user(ghost).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_active_and_expired_partitions_are_time_derived() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = PostgresRewardRepository::new(db.pool().clone());

    let user = User::new(Uuid::new_v4(), None);
    users.create(&user).await?;

    let now = Utc::now();

    // Active, expiring in the future.
    let current = make_reward(user.user_id, 30.0, "order_placed");
    rewards.credit(&current).await?;

    // Past-due but the sweep has not run: still status=active in storage.
    let mut stale = make_reward(user.user_id, 20.0, "order_placed");
    stale.expires_at = Some(now - Duration::days(1));
    rewards.credit(&stale).await?;

    // Never-expiring credit.
    let mut evergreen = make_reward(user.user_id, 5.0, "referral");
    evergreen.expires_at = None;
    rewards.credit(&evergreen).await?;

    let active = rewards.list_active(user.user_id, now).await?;
    let active_ids: Vec<Uuid> = active.iter().map(|r| r.reward_id).collect();
    assert_eq!(active.len(), 2);
    assert!(active_ids.contains(&current.reward_id));
    assert!(active_ids.contains(&evergreen.reward_id));

    let expired = rewards.list_expired(user.user_id, now).await?;
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].reward_id, stale.reward_id);

    // The authoritative sum ignores the past-due row too.
    assert_eq!(rewards.active_total(user.user_id, now).await?, 35.0);

    Ok(())
}

#[tokio::test]
async fn test_recalculate_balance_repairs_drift() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = PostgresRewardRepository::new(db.pool().clone());

    let user = User::new(Uuid::new_v4(), None);
    users.create(&user).await?;
    rewards.credit(&make_reward(user.user_id, 40.0, "order_placed")).await?;

    // Corrupt the cache the way a half-applied write would.
    sqlx::query("UPDATE users SET crash_cash_balance = 999.0 WHERE user_id = $1")
        .bind(user.user_id)
        .execute(db.pool())
        .await?;

    let repaired = rewards.recalculate_balance(user.user_id).await?;
    assert_eq!(repaired, 40.0);

    let account = users.get(user.user_id).await?.expect("User should exist");
    assert_eq!(account.crash_cash_balance, 40.0);

    Ok(())
}
