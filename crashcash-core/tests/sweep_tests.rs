// tests/sweep_tests.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crashcash_core::models::{CreditRequest, RewardStatus, User};
use crashcash_core::repositories::postgres::reward::{PostgresRewardRepository, RewardRepo};
use crashcash_core::repositories::postgres::user::{UserRepo, UserRepository};
use crashcash_core::services::LedgerService;
use crashcash_core::tasks::expiry_sweep::run_expiry_sweep;
use crashcash_core::test_utils::helpers::setup_test_database;
use crashcash_core::Error;

#[tokio::test]
async fn test_sweep_expires_past_due_rewards_and_fixes_cache() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = Arc::new(PostgresRewardRepository::new(db.pool().clone()));
    let ledger = LedgerService::new(rewards.clone());

    let user = User::new(Uuid::new_v4(), None);
    users.create(&user).await?;

    // One credit that stays valid, one that lapsed yesterday. The lapsed
    // one still counted into the cache at credit time, the way a stale
    // cache looks in the wild before a sweep catches up.
    ledger.credit_reward(CreditRequest::new(user.user_id, 30.0)).await?;
    let mut lapsed = CreditRequest::new(user.user_id, 20.0);
    lapsed.expires_at = Some(Some(Utc::now() - Duration::days(1)));
    ledger.credit_reward(lapsed).await?;

    let account = users.get(user.user_id).await?.expect("User should exist");
    assert_eq!(account.crash_cash_balance, 50.0);

    let summary = run_expiry_sweep(rewards.as_ref()).await?;
    assert!(summary.processed_count >= 1);

    // Storage caught up with time: the lapsed row is expired and the cache
    // matches the authoritative sum again.
    let stored = rewards.list_for_user(user.user_id).await?;
    let expired: Vec<_> = stored
        .iter()
        .filter(|r| r.status == RewardStatus::Expired)
        .collect();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].amount, 20.0);

    let account = users.get(user.user_id).await?.expect("User should exist");
    assert_eq!(account.crash_cash_balance, 30.0);
    assert_eq!(ledger.get_balance(user.user_id).await?, 30.0);

    Ok(())
}

#[tokio::test]
async fn test_sweep_is_idempotent() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = Arc::new(PostgresRewardRepository::new(db.pool().clone()));
    let ledger = LedgerService::new(rewards.clone());

    let user = User::new(Uuid::new_v4(), None);
    users.create(&user).await?;

    let mut lapsed = CreditRequest::new(user.user_id, 25.0);
    lapsed.expires_at = Some(Some(Utc::now() - Duration::hours(1)));
    ledger.credit_reward(lapsed).await?;

    run_expiry_sweep(rewards.as_ref()).await?;

    // Nothing newly due for this user: a second pass touches zero rows.
    let again = rewards.expire_due_for_user(user.user_id, Utc::now()).await?;
    assert_eq!(again, 0);

    let account = users.get(user.user_id).await?.expect("User should exist");
    assert_eq!(account.crash_cash_balance, 0.0);

    Ok(())
}

#[tokio::test]
async fn test_sweep_handles_each_user_independently() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let users = UserRepository::new(db.pool().clone());
    let rewards = Arc::new(PostgresRewardRepository::new(db.pool().clone()));
    let ledger = LedgerService::new(rewards.clone());

    let alice = User::new(Uuid::new_v4(), Some("alice".to_string()));
    let bob = User::new(Uuid::new_v4(), Some("bob".to_string()));
    users.create(&alice).await?;
    users.create(&bob).await?;

    let mut a = CreditRequest::new(alice.user_id, 10.0);
    a.expires_at = Some(Some(Utc::now() - Duration::minutes(5)));
    ledger.credit_reward(a).await?;

    let mut b = CreditRequest::new(bob.user_id, 15.0);
    b.expires_at = Some(Some(Utc::now() - Duration::minutes(5)));
    ledger.credit_reward(b).await?;

    let summary = run_expiry_sweep(rewards.as_ref()).await?;
    assert!(summary.processed_count >= 2);

    for user_id in [alice.user_id, bob.user_id] {
        let account = users.get(user_id).await?.expect("User should exist");
        assert_eq!(account.crash_cash_balance, 0.0);
        assert_eq!(ledger.get_balance(user_id).await?, 0.0);
    }

    Ok(())
}
