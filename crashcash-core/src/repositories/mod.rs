// src/repositories/mod.rs

pub use postgres::reward::{PostgresRewardRepository, RewardRepo};
pub use postgres::user::{UserRepo, UserRepository};

pub mod postgres;
