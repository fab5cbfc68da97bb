// src/repositories/postgres/mod.rs

pub mod reward;
pub mod user;

pub use reward::PostgresRewardRepository;
pub use user::UserRepository;
