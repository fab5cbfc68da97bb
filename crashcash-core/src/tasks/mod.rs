// src/tasks/mod.rs

pub mod balance_recalc;
pub mod expiry_sweep;
pub mod reconciliation;

pub use balance_recalc::{
    recalculate_all_balances, recalculate_user_balance, RecalcSummary, UserRecalcSummary,
};
pub use expiry_sweep::{run_expiry_sweep, spawn_expiry_sweep_task, SweepSummary};
pub use reconciliation::{reconcile_user_rewards, ReconcileSummary};
