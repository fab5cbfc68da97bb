// src/services/mod.rs

pub mod ledger_service;

pub use ledger_service::LedgerService;
