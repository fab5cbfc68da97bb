// src/lib.rs

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use error::Error;
