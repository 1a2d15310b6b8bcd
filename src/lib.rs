//! Stockbook - stock portfolio tracker
//!
//! This library reconstructs a user's open positions from their transaction
//! history with FIFO lot accounting, and values them against current prices.

pub mod basis;
pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod pricing;
pub mod reports;
pub mod utils;
