//! Photodesk - Contributor backend for a stock photography marketplace
//!
//! Accounts and sessions, contributor onboarding, notifications, payout
//! details, sample quality checks and the simulated image review pipeline.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
