/// Shared modules for the dashboard analytics core
pub mod aggregation;
pub mod config;
pub mod error;
pub mod normalize;
pub mod ranking;
pub mod risk;
pub mod streak;
pub mod types;
