//! Controller module
//!
//! Contains the background loop that keeps published quota metrics fresh.

mod collector;

pub use collector::QuotaCollector;
