//! Upbit and Bithumb new-listing monitor.
//!
//! Polls both exchanges, diffs the results against persisted known state and
//! sends one alert per newly listed market or listing announcement.

pub mod api;
pub mod core;
pub mod monitoring;
pub mod scanner;
