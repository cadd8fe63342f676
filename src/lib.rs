//! Pingback - Out-of-Band Interaction Catcher
//!
//! Captures HTTP and DNS-simulated callbacks fired by payloads under test
//! and keeps the most recent interactions for an operator to inspect.

pub mod config;
pub mod error;
pub mod models;
pub mod oob;
