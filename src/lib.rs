//! TRUTH SERUM — Potion-Transport Fraud Detection Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod registry;
pub mod scorer;
pub mod source;
pub mod storage;
pub mod summary;
pub mod types;
