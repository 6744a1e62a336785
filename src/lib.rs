//! # verdict-rs
//!
//! Content-identity and work-dedup engine for continuously mutating
//! documents.
//!
//! Discovers items in a host document, keys them by normalized content,
//! serves verdicts from a persistent TTL cache, and sends each unique,
//! not-yet-analyzed item to a remote analysis service at most once per
//! session, annotating the item with the result.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod identity;
pub mod model;
pub mod telemetry;
pub mod tracker;
