// Lodestar - personal knowledge-recommendation service
//
// This crate provides the recommendation pipeline over a user's saved
// bookmarks: ingestion (scrape -> embed -> persist -> async AI analysis),
// intent analysis, multi-signal scoring with personalization, and
// progress streaming for long-running imports.
//
// Architecture follows domain-driven layout: infrastructure in kernel/,
// shared plumbing in common/, business logic per-domain in domains/*.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
