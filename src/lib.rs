//! Detects new chapters on tracked manga pages.
//!
//! A run loads the library, fetches each series page (escalating to a headless
//! browser for hosts that block plain HTTP), extracts the latest chapter number
//! with a site-specific parser, compares it with the stored value, saves the
//! library once and hands a report to a notification sink.

pub mod browser_client;
pub mod chapter;
pub mod cleanup;
pub mod config;
pub mod crawler;
pub mod error;
pub mod http_client;
pub mod library;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod politeness;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod source_utils;
pub mod sources;
