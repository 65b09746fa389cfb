//! # Transcript Intake Library
//!
//! Receives transcription-provider webhooks, fetches the transcript, matches it to a
//! church and scheduled call, and queues anything it cannot place for manual review.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod manual_match;
pub mod matching;
pub mod models;
pub mod notifications;
pub mod pipeline;
pub mod provider;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod telemetry;
pub mod webhook_verification;
pub use migration;
