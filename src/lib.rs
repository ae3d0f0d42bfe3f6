//! Help Scout identify sync library
//!
//! Keeps Help Scout customers in sync with identify events from the upstream
//! event pipeline. Help Scout has no upsert, so each event is reconciled by a
//! lookup on email followed by a create or an update.
//!
//! # Modules
//!
//! - `api`: HTTP routes.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `event_models`: Inbound identify events and trait resolution.
//! - `gateway_client`: Help Scout customers client.
//! - `handlers`: Shared state and health endpoint.
//! - `identity_lock`: Per-identity serialization strategies.
//! - `mapper`: Identify event to customer payload mapping.
//! - `models`: Customer payload and remote record models.
//! - `reconciler`: Lookup-then-create-or-update.
//! - `transport`: Authenticated HTTP transport with retries.
//! - `validation`: API key and identify event checks.
//! - `webhook_handler`: Identify ingest handler.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod config;
pub mod errors;
pub mod event_models;
pub mod gateway_client;
pub mod handlers;
pub mod identity_lock;
pub mod mapper;
pub mod models;
pub mod reconciler;
pub mod transport;
pub mod validation;
pub mod webhook_handler;
