//! Adaptive page-capture and context-injection agent for a remote memory store.
//!
//! Mnema is the in-session half of a knowledge-capture product: it watches the
//! content a user is looking at, decides when a fresh capture is worth sending
//! to the memory store, and — when the user is composing text — retrieves
//! relevant stored context and splices it into the live input without
//! clobbering newer keystrokes.
//!
//! # Architecture
//!
//! - **Capture**: an adaptive polling loop re-tunes its tick interval from
//!   recent user activity, suppresses noise with a dual hash + token-overlap
//!   change signal, and emits fire-and-forget capture messages.
//! - **Retrieval**: a debounced typing monitor queries the store over HTTP;
//!   long-running queries come back as jobs followed over a server-push
//!   stream with an exactly-one-terminal-outcome guarantee.
//! - **Injection**: results are re-validated against the live field text
//!   before being written back, so a stale answer never overwrites fresh
//!   input.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`activity`] — User-activity recency tracking and coarse activity levels
//! - [`capture`] — Snapshots, change detection, the capture scheduler, and sinks
//! - [`retrieval`] — Retrieval client, typing-triggered debounce, and job streams
//! - [`inject`] — Race-safe injection of retrieved context into a live field
//! - [`session`] — Session-scoped coordinator owning the pipeline's lifecycle
//! - [`watchdog`] — Generic liveness watchdog for handles that can disappear

pub mod activity;
pub mod capture;
pub mod config;
pub mod inject;
pub mod retrieval;
pub mod session;
pub mod watchdog;
