//! Courier — webhook delivery and verification relay.
//!
//! ## Overview
//!
//! The relay sits between background agent jobs and the systems that care
//! about them: jobs are registered up front with a callback URL and a
//! freshly minted signing secret, agent status webhooks are verified as
//! they arrive, and terminal outcomes are re-delivered to the registered
//! callback as signed completion events with retry and backoff.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Agent   │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │ platform │          │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ InboundVerifier::process()             │
//!                       │         v                                        │
//!                       │  verifier.rs  (ordered checks, CompletionHandler)│
//!                       │         │                                        │
//!                       │         │ CompletionNotifier::notify_job()       │
//!                       │         v                                        │
//!                       │  notifier.rs  (status → completion event)        │
//!                       │         │                                        │
//!                       │         │ DeliveryEngine::deliver()              │
//!                       │         v                                        │     ┌──────────┐
//!                       │  delivery.rs  (retries, backoff, signing)        │ ──> │ Callback │
//!                       └──────────────────────────────────────────────────┘     └──────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                            |
//! |-------------|-----------------------------------------------------------|
//! | `models`    | Shared types: `JobRecord`, `StatusChangeEvent`, statuses  |
//! | `db`        | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)       |
//! | `registry`  | Write-once job registration and lookup                    |
//! | `signature` | HMAC-SHA256 signing, constant-time verification, secrets  |
//!
//! ## Typical Flow (agent finishes a job)
//!
//! 1. `POST /api/jobs` registered the job earlier; the response handed the
//!    caller a signing secret which it embedded in the agent launch request.
//! 2. The agent platform posts `statusChange` to `/webhooks/agent/{job_id}`.
//!    `InboundVerifier::process()` runs its checks in a fixed order: parse,
//!    required fields, event and status names, terminal-status filter,
//!    registry lookup, then signature verification over the raw body bytes.
//! 3. Non-terminal statuses are acknowledged and dropped before the registry
//!    is ever consulted. Terminal ones reach the `CompletionHandler`.
//! 4. `CompletionNotifier` maps `FINISHED`/`ERROR` to `agent.completed` /
//!    `agent.failed`, builds the completion event with the job's stored
//!    metadata, and hands it to the `DeliveryEngine`.
//! 5. `DeliveryEngine::deliver()` posts the signed payload to the callback
//!    URL, retrying retryable failures with capped exponential backoff.
//!    Delivery is best-effort: the inbound webhook was already acknowledged.

pub mod api;
pub mod db;
pub mod delivery;
pub mod models;
pub mod notifier;
pub mod registry;
pub mod server;
pub mod signature;
pub mod verifier;
