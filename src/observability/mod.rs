//! Observability: structured logging and scoped lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes control flow.
//! 2. No async or background threads.
//! 3. Deterministic output (sorted fields, fixed event names).
//!
//! # Usage
//!
//! ```ignore
//! use ord_provider_server::observability::{Logger, ObservationScope};
//!
//! Logger::info("update_started", &[("trigger", "webhook")]);
//!
//! let scope = ObservationScope::new("update");
//! // ... do work ...
//! scope.complete();
//! ```

mod logger;

pub use logger::{Logger, ObservationScope, Severity};
