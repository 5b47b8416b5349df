//! Rule-aware compilation engine for Canadian immigration filing packages.
//!
//! Given a matter's classified documents and a forum profile, the engine evaluates a
//! versioned rule catalog, plans the record's table of contents and pagination, gates
//! compiled-binder generation on readiness, and optionally assembles the binder PDF.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
