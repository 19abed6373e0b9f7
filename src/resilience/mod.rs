//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend dial (probe, FastCGI, tunnel):
//!     → timeouts.rs (bounded connect)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend dial has a deadline
//! - No retries: a failed dial becomes a response, and the next request
//!   probes again

pub mod timeouts;
