//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → host.rs (service identifier = left-most host label)
//!     → dispatcher.rs (cached binding, or probe candidate ports in order)
//!     → Return: forwarder for the bound port, or NoBackend
//! ```
//!
//! # Design Decisions
//! - No path-based routing; the host alone selects the tenant
//! - The service identifier doubles as the backend's network address
//! - Deterministic: the same service always probes to the same binding

pub mod dispatcher;
pub mod host;

pub use dispatcher::Dispatcher;
