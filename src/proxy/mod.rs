//! Backend forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher selects a forwarder by bound port
//!     → http.rs (plain HTTP: rewrite URI, strip hop-by-hop headers)
//!         → failsafe.rs (transport errors become a padded 502)
//!     → fastcgi::client (gateway protocol)
//! ```
//!
//! # Design Decisions
//! - Both protocols implement one `BackendForwarder` trait
//! - Forwarders are infallible; errors are responses by the time they return

pub mod failsafe;
pub mod forwarder;
pub mod http;

pub use failsafe::FailSafe;
pub use forwarder::BackendForwarder;
pub use http::HttpForwarder;
