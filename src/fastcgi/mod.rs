//! Gateway protocol (FastCGI) subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → params.rs (CGI environment: request line, HTTP_* headers, peer)
//!     → record.rs (BEGIN_REQUEST, PARAMS, STDIN records)
//!     → backend process
//!     → record.rs (STDOUT / STDERR / END_REQUEST records)
//!     → response.rs (Status, Location, headers → HTTP response)
//! ```

pub mod client;
pub mod params;
pub mod record;
pub mod response;

pub use client::FastCgiForwarder;
pub use params::EnvSettings;
