//! Optional signed-token authentication.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → claims.rs (RS256 verification)
//!     → X-BW7-Token: <claims JSON> on the forwarded request
//! ```
//!
//! # Design Decisions
//! - Fail-open: a missing or invalid token is logged and the request is
//!   forwarded unauthenticated; backends decide what access means
//! - The claims header is always cleared first, so only the gateway sets it

pub mod claims;
pub mod middleware;

pub use claims::{ClaimsInjector, TRUSTED_CLAIMS_HEADER};
pub use middleware::inject_claims;
