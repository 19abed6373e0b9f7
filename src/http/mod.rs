//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, gateway handler)
//!     → request.rs (request ID, hop-by-hop headers, X-Forwarded-For)
//!     → websocket.rs (upgrade requests) | routing::Dispatcher (everything else)
//!     → response.rs (synthetic error responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
pub use websocket::{is_websocket, WebSocketTunnel};
