//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every backend dial (probe, FastCGI, tunnel) with a deadline
//! - Surface timeouts as ordinary I/O errors
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors carry `ErrorKind::TimedOut` so callers need no special case

use std::io;
use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time;

/// Open a TCP connection, giving up after `timeout`.
pub async fn connect<A>(addr: A, timeout: Duration) -> io::Result<TcpStream>
where
    A: ToSocketAddrs,
{
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect timed out after {:?}", timeout),
        )),
    }
}
