//! Protocol dispatch and binding cache.
//!
//! # Responsibilities
//! - Remember which candidate port answered for each service
//! - Probe candidate ports, in registration order, for unseen services
//! - Hand back the forwarder registered for the bound port
//!
//! # Design Decisions
//! - Bindings live for the process lifetime (no expiry, no re-probe)
//! - Failed probes are never cached; the next request probes again
//! - Concurrent first requests may both probe; the probe order is fixed, so
//!   the racing writers store the same port
//! - Probe connections are closed immediately and never reused

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::error::RoutingError;
use crate::observability::metrics;
use crate::proxy::BackendForwarder;
use crate::resilience::timeouts;

#[derive(Debug)]
struct Candidate {
    port: u16,
    forwarder: Arc<dyn BackendForwarder>,
}

/// Routes services to the forwarder for the protocol their backend speaks.
#[derive(Debug)]
pub struct Dispatcher {
    candidates: Vec<Candidate>,
    bindings: DashMap<String, u16>,
    connect_timeout: Duration,
    probes: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher with no candidates. Every probe attempt is bounded
    /// by `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            candidates: Vec::new(),
            bindings: DashMap::new(),
            connect_timeout,
            probes: AtomicU64::new(0),
        }
    }

    /// Register a candidate port. Candidates are probed in registration order.
    pub fn register(mut self, port: u16, forwarder: Arc<dyn BackendForwarder>) -> Self {
        self.candidates.push(Candidate { port, forwarder });
        self
    }

    /// Find the forwarder for `service`, probing its candidate ports if no
    /// binding exists yet.
    pub async fn route(&self, service: &str) -> Result<Arc<dyn BackendForwarder>, RoutingError> {
        if let Some(port) = self.binding(service) {
            if let Some(forwarder) = self.forwarder_for(port) {
                return Ok(forwarder);
            }
        }

        let port = self.probe(service).await.ok_or_else(|| RoutingError::NoBackend {
            service: service.to_string(),
        })?;

        self.bindings.insert(service.to_string(), port);
        metrics::record_binding(port);
        tracing::info!(service = %service, port, "Protocol binding created");

        self.forwarder_for(port).ok_or_else(|| RoutingError::NoBackend {
            service: service.to_string(),
        })
    }

    /// The cached port for `service`, if one has been bound.
    pub fn binding(&self, service: &str) -> Option<u16> {
        self.bindings.get(service).map(|entry| *entry.value())
    }

    /// Total number of probe connections attempted so far.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    fn forwarder_for(&self, port: u16) -> Option<Arc<dyn BackendForwarder>> {
        self.candidates
            .iter()
            .find(|c| c.port == port)
            .map(|c| Arc::clone(&c.forwarder))
    }

    async fn probe(&self, service: &str) -> Option<u16> {
        for candidate in &self.candidates {
            self.probes.fetch_add(1, Ordering::Relaxed);
            let target = format!("{}:{}", service, candidate.port);

            match timeouts::connect(target.as_str(), self.connect_timeout).await {
                Ok(stream) => {
                    drop(stream);
                    metrics::record_probe(true);
                    tracing::debug!(addr = %target, protocol = candidate.forwarder.protocol(), "Probe connected");
                    return Some(candidate.port);
                }
                Err(e) => {
                    metrics::record_probe(false);
                    tracing::debug!(addr = %target, error = %e, "Probe failed");
                }
            }
        }

        tracing::warn!(service = %service, "No candidate port accepted a connection");
        None
    }
}
