//! Port allocation for deployed apps
//!
//! The bind-and-close probe is the authority; the registry's in-use set
//! and the in-flight reservation set are hints that keep concurrent
//! deploys from racing to the same port. Callers serialize allocations
//! through the daemon-wide allocator mutex.

use deckhand_core::{constants, Error, Result};
use std::collections::HashSet;
use std::net::TcpListener;
use tracing::debug;

pub struct PortAllocator {
    floor: u16,
    reserved: HashSet<u16>,
}

impl PortAllocator {
    pub fn new(floor: u16) -> Self {
        Self {
            floor,
            reserved: HashSet::new(),
        }
    }

    /// Lowest free port at or above the floor that actually binds.
    pub fn allocate(&mut self, in_use: &HashSet<u16>) -> Result<u16> {
        for port in self.floor..constants::PORT_CEILING {
            if in_use.contains(&port) || self.reserved.contains(&port) {
                continue;
            }
            if probe(port) {
                self.reserved.insert(port);
                debug!(port, "allocated port");
                return Ok(port);
            }
        }
        Err(Error::NoFreePort)
    }

    /// Drop an in-flight reservation, once the port is registered or the
    /// deploy failed.
    pub fn release(&mut self, port: u16) {
        self.reserved.remove(&port);
    }
}

/// Can we bind the port on all interfaces right now?
fn probe(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_at_or_above_floor() {
        let mut alloc = PortAllocator::new(23500);
        let port = alloc.allocate(&HashSet::new()).unwrap();
        assert!(port >= 23500);
    }

    #[test]
    fn test_skips_in_use_hint() {
        let mut alloc = PortAllocator::new(23600);
        let mut in_use = HashSet::new();
        in_use.insert(23600);
        in_use.insert(23601);

        let port = alloc.allocate(&in_use).unwrap();
        assert!(port >= 23602);
    }

    #[test]
    fn test_skips_bound_port() {
        // actually occupy a port so only the probe can reject it
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let bound = listener.local_addr().unwrap().port();

        let mut alloc = PortAllocator::new(bound);
        let port = alloc.allocate(&HashSet::new()).unwrap();
        assert_ne!(port, bound);
        assert!(port > bound);
    }

    #[test]
    fn test_consecutive_allocations_differ() {
        let mut alloc = PortAllocator::new(23700);
        let in_use = HashSet::new();
        let a = alloc.allocate(&in_use).unwrap();
        let b = alloc.allocate(&in_use).unwrap();
        assert_ne!(a, b);

        alloc.release(a);
        let c = alloc.allocate(&in_use).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_no_free_port() {
        // a floor at the ceiling leaves nothing to scan
        let mut alloc = PortAllocator::new(constants::PORT_CEILING);
        let err = alloc.allocate(&HashSet::new()).unwrap_err();
        assert!(matches!(err, Error::NoFreePort));
    }
}
