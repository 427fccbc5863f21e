// ABOUTME: Host port allocation for sandboxes
// ABOUTME: Hands out the lowest free port in a bounded range and reserves it until committed

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{Result, SandboxError};

/// Scans upward from a fixed base for a port that is neither in use nor reserved
#[derive(Debug, Clone)]
pub struct PortAllocator {
    base: u16,
    span: u16,
    reserved: Arc<Mutex<BTreeSet<u16>>>,
}

impl PortAllocator {
    pub fn new(base: u16, span: u16) -> Self {
        Self {
            base,
            span,
            reserved: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// Reserve the first port not present in `in_use` and not already reserved.
    ///
    /// The reservation is released when dropped, so callers must keep it alive
    /// until the port is recorded elsewhere.
    pub fn allocate(&self, in_use: &HashSet<u16>) -> Result<PortReservation> {
        let mut reserved = self
            .reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let end = self.base as u32 + self.span as u32;
        let port = (self.base as u32..end)
            .map(|p| p as u16)
            .find(|p| !in_use.contains(p) && !reserved.contains(p))
            .ok_or(SandboxError::PortsExhausted {
                base: self.base,
                end,
            })?;

        reserved.insert(port);
        debug!("Reserved sandbox port {}", port);

        Ok(PortReservation {
            port,
            reserved: Arc::clone(&self.reserved),
        })
    }

    /// Number of outstanding reservations
    pub fn reserved_count(&self) -> usize {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// A port held for an in-flight start
#[derive(Debug)]
pub struct PortReservation {
    port: u16,
    reserved: Arc<Mutex<BTreeSet<u16>>>,
}

impl PortReservation {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        let mut reserved = self
            .reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reserved.remove(&self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_base_port_first() {
        let allocator = PortAllocator::new(3001, 10);
        let reservation = allocator.allocate(&HashSet::new()).unwrap();
        assert_eq!(reservation.port(), 3001);
    }

    #[test]
    fn test_skips_ports_in_use() {
        let allocator = PortAllocator::new(3001, 10);
        let in_use = HashSet::from([3001, 3002, 3004]);

        let reservation = allocator.allocate(&in_use).unwrap();
        assert_eq!(reservation.port(), 3003);
        assert!(!in_use.contains(&reservation.port()));
    }

    #[test]
    fn test_outstanding_reservations_are_not_handed_out_twice() {
        let allocator = PortAllocator::new(3001, 10);

        let first = allocator.allocate(&HashSet::new()).unwrap();
        let second = allocator.allocate(&HashSet::new()).unwrap();

        assert_eq!(first.port(), 3001);
        assert_eq!(second.port(), 3002);
        assert_eq!(allocator.reserved_count(), 2);
    }

    #[test]
    fn test_dropped_reservation_frees_port() {
        let allocator = PortAllocator::new(3001, 10);

        let first = allocator.allocate(&HashSet::new()).unwrap();
        assert_eq!(first.port(), 3001);
        drop(first);

        assert_eq!(allocator.reserved_count(), 0);
        let again = allocator.allocate(&HashSet::new()).unwrap();
        assert_eq!(again.port(), 3001);
    }

    #[test]
    fn test_exhausted_range() {
        let allocator = PortAllocator::new(3001, 2);
        let in_use = HashSet::from([3001]);

        let _held = allocator.allocate(&in_use).unwrap();
        let result = allocator.allocate(&in_use);

        assert!(matches!(
            result,
            Err(SandboxError::PortsExhausted {
                base: 3001,
                end: 3003
            })
        ));
    }

    #[test]
    fn test_never_returns_active_port_across_range() {
        let allocator = PortAllocator::new(4000, 50);
        let in_use: HashSet<u16> = (4000..4050).filter(|p| p % 3 == 0).collect();

        let mut held = Vec::new();
        while let Ok(reservation) = allocator.allocate(&in_use) {
            assert!(!in_use.contains(&reservation.port()));
            held.push(reservation);
        }

        assert_eq!(held.len() + in_use.len(), 50);
    }
}
