//! Monotonic identifier allocators for link IDs and VXLAN network identifiers.

use super::generator::AllocationError;

/// Largest VXLAN network identifier (24 bits).
pub const MAX_VNI: u32 = (1 << 24) - 1;

/// Default first VXLAN network identifier.
pub const DEFAULT_VNI_BASE: u32 = 100;

/// Hands out consecutive identifiers from `start` up to `max` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    kind: &'static str,
    next: u64,
    max: u32,
}

impl IdAllocator {
    pub fn new(kind: &'static str, start: u32, max: u32) -> Self {
        Self { kind, next: start as u64, max }
    }

    /// Allocator for link IDs, starting at 1.
    pub fn link_ids() -> Self {
        Self::new("link id", 1, u32::MAX)
    }

    /// Allocator for VXLAN IDs, starting at `base`.
    pub fn vxlan_ids(base: u32) -> Self {
        Self::new("VXLAN id", base, MAX_VNI)
    }

    pub fn allocate(&mut self) -> Result<u32, AllocationError> {
        if self.next > self.max as u64 {
            return Err(AllocationError::IdSpaceExhausted {
                kind: self.kind,
                last: self.max,
            });
        }
        let id = self.next as u32;
        self.next += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_consecutive() {
        let mut ids = IdAllocator::link_ids();
        assert_eq!(ids.allocate(), Ok(1));
        assert_eq!(ids.allocate(), Ok(2));
        assert_eq!(ids.allocate(), Ok(3));
    }

    #[test]
    fn test_vni_space_is_bounded() {
        let mut ids = IdAllocator::vxlan_ids(MAX_VNI);
        assert_eq!(ids.allocate(), Ok(MAX_VNI));
        assert_eq!(
            ids.allocate(),
            Err(AllocationError::IdSpaceExhausted { kind: "VXLAN id", last: MAX_VNI })
        );
    }

    #[test]
    fn test_u32_max_is_handed_out_once() {
        let mut ids = IdAllocator::new("test id", u32::MAX, u32::MAX);
        assert_eq!(ids.allocate(), Ok(u32::MAX));
        assert!(ids.allocate().is_err());
    }
}
