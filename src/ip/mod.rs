//! Address and identifier allocation.
//!
//! Deterministic allocators for service IPs, networks, MAC addresses, link
//! IDs and VXLAN IDs. Every allocator is a monotonic counter seeded from its
//! base, so the sequence of values depends only on call order.

pub mod generator;
pub mod ids;
pub mod mac;

// Re-export commonly used types
pub use generator::{AddressGenerator, AllocationError, BasicNetworkAddressGenerator, DEFAULT_MAC_BASE};
pub use ids::{IdAllocator, DEFAULT_VNI_BASE, MAX_VNI};
pub use mac::MacAddress;
