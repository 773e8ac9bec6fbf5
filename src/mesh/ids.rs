use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Stable identifier of a tracked mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeshId(pub u64);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Source of mesh ids. Every id handed out must be greater than the last
pub trait MeshIdAllocator: Send + Sync {
    fn next_id(&self) -> MeshId;
}

static GLOBAL_MESH_IDS: AtomicU64 = AtomicU64::new(0);

/// Process-wide id counter shared by every tracker using it. Never reset
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMeshIds;

impl MeshIdAllocator for GlobalMeshIds {
    fn next_id(&self) -> MeshId {
        MeshId(GLOBAL_MESH_IDS.fetch_add(1, Ordering::Relaxed))
    }
}

/// Counter owned by a single allocator instance, starting at zero
#[derive(Debug, Default)]
pub struct SequentialMeshIds {
    next: AtomicU64,
}

impl SequentialMeshIds {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl MeshIdAllocator for SequentialMeshIds {
    fn next_id(&self) -> MeshId {
        MeshId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_starts_at_zero() {
        let ids = SequentialMeshIds::new();
        assert_eq!(ids.next_id(), MeshId(0));
        assert_eq!(ids.next_id(), MeshId(1));
        assert_eq!(ids.next_id(), MeshId(2));
    }

    #[test]
    fn test_global_ids_shared_across_instances() {
        let a = GlobalMeshIds;
        let b = GlobalMeshIds;
        let first = a.next_id();
        let second = b.next_id();
        // other tests may draw ids concurrently
        assert!(second > first);
    }

    #[test]
    fn test_display() {
        assert_eq!(MeshId(4).to_string(), "mesh#4");
    }
}
