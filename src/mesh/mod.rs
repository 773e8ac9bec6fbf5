//! Mesh payloads reported by providers
//!
//! A `MeshData` is identified by its `PayloadKey`, never by its contents.
//! Keys come from a process-wide counter when a payload is created, so two
//! payloads with identical geometry built separately stay distinct, while a
//! revision made with `MeshData::revise` keeps the key of the payload it
//! came from.

pub mod ids;

pub use ids::{GlobalMeshIds, MeshId, MeshIdAllocator, SequentialMeshIds};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3};
use serde::Serialize;

use crate::error::{invalid_mesh, TrackerResult};

static NEXT_PAYLOAD_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of one provider payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PayloadKey(u64);

impl PayloadKey {
    fn fresh() -> Self {
        Self(NEXT_PAYLOAD_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload#{}", self.0)
    }
}

/// Payload type carried by provider streams
pub type SharedMeshData = Arc<MeshData>;

/// Geometry of one detected mesh
#[derive(Debug)]
pub struct MeshData {
    key: PayloadKey,
    /// Flat xyz triples
    pub positions: Vec<f32>,
    /// Triangle list into `positions`
    pub indices: Vec<u32>,
    /// Flat xyz triples, empty when the runtime provides none
    pub normals: Vec<f32>,
    /// Pose of the mesh in session space
    pub transform: Mat4,
    /// Runtime classification such as "table" or "wall"
    pub semantic_label: Option<String>,
}

/// Axis-aligned bounds of a mesh's positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl MeshBounds {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl MeshData {
    /// Create a payload with a fresh identity
    pub fn new(positions: Vec<f32>, indices: Vec<u32>, normals: Vec<f32>) -> Self {
        Self {
            key: PayloadKey::fresh(),
            positions,
            indices,
            normals,
            transform: Mat4::IDENTITY,
            semantic_label: None,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_semantic_label(mut self, label: impl Into<String>) -> Self {
        self.semantic_label = Some(label.into());
        self
    }

    /// New revision of this payload: new geometry, same identity
    pub fn revise(&self, positions: Vec<f32>, indices: Vec<u32>, normals: Vec<f32>) -> Self {
        Self {
            key: self.key,
            positions,
            indices,
            normals,
            transform: self.transform,
            semantic_label: self.semantic_label.clone(),
        }
    }

    pub fn key(&self) -> PayloadKey {
        self.key
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Bounds of the untransformed positions, `None` for an empty mesh
    pub fn bounds(&self) -> Option<MeshBounds> {
        let mut points = self
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]));

        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(MeshBounds { min, max })
    }

    /// Check buffer shapes and index ranges
    pub fn validate(&self) -> TrackerResult<()> {
        if self.positions.len() % 3 != 0 {
            return Err(invalid_mesh(format!(
                "{} position components is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.has_normals() && self.normals.len() != self.positions.len() {
            return Err(invalid_mesh(format!(
                "{} normal components for {} position components",
                self.normals.len(),
                self.positions.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(invalid_mesh(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(invalid_mesh(format!(
                "index {} out of range for {} vertices",
                index, vertex_count
            )));
        }
        Ok(())
    }
}
