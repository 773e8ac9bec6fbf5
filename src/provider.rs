//! Mesh providers
//!
//! A provider is any source of raw mesh change events. It exposes three
//! streams carrying `SharedMeshData` and reacts to frames however it needs;
//! the tracker only subscribes to the streams and forwards frames.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::mesh::{MeshData, SharedMeshData};
use crate::observable::Observable;
use crate::session::{DetectedMesh, FrameContext};

/// The three change streams every provider exposes
#[derive(Debug, Default)]
pub struct MeshStreams {
    pub on_mesh_added: Observable<SharedMeshData>,
    pub on_mesh_updated: Observable<SharedMeshData>,
    pub on_mesh_removed: Observable<SharedMeshData>,
}

impl MeshStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_added(&self, data: &SharedMeshData) {
        self.on_mesh_added.notify(data);
    }

    pub fn emit_updated(&self, data: &SharedMeshData) {
        self.on_mesh_updated.notify(data);
    }

    pub fn emit_removed(&self, data: &SharedMeshData) {
        self.on_mesh_removed.notify(data);
    }
}

/// Source of mesh change events
pub trait MeshProvider: Send + Sync {
    fn streams(&self) -> &MeshStreams;

    /// Called once per frame by the tracker the provider is registered with
    fn on_frame(&self, frame: &FrameContext);

    fn name(&self) -> &str {
        "unnamed_provider"
    }
}

struct KnownMesh {
    data: SharedMeshData,
    last_changed_time: f64,
}

/// Provider fed by the runtime's per-frame detected-mesh set.
///
/// Each frame is diffed against the meshes seen so far, keyed by the
/// runtime's `source_id`: new ids are added, ids whose `last_changed_time`
/// moved are updated, and ids missing from the set are removed. Meshes
/// that fail `MeshData::validate` are skipped; an invalid revision keeps
/// the previous geometry.
pub struct DetectedMeshProvider {
    name: String,
    streams: MeshStreams,
    known: Mutex<FxHashMap<u64, KnownMesh>>,
}

enum Change {
    Added(SharedMeshData),
    Updated(SharedMeshData),
    Removed(SharedMeshData),
}

impl DetectedMeshProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            streams: MeshStreams::new(),
            known: Mutex::new(FxHashMap::default()),
        }
    }

    /// Number of meshes currently known to this provider
    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.lock().is_empty()
    }

    /// Forget every known mesh, emitting a removal for each
    pub fn clear(&self) {
        let mut drained: Vec<(u64, SharedMeshData)> = self
            .known
            .lock()
            .drain()
            .map(|(id, known)| (id, known.data))
            .collect();
        drained.sort_by_key(|(id, _)| *id);

        for (_, data) in drained {
            self.streams.emit_removed(&data);
        }
    }

    fn diff(&self, detected: &[DetectedMesh]) -> Vec<Change> {
        let mut known = self.known.lock();
        let mut changes = Vec::new();

        for mesh in detected {
            match known.get_mut(&mesh.source_id) {
                None => {
                    let data = build_mesh_data(mesh);
                    if let Err(e) = data.validate() {
                        log::warn!("Skipping detected mesh {}: {}", mesh.source_id, e);
                        continue;
                    }
                    let data = Arc::new(data);
                    known.insert(
                        mesh.source_id,
                        KnownMesh {
                            data: data.clone(),
                            last_changed_time: mesh.last_changed_time,
                        },
                    );
                    changes.push(Change::Added(data));
                }
                Some(entry) if entry.last_changed_time != mesh.last_changed_time => {
                    let mut revised = entry.data.revise(
                        mesh.positions.clone(),
                        mesh.indices.clone(),
                        mesh.normals.clone(),
                    );
                    revised.transform = mesh.transform;
                    revised.semantic_label = mesh.semantic_label.clone();
                    entry.last_changed_time = mesh.last_changed_time;

                    if let Err(e) = revised.validate() {
                        log::warn!("Ignoring revision of detected mesh {}: {}", mesh.source_id, e);
                        continue;
                    }
                    entry.data = Arc::new(revised);
                    changes.push(Change::Updated(entry.data.clone()));
                }
                Some(_) => {}
            }
        }

        let present: FxHashSet<u64> = detected.iter().map(|mesh| mesh.source_id).collect();
        let mut gone: Vec<u64> = known
            .keys()
            .copied()
            .filter(|id| !present.contains(id))
            .collect();
        gone.sort_unstable();

        for id in gone {
            if let Some(entry) = known.remove(&id) {
                changes.push(Change::Removed(entry.data));
            }
        }

        changes
    }
}

fn build_mesh_data(mesh: &DetectedMesh) -> MeshData {
    let data = MeshData::new(mesh.positions.clone(), mesh.indices.clone(), mesh.normals.clone())
        .with_transform(mesh.transform);
    match &mesh.semantic_label {
        Some(label) => data.with_semantic_label(label.clone()),
        None => data,
    }
}

impl MeshProvider for DetectedMeshProvider {
    fn streams(&self) -> &MeshStreams {
        &self.streams
    }

    fn on_frame(&self, frame: &FrameContext) {
        let detected = match &frame.detected_meshes {
            Some(detected) => detected,
            None => return,
        };

        for change in self.diff(detected) {
            match change {
                Change::Added(data) => self.streams.emit_added(&data),
                Change::Updated(data) => self.streams.emit_updated(&data),
                Change::Removed(data) => self.streams.emit_removed(&data),
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
