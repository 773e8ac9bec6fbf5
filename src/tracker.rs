//! Mesh Tracker
//!
//! Turns raw provider notifications into an identity-stable registry of
//! tracked meshes. Providers only ever report payloads, so the tracker keeps
//! a payload-key to id map to recognise a mesh again on update and removal.
//!
//! Invariants:
//! - every id in the identity map has a registry entry, and removal drops both
//! - ids are drawn once per payload the tracker has not seen, never reused
//! - an update for an unknown payload is handled as an add
//!
//! Both maps live behind one lock and the id is drawn while it is held, so
//! they always change together. Notifications and provider callbacks run
//! after the lock is released.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::mesh::{GlobalMeshIds, MeshId, MeshIdAllocator, PayloadKey, SharedMeshData};
use crate::observable::{Observable, ObserverHandle};
use crate::provider::MeshProvider;
use crate::session::{FrameContext, XrSession};

/// The tracker's view of one provider mesh
#[derive(Debug, Clone)]
pub struct TrackedMesh {
    pub id: MeshId,
    pub data: SharedMeshData,
    /// Session time of the last add or update, in milliseconds
    pub last_changed_time: f64,
}

/// Snapshot of tracker state for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSummary {
    pub tracked_meshes: usize,
    pub providers: usize,
    pub enabled: bool,
    pub attached: bool,
    pub mesh_ids: Vec<MeshId>,
}

struct SessionLink {
    session: Arc<XrSession>,
    init: ObserverHandle,
    frame: ObserverHandle,
    ended: ObserverHandle,
}

impl SessionLink {
    fn unsubscribe(self) {
        self.session.on_session_init.remove(self.init);
        self.session.on_frame.remove(self.frame);
        self.session.on_session_ended.remove(self.ended);
    }
}

struct RegisteredProvider {
    provider: Arc<dyn MeshProvider>,
    added: ObserverHandle,
    updated: ObserverHandle,
    removed: ObserverHandle,
}

impl RegisteredProvider {
    fn unsubscribe(self) {
        let streams = self.provider.streams();
        streams.on_mesh_added.remove(self.added);
        streams.on_mesh_updated.remove(self.updated);
        streams.on_mesh_removed.remove(self.removed);
    }
}

#[derive(Default)]
struct TrackerState {
    enabled: bool,
    disposed: bool,
    session: Option<SessionLink>,
    identities: FxHashMap<PayloadKey, MeshId>,
    meshes: BTreeMap<MeshId, TrackedMesh>,
}

impl TrackerState {
    fn timestamp(&self) -> f64 {
        self.session
            .as_ref()
            .map(|link| link.session.current_timestamp())
            .unwrap_or(0.0)
    }

    fn insert(&mut self, id: MeshId, data: &SharedMeshData) -> TrackedMesh {
        let tracked = TrackedMesh {
            id,
            data: data.clone(),
            last_changed_time: self.timestamp(),
        };
        self.identities.insert(data.key(), id);
        self.meshes.insert(id, tracked.clone());
        tracked
    }

    fn clear(&mut self) {
        self.identities.clear();
        self.meshes.clear();
    }
}

enum Change {
    Added(TrackedMesh),
    Updated(TrackedMesh),
}

fn same_provider(a: &Arc<dyn MeshProvider>, b: &Arc<dyn MeshProvider>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

pub struct MeshTracker {
    config: TrackerConfig,
    ids: Arc<dyn MeshIdAllocator>,
    self_ref: Weak<MeshTracker>,
    state: Mutex<TrackerState>,
    providers: Mutex<Vec<RegisteredProvider>>,

    /// Fired with each newly tracked mesh
    pub on_mesh_added: Observable<TrackedMesh>,
    /// Fired with the new state of an updated mesh
    pub on_mesh_updated: Observable<TrackedMesh>,
    /// Fired with the last known state of a removed mesh
    pub on_mesh_removed: Observable<TrackedMesh>,
}

impl MeshTracker {
    /// Create a tracker drawing ids from the process-wide counter
    pub fn new(config: TrackerConfig) -> Arc<Self> {
        Self::with_allocator(config, Arc::new(GlobalMeshIds))
    }

    pub fn with_allocator(config: TrackerConfig, ids: Arc<dyn MeshIdAllocator>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            ids,
            self_ref: self_ref.clone(),
            state: Mutex::new(TrackerState::default()),
            providers: Mutex::new(Vec::new()),
            on_mesh_added: Observable::new(),
            on_mesh_updated: Observable::new(),
            on_mesh_removed: Observable::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // Providers

    /// Subscribe to a provider's streams. Returns false if it was already
    /// registered or the tracker is disposed
    pub fn register_provider(&self, provider: Arc<dyn MeshProvider>) -> bool {
        if self.is_disposed() {
            log::trace!("Ignoring provider '{}' on a disposed tracker", provider.name());
            return false;
        }

        let mut providers = self.providers.lock();
        if providers.iter().any(|p| same_provider(&p.provider, &provider)) {
            return false;
        }

        let streams = provider.streams();

        let tracker = self.self_ref.clone();
        let added = streams.on_mesh_added.add(move |data| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.on_provider_mesh_added(data);
            }
        });

        let tracker = self.self_ref.clone();
        let updated = streams.on_mesh_updated.add(move |data| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.on_provider_mesh_updated(data);
            }
        });

        let tracker = self.self_ref.clone();
        let removed = streams.on_mesh_removed.add(move |data| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.on_provider_mesh_removed(data);
            }
        });

        log::debug!("Registered mesh provider '{}'", provider.name());
        providers.push(RegisteredProvider {
            provider,
            added,
            updated,
            removed,
        });
        true
    }

    /// Unsubscribe from a provider. Returns false if it was not registered
    pub fn unregister_provider(&self, provider: &Arc<dyn MeshProvider>) -> bool {
        let registered = {
            let mut providers = self.providers.lock();
            match providers.iter().position(|p| same_provider(&p.provider, provider)) {
                Some(pos) => providers.remove(pos),
                None => return false,
            }
        };

        log::debug!("Unregistered mesh provider '{}'", provider.name());
        registered.unsubscribe();
        true
    }

    pub fn provider_count(&self) -> usize {
        self.providers.lock().len()
    }

    fn unregister_all_providers(&self) {
        let registered = std::mem::take(&mut *self.providers.lock());
        for provider in registered {
            provider.unsubscribe();
        }
    }

    // Lifecycle

    /// Bind to a session: its start initializes the tracker, its frames are
    /// forwarded to providers and its end detaches the tracker
    pub fn attach(&self, session: &Arc<XrSession>) -> TrackerResult<()> {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(TrackerError::Disposed);
            }
            if state.session.is_some() {
                return Err(TrackerError::AlreadyAttached);
            }

            let tracker = self.self_ref.clone();
            let init = session.on_session_init.add(move |_| {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.initialize();
                }
            });

            let tracker = self.self_ref.clone();
            let frame = session.on_frame.add(move |frame| {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.on_frame(Some(frame));
                }
            });

            let tracker = self.self_ref.clone();
            let ended = session.on_session_ended.add(move |_| {
                if let Some(tracker) = tracker.upgrade() {
                    if let Err(e) = tracker.detach() {
                        log::debug!("Session ended for a tracker that was not attached: {}", e);
                    }
                }
            });

            state.session = Some(SessionLink {
                session: session.clone(),
                init,
                frame,
                ended,
            });

            // joining a running session keeps whatever is already tracked
            if session.is_running() {
                state.enabled = true;
            }
        }

        log::info!("Mesh tracker attached");
        Ok(())
    }

    /// Session (re)start: enable and silently discard everything tracked
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            log::trace!("Ignoring initialize on a disposed tracker");
            return;
        }
        state.enabled = true;
        if !state.meshes.is_empty() {
            log::info!("Mesh tracker reset, discarding {} tracked meshes", state.meshes.len());
            state.clear();
        }
    }

    /// Unbind from the session. Unless configured to retain them, every
    /// tracked mesh is removed (newest first) with a notification. All
    /// providers are unregistered.
    pub fn detach(&self) -> TrackerResult<()> {
        let (link, drained) = {
            let mut state = self.state.lock();
            let link = state.session.take().ok_or(TrackerError::NotAttached)?;
            state.enabled = false;

            let mut drained = Vec::new();
            if !self.config.retain_meshes_on_detach {
                while let Some((_, mesh)) = state.meshes.pop_last() {
                    drained.push(mesh);
                }
                state.identities.clear();
            }
            (link, drained)
        };

        link.unsubscribe();

        for mesh in &drained {
            self.on_mesh_removed.notify(mesh);
        }

        self.unregister_all_providers();

        log::info!("Mesh tracker detached, {} meshes removed", drained.len());
        Ok(())
    }

    /// Detach if needed and drop every subscriber of the tracker's streams.
    /// The tracker cannot be attached again afterwards
    pub fn dispose(&self) {
        if self.is_attached() {
            if let Err(e) = self.detach() {
                log::warn!("Detach during dispose failed: {}", e);
            }
        }
        self.unregister_all_providers();

        {
            let mut state = self.state.lock();
            state.disposed = true;
            state.enabled = false;
        }

        self.on_mesh_added.clear();
        self.on_mesh_updated.clear();
        self.on_mesh_removed.clear();
        log::debug!("Mesh tracker disposed");
    }

    // Frames

    /// Forward a frame to every provider in registration order
    pub fn on_frame(&self, frame: Option<&FrameContext>) {
        let frame = match frame {
            Some(frame) => frame,
            None => return,
        };

        {
            let state = self.state.lock();
            if state.session.is_none() || !state.enabled {
                return;
            }
        }

        let providers: Vec<Arc<dyn MeshProvider>> = self
            .providers
            .lock()
            .iter()
            .map(|p| p.provider.clone())
            .collect();

        let start = Instant::now();
        for provider in &providers {
            provider.on_frame(frame);
        }

        if self.config.log_frame_timing {
            log::debug!(
                "Frame {} fanned out to {} providers in {:.3}ms",
                frame.frame_number,
                providers.len(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }

    // Provider events

    pub fn on_provider_mesh_added(&self, data: &SharedMeshData) {
        let change = {
            let mut state = self.state.lock();
            if state.disposed || !state.enabled {
                log::trace!("Ignoring added {} while disabled", data.key());
                return;
            }

            match state.identities.get(&data.key()).copied() {
                // a repeated add keeps the id it already has
                Some(id) => Self::update_entry(&mut state, id, data).map(Change::Updated),
                None => {
                    let id = self.ids.next_id();
                    Some(Change::Added(state.insert(id, data)))
                }
            }
        };

        self.publish(change);
    }

    pub fn on_provider_mesh_updated(&self, data: &SharedMeshData) {
        let change = {
            let mut state = self.state.lock();
            if state.disposed || !state.enabled {
                log::trace!("Ignoring updated {} while disabled", data.key());
                return;
            }

            match state.identities.get(&data.key()).copied() {
                Some(id) => Self::update_entry(&mut state, id, data).map(Change::Updated),
                None => {
                    log::debug!("Update for unseen {}, tracking it as new", data.key());
                    let id = self.ids.next_id();
                    Some(Change::Added(state.insert(id, data)))
                }
            }
        };

        self.publish(change);
    }

    pub fn on_provider_mesh_removed(&self, data: &SharedMeshData) {
        let removed = {
            let mut state = self.state.lock();
            if state.disposed || !state.enabled {
                log::trace!("Ignoring removed {} while disabled", data.key());
                return;
            }

            let id = match state.identities.remove(&data.key()) {
                Some(id) => id,
                None => {
                    log::debug!("Removal for unknown {}", data.key());
                    return;
                }
            };

            match state.meshes.remove(&id) {
                Some(mesh) => mesh,
                None => {
                    log::warn!("{} has an identity but no registry entry", id);
                    return;
                }
            }
        };

        log::debug!("Removed {} ({})", removed.id, removed.data.key());
        self.on_mesh_removed.notify(&removed);
    }

    fn update_entry(state: &mut TrackerState, id: MeshId, data: &SharedMeshData) -> Option<TrackedMesh> {
        let now = state.timestamp();
        match state.meshes.get_mut(&id) {
            Some(mesh) => {
                mesh.last_changed_time = now;
                mesh.data = data.clone();
                Some(mesh.clone())
            }
            None => {
                log::warn!("{} has an identity but no registry entry", id);
                None
            }
        }
    }

    fn publish(&self, change: Option<Change>) {
        match change {
            Some(Change::Added(mesh)) => {
                log::debug!("Added {} ({})", mesh.id, mesh.data.key());
                self.on_mesh_added.notify(&mesh);
            }
            Some(Change::Updated(mesh)) => {
                log::debug!("Updated {} at {}ms", mesh.id, mesh.last_changed_time);
                self.on_mesh_updated.notify(&mesh);
            }
            None => {}
        }
    }

    // Queries

    /// Live meshes in ascending id order
    pub fn tracked_meshes(&self) -> Vec<TrackedMesh> {
        self.state.lock().meshes.values().cloned().collect()
    }

    pub fn get(&self, id: MeshId) -> Option<TrackedMesh> {
        self.state.lock().meshes.get(&id).cloned()
    }

    /// Id assigned to a payload, if it is currently tracked
    pub fn id_of(&self, data: &SharedMeshData) -> Option<MeshId> {
        self.state.lock().identities.get(&data.key()).copied()
    }

    pub fn len(&self) -> usize {
        self.state.lock().meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().meshes.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().session.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn summary(&self) -> TrackerSummary {
        let providers = self.provider_count();
        let state = self.state.lock();
        TrackerSummary {
            tracked_meshes: state.meshes.len(),
            providers,
            enabled: state.enabled,
            attached: state.session.is_some(),
            mesh_ids: state.meshes.keys().copied().collect(),
        }
    }
}
