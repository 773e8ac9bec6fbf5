//! XR Session
//!
//! Stand-in for the host runtime's session: it owns the lifecycle signals
//! and the session clock the tracker depends on, and delivers one
//! `FrameContext` per rendered frame.

use glam::Mat4;
use parking_lot::RwLock;

use crate::observable::Observable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Ended,
}

/// One mesh as reported by the runtime for a single frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedMesh {
    /// Runtime handle, stable for as long as the runtime tracks the mesh
    pub source_id: u64,
    /// Session time of the runtime's last change to this mesh
    pub last_changed_time: f64,
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
    pub normals: Vec<f32>,
    pub transform: Mat4,
    pub semantic_label: Option<String>,
}

impl DetectedMesh {
    pub fn new(source_id: u64, last_changed_time: f64, positions: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            source_id,
            last_changed_time,
            positions,
            indices,
            normals: Vec::new(),
            transform: Mat4::IDENTITY,
            semantic_label: None,
        }
    }

    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_semantic_label(mut self, label: impl Into<String>) -> Self {
        self.semantic_label = Some(label.into());
        self
    }
}

/// Per-frame data handed to mesh providers. The tracker never looks inside
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    pub frame_number: u64,
    /// Session time in milliseconds
    pub timestamp: f64,
    /// The runtime's detected-mesh set, `None` when it reported nothing
    pub detected_meshes: Option<Vec<DetectedMesh>>,
}

impl FrameContext {
    pub fn new(frame_number: u64, timestamp: f64) -> Self {
        Self {
            frame_number,
            timestamp,
            detected_meshes: None,
        }
    }

    pub fn with_detected_meshes(mut self, meshes: Vec<DetectedMesh>) -> Self {
        self.detected_meshes = Some(meshes);
        self
    }
}

pub struct XrSession {
    state: RwLock<SessionState>,
    current_timestamp: RwLock<f64>,

    /// Fired each time the session starts
    pub on_session_init: Observable<()>,
    /// Fired when a running session ends
    pub on_session_ended: Observable<()>,
    /// Fired once per frame while running
    pub on_frame: Observable<FrameContext>,
}

impl XrSession {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Idle),
            current_timestamp: RwLock::new(0.0),
            on_session_init: Observable::new(),
            on_session_ended: Observable::new(),
            on_frame: Observable::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Monotonic session time of the latest frame, in milliseconds
    pub fn current_timestamp(&self) -> f64 {
        *self.current_timestamp.read()
    }

    /// Start (or restart after an end) the session
    pub fn start(&self) {
        {
            let mut state = self.state.write();
            if *state == SessionState::Running {
                log::warn!("XR session start requested while already running");
                return;
            }
            *state = SessionState::Running;
        }
        *self.current_timestamp.write() = 0.0;

        log::info!("XR session started");
        self.on_session_init.notify(&());
    }

    /// Deliver a frame. Returns false when the session is not running
    pub fn frame(&self, frame: FrameContext) -> bool {
        if !self.is_running() {
            log::trace!("Dropping frame {} outside a running session", frame.frame_number);
            return false;
        }

        {
            let mut now = self.current_timestamp.write();
            if frame.timestamp >= *now {
                *now = frame.timestamp;
            } else {
                log::debug!(
                    "Frame {} timestamp {} is older than session clock {}",
                    frame.frame_number,
                    frame.timestamp,
                    *now
                );
            }
        }

        self.on_frame.notify(&frame);
        true
    }

    /// End a running session
    pub fn end(&self) {
        {
            let mut state = self.state.write();
            if *state != SessionState::Running {
                return;
            }
            *state = SessionState::Ended;
        }

        log::info!("XR session ended at {}ms", self.current_timestamp());
        self.on_session_ended.notify(&());
    }
}

impl Default for XrSession {
    fn default() -> Self {
        Self::new()
    }
}
