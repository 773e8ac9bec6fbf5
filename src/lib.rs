pub mod config;
pub mod error;
pub mod mesh;
pub mod observable;
pub mod provider;
pub mod scroll;
pub mod session;
pub mod tracker;

pub use config::{Config, ScrollViewerConfig, TrackerConfig};
pub use error::{TrackerError, TrackerResult};
pub use mesh::{GlobalMeshIds, MeshBounds, MeshData, MeshId, MeshIdAllocator, PayloadKey, SequentialMeshIds, SharedMeshData};
pub use observable::{Observable, ObserverHandle};
pub use provider::{DetectedMeshProvider, MeshProvider, MeshStreams};
pub use scroll::{ScrollBar, ScrollOffset, ScrollViewer, WheelEvent};
pub use session::{DetectedMesh, FrameContext, SessionState, XrSession};
pub use tracker::{MeshTracker, TrackedMesh, TrackerSummary};
