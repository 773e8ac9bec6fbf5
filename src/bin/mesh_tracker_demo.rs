//! Drives a simulated XR session through the mesh tracker and prints what it saw

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;

use xr_mesh_tracker::{
    Config, DetectedMesh, DetectedMeshProvider, FrameContext, MeshProvider, MeshTracker, XrSession,
};

#[derive(Debug, Default, Serialize)]
struct NotificationCounts {
    added: usize,
    updated: usize,
    removed: usize,
}

fn plane(source_id: u64, changed: f64, size: f32, label: &str) -> DetectedMesh {
    DetectedMesh::new(
        source_id,
        changed,
        vec![0.0, 0.0, 0.0, size, 0.0, 0.0, size, 0.0, size, 0.0, 0.0, size],
        vec![0, 1, 2, 0, 2, 3],
    )
    .with_normals(vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0])
    .with_semantic_label(label)
}

fn scripted_frames() -> Vec<FrameContext> {
    let frame_time = 1000.0 / 72.0;
    let at = |n: u64| FrameContext::new(n, n as f64 * frame_time);

    vec![
        at(1).with_detected_meshes(vec![plane(100, 0.0, 2.0, "floor")]),
        at(2).with_detected_meshes(vec![plane(100, 0.0, 2.0, "floor"), plane(101, 27.0, 1.0, "table")]),
        at(3),
        at(4).with_detected_meshes(vec![plane(100, 55.0, 3.0, "floor"), plane(101, 27.0, 1.0, "table")]),
        at(5).with_detected_meshes(vec![plane(100, 55.0, 3.0, "floor"), plane(102, 69.0, 0.5, "chair")]),
    ]
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };
    log::info!("Using tracker config {:?}", config.tracker);

    let session = Arc::new(XrSession::new());
    let tracker = MeshTracker::new(config.tracker.clone());
    let provider = Arc::new(DetectedMeshProvider::new("xr-mesh-detection"));
    tracker.register_provider(provider.clone());
    tracker.attach(&session)?;

    let counts = Arc::new(Mutex::new(NotificationCounts::default()));

    let c = counts.clone();
    tracker.on_mesh_added.add(move |mesh| {
        c.lock().added += 1;
        log::info!(
            "+ {} {:?}: {} vertices, {} triangles",
            mesh.id,
            mesh.data.semantic_label,
            mesh.data.vertex_count(),
            mesh.data.triangle_count()
        );
    });

    let c = counts.clone();
    tracker.on_mesh_updated.add(move |mesh| {
        c.lock().updated += 1;
        log::info!("~ {} changed at {:.1}ms, bounds {:?}", mesh.id, mesh.last_changed_time, mesh.data.bounds());
    });

    let c = counts.clone();
    tracker.on_mesh_removed.add(move |mesh| {
        c.lock().removed += 1;
        log::info!("- {} {:?}", mesh.id, mesh.data.semantic_label);
    });

    session.start();
    for frame in scripted_frames() {
        session.frame(frame);
    }
    log::info!(
        "Provider '{}' knows {} meshes, tracker holds {}",
        provider.name(),
        provider.len(),
        tracker.len()
    );
    session.end();

    let report = serde_json::json!({
        "notifications": &*counts.lock(),
        "tracker": tracker.summary(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracker.dispose();
    Ok(())
}
