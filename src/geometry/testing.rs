//! In-memory geometry sources for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{GeometryError, GeometryRequestKey, GeometrySource, SubAssemblyKind};

/// Binary STL containing `triangles`, each given as three vertices.
pub(crate) fn binary_stl(triangles: &[[Vec3; 3]]) -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
    for tri in triangles {
        bytes.extend_from_slice(&[0u8; 12]);
        for v in tri {
            for c in v.to_array() {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0u8; 2]);
    }
    bytes
}

/// Reported materials per kind; the model list has the same length.
fn scripted_materials(kind: SubAssemblyKind) -> &'static [&'static str] {
    match kind {
        SubAssemblyKind::Frame | SubAssemblyKind::AcUnit => &["metal", "plastic"],
        SubAssemblyKind::Enclosure => &["metal", "plastic", "metal", "plastic", "metal"],
        SubAssemblyKind::Duct => &["metal"],
    }
}

/// Answers every request from memory, with per-key failure injection.
pub(crate) struct ScriptedSource {
    metadata_calls: AtomicUsize,
    mesh_calls: AtomicUsize,
    failures: Mutex<FxHashMap<GeometryRequestKey, GeometryError>>,
    corrupt: AtomicBool,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            metadata_calls: AtomicUsize::new(0),
            mesh_calls: AtomicUsize::new(0),
            failures: Mutex::new(FxHashMap::default()),
            corrupt: AtomicBool::new(false),
        }
    }

    /// Make every metadata fetch for `key` fail with `error`.
    pub(crate) fn fail_metadata(&self, key: &GeometryRequestKey, error: GeometryError) {
        if let Ok(mut failures) = self.failures.lock() {
            drop(failures.insert(key.clone(), error));
        }
    }

    /// Serve undecodable mesh buffers from now on.
    pub(crate) fn corrupt_meshes(&self) {
        self.corrupt.store(true, Ordering::SeqCst);
    }

    pub(crate) fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn mesh_calls(&self) -> usize {
        self.mesh_calls.load(Ordering::SeqCst)
    }
}

impl GeometrySource for ScriptedSource {
    fn fetch_metadata(
        &self,
        key: &GeometryRequestKey,
    ) -> Result<Vec<u8>, GeometryError> {
        let _ = self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self
            .failures
            .lock()
            .ok()
            .and_then(|failures| failures.get(key).cloned())
        {
            return Err(error);
        }

        let materials = scripted_materials(key.kind());
        let models: Vec<String> = (0..materials.len())
            .map(|i| format!("part{i}.stl"))
            .collect();
        let body = serde_json::json!({
            "id": key.to_string(),
            "models": models,
            "materials": materials,
            "min": [0, 0, 0],
            "max": [600, 2000, 800],
            "center": [300, 1000, 400],
            "size": [600, 2000, 800],
        });
        Ok(body.to_string().into_bytes())
    }

    fn fetch_mesh(
        &self,
        _model_id: &str,
        _model: &str,
    ) -> Result<Vec<u8>, GeometryError> {
        let _ = self.mesh_calls.fetch_add(1, Ordering::SeqCst);
        if self.corrupt.load(Ordering::SeqCst) {
            return Ok(b"not an stl".to_vec());
        }
        Ok(binary_stl(&[[Vec3::ZERO, Vec3::X * 600.0, Vec3::Y * 2000.0]]))
    }
}

/// Holds each metadata fetch until its key is released, so tests decide
/// the order in which results land.
pub(crate) struct GatedSource {
    inner: ScriptedSource,
    released: Mutex<FxHashSet<GeometryRequestKey>>,
    signal: Condvar,
}

impl GatedSource {
    /// Upper bound on how long a gated fetch waits before failing, so a
    /// forgotten release cannot hang the worker pool on drop.
    const GATE_TIMEOUT: Duration = Duration::from_secs(10);

    pub(crate) fn new() -> Self {
        Self {
            inner: ScriptedSource::new(),
            released: Mutex::new(FxHashSet::default()),
            signal: Condvar::new(),
        }
    }

    /// Let fetches for `key` (current and future) proceed.
    pub(crate) fn release(&self, key: &GeometryRequestKey) {
        if let Ok(mut released) = self.released.lock() {
            let _ = released.insert(key.clone());
        }
        self.signal.notify_all();
    }

    pub(crate) fn metadata_calls(&self) -> usize {
        self.inner.metadata_calls()
    }
}

impl GeometrySource for GatedSource {
    fn fetch_metadata(
        &self,
        key: &GeometryRequestKey,
    ) -> Result<Vec<u8>, GeometryError> {
        let Ok(guard) = self.released.lock() else {
            return Err(GeometryError::transport(key.path(), "gate poisoned"));
        };
        let waited = self.signal.wait_timeout_while(guard, Self::GATE_TIMEOUT, |released| {
            !released.contains(key)
        });
        match waited {
            Ok((_, timeout)) if !timeout.timed_out() => self.inner.fetch_metadata(key),
            _ => Err(GeometryError::transport(key.path(), "gate never released")),
        }
    }

    fn fetch_mesh(
        &self,
        model_id: &str,
        model: &str,
    ) -> Result<Vec<u8>, GeometryError> {
        self.inner.fetch_mesh(model_id, model)
    }
}
