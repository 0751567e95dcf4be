//! Parameter-keyed geometry fetch cache with request coalescing.
//!
//! Fetch jobs run on a small pool of background threads so the UI thread
//! never blocks on the network. All bookkeeping (cache entries, in-flight
//! waiters, statistics) stays on the owning thread; workers only see a key
//! and send back a finished [`CachedGeometry`] or a [`GeometryError`].
//!
//! A request for a key that is already cached is answered synchronously. A
//! request for a key that is already in flight is attached to that job, and
//! every attached ticket receives the single result when it lands. Failures
//! are delivered but never cached, so the next request for the same key
//! goes back to the network.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rustc_hash::FxHashMap;
use web_time::Instant;

use super::{
    GeometryError, GeometryRequestKey, GeometrySource, MaterialTag,
    MeshGeometry, ModelBounds, ModelInfo,
};
use crate::error::RackroomError;
use crate::options::ServiceOptions;

/// A fully fetched and decoded sub-assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedGeometry {
    /// Key this geometry was generated for.
    pub key: GeometryRequestKey,
    /// Model-set id reported by the service.
    pub model_id: String,
    /// Decoded meshes, in the service's model order.
    pub meshes: Vec<MeshGeometry>,
    /// Reported material per mesh, parallel to `meshes`.
    pub materials: Vec<MaterialTag>,
    /// Bounds reported in the metadata envelope.
    pub bounds: ModelBounds,
}

/// Immediate answer to [`GeometryFetchCache::request`].
#[derive(Clone, Debug)]
pub enum FetchStatus {
    /// Cache hit; no round trip.
    Ready(Arc<CachedGeometry>),
    /// Queued or attached to an in-flight job; the result arrives through
    /// [`GeometryFetchCache::poll`].
    Pending,
    /// The worker pool is gone and the job could not be queued.
    Failed(GeometryError),
}

/// A finished fetch delivered to one waiter.
#[derive(Clone, Debug)]
pub struct FetchCompletion<T> {
    /// The waiter's ticket, as passed to `request`.
    pub ticket: T,
    /// Key the fetch was for.
    pub key: GeometryRequestKey,
    /// Fetched geometry or the failure.
    pub result: Result<Arc<CachedGeometry>, GeometryError>,
}

/// Running counters, useful for asserting fetch idempotence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Jobs handed to the worker pool (one per distinct in-flight key).
    pub network_requests: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Requests attached to an already in-flight job.
    pub coalesced: u64,
    /// Jobs that finished with an error.
    pub failures: u64,
    /// Entries dropped by the LRU bound.
    pub evictions: u64,
}

struct FetchJob {
    key: GeometryRequestKey,
}

struct FetchOutcome {
    key: GeometryRequestKey,
    result: Result<CachedGeometry, GeometryError>,
}

struct CacheEntry {
    geometry: Arc<CachedGeometry>,
    last_used: u64,
}

/// Shared geometry cache, generic over the waiter ticket type.
pub struct GeometryFetchCache<T> {
    entries: FxHashMap<GeometryRequestKey, CacheEntry>,
    in_flight: FxHashMap<GeometryRequestKey, Vec<T>>,
    capacity: usize,
    clock: u64,
    stats: FetchStats,
    job_tx: Option<mpsc::Sender<FetchJob>>,
    result_rx: mpsc::Receiver<FetchOutcome>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Clone> GeometryFetchCache<T> {
    /// Spawn the worker pool and create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`RackroomError::ThreadSpawn`] if a worker thread fails to
    /// spawn.
    pub fn new(
        source: Arc<dyn GeometrySource>,
        options: &ServiceOptions,
    ) -> Result<Self, RackroomError> {
        let (job_tx, job_rx) = mpsc::channel::<FetchJob>();
        let (result_tx, result_rx) = mpsc::channel::<FetchOutcome>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let worker_count = options.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let source = Arc::clone(&source);
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("geometry-fetch-{i}"))
                .spawn(move || {
                    worker_loop(source.as_ref(), &job_rx, &result_tx);
                })
                .map_err(RackroomError::ThreadSpawn)?;
            workers.push(handle);
        }

        Ok(Self {
            entries: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            capacity: options.cache_capacity.max(1),
            clock: 0,
            stats: FetchStats::default(),
            job_tx: Some(job_tx),
            result_rx,
            workers,
        })
    }

    /// Request geometry for `key` on behalf of `ticket`.
    pub fn request(&mut self, key: &GeometryRequestKey, ticket: T) -> FetchStatus {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.last_used = self.clock;
            self.stats.cache_hits += 1;
            return FetchStatus::Ready(Arc::clone(&entry.geometry));
        }

        if let Some(waiters) = self.in_flight.get_mut(key) {
            waiters.push(ticket);
            self.stats.coalesced += 1;
            log::debug!("coalesced request for {key}");
            return FetchStatus::Pending;
        }

        let queued = self
            .job_tx
            .as_ref()
            .is_some_and(|tx| tx.send(FetchJob { key: key.clone() }).is_ok());
        if !queued {
            return FetchStatus::Failed(GeometryError::transport(
                key.path(),
                "geometry worker pool is not running",
            ));
        }

        drop(self.in_flight.insert(key.clone(), vec![ticket]));
        self.stats.network_requests += 1;
        log::debug!("queued fetch for {key}");
        FetchStatus::Pending
    }

    /// Drain finished jobs without blocking.
    pub fn poll(&mut self) -> Vec<FetchCompletion<T>> {
        let mut completions = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.settle(outcome, &mut completions);
        }
        completions
    }

    /// Block up to `timeout` for at least one finished job, then drain.
    ///
    /// Returns immediately with nothing when no job is in flight.
    pub fn wait(&mut self, timeout: Duration) -> Vec<FetchCompletion<T>> {
        let mut completions = Vec::new();
        if self.in_flight.is_empty() {
            return completions;
        }
        if let Ok(outcome) = self.result_rx.recv_timeout(timeout) {
            self.settle(outcome, &mut completions);
        }
        completions.extend(self.poll());
        completions
    }

    /// Cached geometry for `key`, without touching recency or statistics.
    #[must_use]
    pub fn peek(&self, key: &GeometryRequestKey) -> Option<&Arc<CachedGeometry>> {
        self.entries.get(key).map(|e| &e.geometry)
    }

    /// Whether a successful result for `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &GeometryRequestKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether a job for `key` is currently running.
    #[must_use]
    pub fn is_in_flight(&self, key: &GeometryRequestKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Number of distinct keys in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Drop every cached entry. In-flight jobs are unaffected.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn settle(
        &mut self,
        outcome: FetchOutcome,
        completions: &mut Vec<FetchCompletion<T>>,
    ) {
        let waiters = self.in_flight.remove(&outcome.key).unwrap_or_default();
        let result = match outcome.result {
            Ok(geometry) => {
                let geometry = Arc::new(geometry);
                self.insert(outcome.key.clone(), Arc::clone(&geometry));
                Ok(geometry)
            }
            Err(e) => {
                self.stats.failures += 1;
                log::error!("fetch for {} failed: {e}", outcome.key);
                Err(e)
            }
        };
        completions.extend(waiters.into_iter().map(|ticket| FetchCompletion {
            ticket,
            key: outcome.key.clone(),
            result: result.clone(),
        }));
    }

    fn insert(&mut self, key: GeometryRequestKey, geometry: Arc<CachedGeometry>) {
        self.clock += 1;
        drop(self.entries.insert(
            key,
            CacheEntry {
                geometry,
                last_used: self.clock,
            },
        ));
        while self.entries.len() > self.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            log::debug!("evicting {oldest}");
            drop(self.entries.remove(&oldest));
            self.stats.evictions += 1;
        }
    }
}

impl<T> GeometryFetchCache<T> {
    /// Stop the worker pool and wait for running jobs to finish.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T> Drop for GeometryFetchCache<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker thread main loop: take one job at a time until the job
/// channel closes or the owner stops listening.
fn worker_loop(
    source: &dyn GeometrySource,
    jobs: &Mutex<mpsc::Receiver<FetchJob>>,
    results: &mpsc::Sender<FetchOutcome>,
) {
    loop {
        let job = {
            let Ok(rx) = jobs.lock() else {
                break;
            };
            rx.recv()
        };
        let Ok(job) = job else {
            break;
        };

        let started = Instant::now();
        let result = load_geometry(source, &job.key);
        log::debug!(
            "fetch for {} finished in {:.1} ms",
            job.key,
            started.elapsed().as_secs_f64() * 1000.0
        );
        if results
            .send(FetchOutcome {
                key: job.key,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}

/// Fetch, validate and decode one sub-assembly: the metadata envelope, then
/// every named mesh.
///
/// # Errors
///
/// Propagates the first transport, metadata or mesh failure.
pub fn load_geometry(
    source: &dyn GeometrySource,
    key: &GeometryRequestKey,
) -> Result<CachedGeometry, GeometryError> {
    let body = source.fetch_metadata(key)?;
    let info = ModelInfo::parse(&body)?;
    let materials = info.material_tags();

    let meshes = info
        .models
        .iter()
        .map(|model| {
            let bytes = source.fetch_mesh(&info.id, model)?;
            MeshGeometry::from_stl(model, &bytes)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CachedGeometry {
        key: key.clone(),
        model_id: info.id,
        meshes,
        materials,
        bounds: info.bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::testing::{GatedSource, ScriptedSource};
    use crate::geometry::{GeometryErrorKind, SubAssemblyKind};

    const WAIT: Duration = Duration::from_secs(5);

    fn options(workers: usize, capacity: usize) -> ServiceOptions {
        ServiceOptions {
            workers,
            cache_capacity: capacity,
            ..ServiceOptions::default()
        }
    }

    fn frame_key(servers: f64) -> GeometryRequestKey {
        GeometryRequestKey::new(SubAssemblyKind::Frame, &[("servers", servers)])
    }

    fn wait_all<T: Clone>(
        cache: &mut GeometryFetchCache<T>,
        expected: usize,
    ) -> Vec<FetchCompletion<T>> {
        let deadline = Instant::now() + WAIT;
        let mut done = Vec::new();
        while done.len() < expected && Instant::now() < deadline {
            done.extend(cache.wait(Duration::from_millis(50)));
        }
        done
    }

    #[test]
    fn miss_then_hit_issues_one_request() {
        let source = Arc::new(ScriptedSource::new());
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source.clone(), &options(2, 8)).unwrap();
        let key = frame_key(3.0);

        assert!(matches!(cache.request(&key, 1), FetchStatus::Pending));
        let done = wait_all(&mut cache, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, 1);
        let geometry = done[0].result.as_ref().unwrap();
        assert_eq!(geometry.meshes.len(), 2);
        assert_eq!(geometry.materials, vec![MaterialTag::Metal, MaterialTag::Plastic]);

        assert!(matches!(cache.request(&key, 2), FetchStatus::Ready(_)));
        let stats = cache.stats();
        assert_eq!(stats.network_requests, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(source.metadata_calls(), 1);
    }

    #[test]
    fn concurrent_requests_for_one_key_coalesce() {
        let source = Arc::new(GatedSource::new());
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source.clone(), &options(4, 8)).unwrap();
        let key = frame_key(5.0);

        assert!(matches!(cache.request(&key, 1), FetchStatus::Pending));
        assert!(matches!(cache.request(&key, 2), FetchStatus::Pending));
        assert!(matches!(cache.request(&key, 3), FetchStatus::Pending));
        assert_eq!(cache.in_flight_count(), 1);

        source.release(&key);
        let mut done = wait_all(&mut cache, 3);
        done.sort_by_key(|c| c.ticket);
        assert_eq!(
            done.iter().map(|c| c.ticket).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(done.iter().all(|c| c.result.is_ok()));
        assert_eq!(cache.stats().network_requests, 1);
        assert_eq!(cache.stats().coalesced, 2);
        assert_eq!(source.metadata_calls(), 1);
    }

    #[test]
    fn failures_are_delivered_but_not_cached() {
        let source = Arc::new(ScriptedSource::new());
        let key = frame_key(7.0);
        source.fail_metadata(&key, GeometryError::transport(key.path(), "refused"));
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source.clone(), &options(1, 8)).unwrap();

        assert!(matches!(cache.request(&key, 1), FetchStatus::Pending));
        let done = wait_all(&mut cache, 1);
        let err = done[0].result.as_ref().unwrap_err();
        assert_eq!(err.kind(), GeometryErrorKind::Transport);
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().failures, 1);

        // Same key goes back to the network.
        assert!(matches!(cache.request(&key, 2), FetchStatus::Pending));
        let _ = wait_all(&mut cache, 1);
        assert_eq!(source.metadata_calls(), 2);
    }

    #[test]
    fn corrupt_mesh_is_a_mesh_parse_error() {
        let source = Arc::new(ScriptedSource::new());
        source.corrupt_meshes();
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source, &options(1, 8)).unwrap();
        let key = frame_key(2.0);

        let _ = cache.request(&key, 1);
        let done = wait_all(&mut cache, 1);
        assert_eq!(
            done[0].result.as_ref().unwrap_err().kind(),
            GeometryErrorKind::MeshParse
        );
    }

    #[test]
    fn lru_bound_evicts_least_recently_used() {
        let source = Arc::new(ScriptedSource::new());
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source, &options(1, 2)).unwrap();
        let (a, b, c) = (frame_key(1.0), frame_key(2.0), frame_key(3.0));

        let _ = cache.request(&a, 0);
        let _ = wait_all(&mut cache, 1);
        let _ = cache.request(&b, 0);
        let _ = wait_all(&mut cache, 1);
        // Touch `a` so `b` becomes the oldest.
        assert!(matches!(cache.request(&a, 0), FetchStatus::Ready(_)));
        let _ = cache.request(&c, 0);
        let _ = wait_all(&mut cache, 1);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn wait_without_jobs_returns_immediately() {
        let source = Arc::new(ScriptedSource::new());
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source, &options(1, 2)).unwrap();
        let started = Instant::now();
        assert!(cache.wait(Duration::from_secs(10)).is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn request_after_shutdown_fails() {
        let source = Arc::new(ScriptedSource::new());
        let mut cache: GeometryFetchCache<u32> =
            GeometryFetchCache::new(source, &options(1, 2)).unwrap();
        cache.shutdown();
        assert!(matches!(
            cache.request(&frame_key(1.0), 0),
            FetchStatus::Failed(_)
        ));
    }
}
