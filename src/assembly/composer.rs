//! Per-rack composition of independently fetched sub-assemblies.
//!
//! Each rack owns one [`SubAssemblySlot`] per [`SubAssemblyKind`]. A slot
//! remembers the key it last asked for and a generation token that is
//! replaced whenever that key changes. Tokens come from one counter owned
//! by the composer, so a token is never issued twice, even when a rack id is
//! removed and later comes back. Fetch tickets carry the token they were
//! issued under, and a completion is applied only if both its token and its
//! key are still the slot's latest. Superseded fetches still land in the
//! shared cache but never overwrite newer state.

use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use super::material::{classify_all, preset};
use super::params::{
    local_offset, model_rotation, placeholder_extent, request_key,
    MODEL_UNIT_SCALE,
};
use crate::error::RackroomError;
use crate::geometry::{
    CachedGeometry, FetchCompletion, FetchStats, FetchStatus, GeometryError,
    GeometryFetchCache, GeometryRequestKey, GeometrySource, MaterialTag,
    SubAssemblyKind,
};
use crate::options::{LayoutOptions, MaterialOptions, MaterialPreset, Options};
use crate::scene::{RackEntity, RackId, SceneRegistry};

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Load progress of one sub-assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Never requested.
    #[default]
    Idle,
    /// Fetch in flight.
    Loading,
    /// Geometry available.
    Ready,
    /// Latest fetch failed.
    Error,
}

/// Addresses one fetch result back to the slot that asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotTicket {
    /// Rack the fetch belongs to.
    pub rack: RackId,
    /// Sub-assembly within the rack.
    pub kind: SubAssemblyKind,
    /// Generation token issued for the request.
    pub generation: u64,
}

/// State of one sub-assembly of one rack.
#[derive(Clone, Debug)]
pub struct SubAssemblySlot {
    kind: SubAssemblyKind,
    key: Option<GeometryRequestKey>,
    generation: u64,
    state: LoadState,
    geometry: Option<Arc<CachedGeometry>>,
    materials: Vec<MaterialTag>,
    error: Option<GeometryError>,
}

impl SubAssemblySlot {
    fn new(kind: SubAssemblyKind) -> Self {
        Self {
            kind,
            key: None,
            generation: 0,
            state: LoadState::Idle,
            geometry: None,
            materials: Vec::new(),
            error: None,
        }
    }

    /// Which part this slot holds.
    #[must_use]
    pub fn kind(&self) -> SubAssemblyKind {
        self.kind
    }

    /// Key of the latest request.
    #[must_use]
    pub fn key(&self) -> Option<&GeometryRequestKey> {
        self.key.as_ref()
    }

    /// Token of the latest request (0 before the first request). Tokens
    /// increase across the whole composer, not per slot.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current load state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Geometry of the latest generation, once ready.
    #[must_use]
    pub fn geometry(&self) -> Option<&Arc<CachedGeometry>> {
        self.geometry.as_ref()
    }

    /// Final material class per mesh, parallel to the geometry's meshes.
    #[must_use]
    pub fn materials(&self) -> &[MaterialTag] {
        &self.materials
    }

    /// Failure of the latest generation, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&GeometryError> {
        self.error.as_ref()
    }

    fn settle(&mut self, geometry: Arc<CachedGeometry>) {
        self.materials = classify_all(self.kind, &geometry.materials);
        self.geometry = Some(geometry);
        self.error = None;
        self.state = LoadState::Ready;
    }

    fn fail(&mut self, error: GeometryError) {
        self.geometry = None;
        self.materials.clear();
        self.error = Some(error);
        self.state = LoadState::Error;
    }
}

/// All sub-assembly slots of one rack.
#[derive(Clone, Debug)]
pub struct RackAssembly {
    rack_id: RackId,
    slots: [SubAssemblySlot; 4],
}

impl RackAssembly {
    fn new(rack_id: RackId) -> Self {
        Self {
            rack_id,
            slots: SubAssemblyKind::ALL.map(SubAssemblySlot::new),
        }
    }

    /// Rack this assembly belongs to.
    #[must_use]
    pub fn rack_id(&self) -> &RackId {
        &self.rack_id
    }

    /// Slot for `kind`.
    #[must_use]
    pub fn slot(&self, kind: SubAssemblyKind) -> &SubAssemblySlot {
        &self.slots[kind.index()]
    }

    fn slot_mut(&mut self, kind: SubAssemblyKind) -> &mut SubAssemblySlot {
        &mut self.slots[kind.index()]
    }

    /// Slots in composition order.
    #[must_use]
    pub fn slots(&self) -> &[SubAssemblySlot] {
        &self.slots
    }

    /// Whether every slot is ready or failed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slots
            .iter()
            .all(|s| matches!(s.state, LoadState::Ready | LoadState::Error))
    }
}

// ---------------------------------------------------------------------------
// Composite output
// ---------------------------------------------------------------------------

/// Why a part is shown as a bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderTag {
    /// Not fetched yet, or fetch in flight.
    Loading,
    /// Latest fetch failed.
    Error,
}

/// What to draw for one part.
#[derive(Clone, Debug)]
pub enum PartContent {
    /// Fetched meshes with their final material classes.
    Geometry {
        /// Shared cached geometry.
        geometry: Arc<CachedGeometry>,
        /// Material class per mesh.
        materials: Vec<MaterialTag>,
        /// Render preset per mesh, resolved from `materials`.
        presets: Vec<MaterialPreset>,
    },
    /// A box of the part's extent, centered on its offset.
    Placeholder(PlaceholderTag),
}

/// One placed part of a rack composite.
#[derive(Clone, Debug)]
pub struct CompositePart {
    /// Which part.
    pub kind: SubAssemblyKind,
    /// Center relative to the rack anchor (metres).
    pub offset: Vec3,
    /// Parameter-derived bounding extent (metres).
    pub extent: Vec3,
    /// Model-space (mm) to world transform for fetched meshes.
    pub transform: Mat4,
    /// Meshes or placeholder.
    pub content: PartContent,
}

impl CompositePart {
    /// Whether fetched geometry is shown.
    #[must_use]
    pub fn is_geometry(&self) -> bool {
        matches!(self.content, PartContent::Geometry { .. })
    }

    /// Placeholder reason, if this part is a placeholder.
    #[must_use]
    pub fn placeholder(&self) -> Option<PlaceholderTag> {
        match self.content {
            PartContent::Placeholder(tag) => Some(tag),
            PartContent::Geometry { .. } => None,
        }
    }
}

/// Everything needed to draw one rack.
#[derive(Clone, Debug)]
pub struct RackComposite {
    /// Rack id.
    pub rack_id: RackId,
    /// World-space anchor.
    pub anchor: Vec3,
    /// Selection flag at compose time.
    pub selected: bool,
    /// Hover flag at compose time.
    pub highlighted: bool,
    /// Parts in composition order.
    pub parts: Vec<CompositePart>,
}

impl RackComposite {
    /// Part for `kind`.
    #[must_use]
    pub fn part(&self, kind: SubAssemblyKind) -> Option<&CompositePart> {
        self.parts.iter().find(|p| p.kind == kind)
    }

    /// Whether every part shows fetched geometry.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.parts.iter().all(CompositePart::is_geometry)
    }
}

/// Counts from one [`AssemblyComposer::pump`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Results applied to their slot.
    pub applied: usize,
    /// Results for superseded generations or removed racks.
    pub discarded: usize,
    /// Failures applied to their slot.
    pub failed: usize,
}

impl PumpReport {
    /// Whether nothing was delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied + self.discarded + self.failed == 0
    }

    /// Accumulate another report.
    pub fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.discarded += other.discarded;
        self.failed += other.failed;
    }
}

// ---------------------------------------------------------------------------
// AssemblyComposer
// ---------------------------------------------------------------------------

/// Keeps one [`RackAssembly`] per rack in sync with rack parameters.
pub struct AssemblyComposer {
    cache: GeometryFetchCache<SlotTicket>,
    assemblies: FxHashMap<RackId, RackAssembly>,
    /// Last generation token handed out.
    last_generation: u64,
    layout: LayoutOptions,
    materials: MaterialOptions,
}

impl AssemblyComposer {
    /// Create a composer fetching from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RackroomError::ThreadSpawn`] if the fetch pool fails to
    /// start.
    pub fn new(
        source: Arc<dyn GeometrySource>,
        options: &Options,
    ) -> Result<Self, RackroomError> {
        Ok(Self {
            cache: GeometryFetchCache::new(source, &options.service)?,
            assemblies: FxHashMap::default(),
            last_generation: 0,
            layout: options.layout.clone(),
            materials: options.materials.clone(),
        })
    }

    /// Bring `rack`'s slots up to date with its parameters.
    ///
    /// Slots whose key is unchanged are left alone, so re-syncing an
    /// unchanged rack issues no fetch. Returns the number of slots that
    /// started a new generation.
    pub fn sync_rack(&mut self, rack: &RackEntity) -> usize {
        let assembly = self
            .assemblies
            .entry(rack.id.clone())
            .or_insert_with(|| RackAssembly::new(rack.id.clone()));

        let mut started = 0;
        for kind in SubAssemblyKind::ALL {
            let key = request_key(kind, rack);
            let slot = assembly.slot_mut(kind);
            if slot.key.as_ref() == Some(&key) {
                continue;
            }

            self.last_generation += 1;
            slot.generation = self.last_generation;
            slot.key = Some(key.clone());
            slot.geometry = None;
            slot.materials.clear();
            slot.error = None;
            slot.state = LoadState::Loading;
            started += 1;

            let ticket = SlotTicket {
                rack: rack.id.clone(),
                kind,
                generation: slot.generation,
            };
            match self.cache.request(&key, ticket) {
                FetchStatus::Ready(geometry) => slot.settle(geometry),
                FetchStatus::Pending => {}
                FetchStatus::Failed(e) => {
                    log::error!("rack {} {kind}: {e}", rack.id);
                    slot.fail(e);
                }
            }
            log::debug!(
                "rack {} {kind} -> generation {} ({key})",
                rack.id,
                slot.generation
            );
        }
        started
    }

    /// Sync every rack in `registry` and drop assemblies of removed racks.
    pub fn sync_registry(&mut self, registry: &SceneRegistry) -> usize {
        let before = self.assemblies.len();
        self.assemblies.retain(|id, _| registry.contains(id));
        let dropped = before - self.assemblies.len();
        if dropped > 0 {
            log::debug!("dropped {dropped} assemblies of removed racks");
        }
        registry
            .entities()
            .iter()
            .map(|rack| self.sync_rack(rack))
            .sum()
    }

    /// Drop the assembly of a removed rack. Late results for it are
    /// discarded.
    pub fn remove_rack(&mut self, id: &RackId) -> bool {
        self.assemblies.remove(id).is_some()
    }

    /// Apply every finished fetch without blocking.
    pub fn pump(&mut self) -> PumpReport {
        let completions = self.cache.poll();
        self.apply_all(completions)
    }

    /// Block up to `timeout` for at least one finished fetch, then apply
    /// everything available.
    pub fn wait(&mut self, timeout: Duration) -> PumpReport {
        let completions = self.cache.wait(timeout);
        self.apply_all(completions)
    }

    fn apply_all(
        &mut self,
        completions: Vec<FetchCompletion<SlotTicket>>,
    ) -> PumpReport {
        let mut report = PumpReport::default();
        for completion in completions {
            self.apply(completion, &mut report);
        }
        report
    }

    fn apply(
        &mut self,
        completion: FetchCompletion<SlotTicket>,
        report: &mut PumpReport,
    ) {
        let FetchCompletion {
            ticket,
            key,
            result,
        } = completion;
        let Some(assembly) = self.assemblies.get_mut(&ticket.rack) else {
            log::debug!("discarding {key} for removed rack {}", ticket.rack);
            report.discarded += 1;
            return;
        };
        let slot = assembly.slot_mut(ticket.kind);
        if slot.generation != ticket.generation
            || slot.key.as_ref() != Some(&key)
        {
            log::debug!(
                "discarding stale {key} for rack {} (generation {}, latest {})",
                ticket.rack,
                ticket.generation,
                slot.generation
            );
            report.discarded += 1;
            return;
        }

        match result {
            Ok(geometry) => {
                slot.settle(geometry);
                report.applied += 1;
            }
            Err(e) => {
                log::error!("rack {} {}: {e}", ticket.rack, ticket.kind);
                slot.fail(e);
                report.failed += 1;
            }
        }
    }

    /// Assembly state of one rack.
    #[must_use]
    pub fn assembly(&self, id: &RackId) -> Option<&RackAssembly> {
        self.assemblies.get(id)
    }

    /// Number of tracked racks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    /// Whether no rack is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    /// Whether every slot of every rack is ready or failed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.assemblies.values().all(RackAssembly::is_settled)
    }

    /// Fetch counters of the shared cache.
    #[must_use]
    pub fn stats(&self) -> FetchStats {
        self.cache.stats()
    }

    /// Place `rack`'s parts around its anchor. `None` until the rack has
    /// been synced.
    #[must_use]
    pub fn compose(&self, rack: &RackEntity) -> Option<RackComposite> {
        let assembly = self.assemblies.get(&rack.id)?;
        let parts = assembly
            .slots
            .iter()
            .map(|slot| self.compose_part(slot, rack))
            .collect();
        Some(RackComposite {
            rack_id: rack.id.clone(),
            anchor: rack.location,
            selected: rack.selected,
            highlighted: rack.highlighted,
            parts,
        })
    }

    /// Composites of every synced rack in `registry`, in registry order.
    #[must_use]
    pub fn compose_all(&self, registry: &SceneRegistry) -> Vec<RackComposite> {
        registry
            .entities()
            .iter()
            .filter_map(|rack| self.compose(rack))
            .collect()
    }

    fn compose_part(
        &self,
        slot: &SubAssemblySlot,
        rack: &RackEntity,
    ) -> CompositePart {
        let offset = local_offset(slot.kind, rack, &self.layout);
        let extent = placeholder_extent(slot.kind, rack, &self.layout);
        let center = rack.location + offset;

        let (transform, content) = match (&slot.state, &slot.geometry) {
            (LoadState::Ready, Some(geometry)) => {
                // Recenter on the reported model center before orienting.
                let model_center = Vec3::from_array(geometry.bounds.center);
                let transform = Mat4::from_scale_rotation_translation(
                    Vec3::splat(MODEL_UNIT_SCALE),
                    model_rotation(),
                    center,
                ) * Mat4::from_translation(-model_center);
                let presets = slot
                    .materials
                    .iter()
                    .map(|&tag| *preset(&self.materials, tag))
                    .collect();
                let content = PartContent::Geometry {
                    geometry: Arc::clone(geometry),
                    materials: slot.materials.clone(),
                    presets,
                };
                (transform, content)
            }
            (LoadState::Error, _) => (
                Mat4::from_translation(center),
                PartContent::Placeholder(PlaceholderTag::Error),
            ),
            _ => (
                Mat4::from_translation(center),
                PartContent::Placeholder(PlaceholderTag::Loading),
            ),
        };

        CompositePart {
            kind: slot.kind,
            offset,
            extent,
            transform,
            content,
        }
    }
}
