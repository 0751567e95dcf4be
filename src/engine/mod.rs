//! The rack room engine: one registry, one composer and the handle binding
//! of the selected rack, advanced one frame at a time.
//!
//! All state lives on the calling thread. Geometry fetches run on the
//! composer's worker pool and are applied during [`RackRoomEngine::frame`].

mod command;

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

pub use command::{CommandOutcome, RackCommand};
use web_time::Instant;

use crate::assembly::{AssemblyComposer, PumpReport, RackComposite};
use crate::error::RackroomError;
use crate::geometry::{FetchStats, GeometrySource};
use crate::options::Options;
use crate::scene::{SceneAggregates, SceneError, SceneRegistry};
use crate::transform::{OrbitGate, SyncOutcome, TransformBinding, TransformHandle};

/// What one [`RackRoomEngine::frame`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Sub-assembly slots that started a new fetch generation.
    pub started: usize,
    /// Fetch results applied or discarded.
    pub pump: PumpReport,
    /// Whether the handle was moved to follow a programmatic change.
    pub handle_refreshed: bool,
    /// Handle events applied since the previous frame.
    pub outcomes: Vec<SyncOutcome>,
}

/// Owns the scene and drives composition and handle sync.
pub struct RackRoomEngine {
    registry: Rc<RefCell<SceneRegistry>>,
    composer: AssemblyComposer,
    gate: OrbitGate,
    binding: Option<TransformBinding>,
    options: Options,
    /// Registry generation the composer was last synced to.
    synced_generation: Option<u64>,
    frames: u64,
}

impl RackRoomEngine {
    /// Create an engine with an empty scene.
    ///
    /// # Errors
    ///
    /// Returns [`RackroomError::ThreadSpawn`] if the fetch pool fails to
    /// start.
    pub fn new(
        options: Options,
        source: Arc<dyn GeometrySource>,
    ) -> Result<Self, RackroomError> {
        let registry = SceneRegistry::new(&options.layout);
        Self::with_registry(options, source, registry)
    }

    /// Create an engine around an existing registry.
    ///
    /// # Errors
    ///
    /// Returns [`RackroomError::ThreadSpawn`] if the fetch pool fails to
    /// start.
    pub fn with_registry(
        options: Options,
        source: Arc<dyn GeometrySource>,
        registry: SceneRegistry,
    ) -> Result<Self, RackroomError> {
        let composer = AssemblyComposer::new(source, &options)?;
        let mut engine = Self {
            registry: Rc::new(RefCell::new(registry)),
            composer,
            gate: OrbitGate::new(),
            binding: None,
            options,
            synced_generation: None,
            frames: 0,
        };
        let _ = engine.sync_composer();
        engine.sync_binding();
        Ok(engine)
    }

    /// Execute a command against the rack list.
    ///
    /// Fetches for changed racks start immediately; results arrive on
    /// later frames.
    ///
    /// # Errors
    ///
    /// Returns [`RackroomError::Scene`] when the registry rejects the
    /// command. Nothing changes in that case.
    pub fn execute(
        &mut self,
        command: RackCommand,
    ) -> Result<CommandOutcome, RackroomError> {
        let outcome = {
            let mut registry = self.registry.borrow_mut();
            match command {
                RackCommand::AddRack { params } => {
                    CommandOutcome::Added(registry.add(params)?)
                }
                RackCommand::UpdateRack { id, patch } => {
                    CommandOutcome::Updated(registry.update(&id, patch)?)
                }
                RackCommand::RemoveRack { id } => CommandOutcome::Removed(
                    registry
                        .remove(&id)
                        .ok_or(SceneError::UnknownRack(id))?,
                ),
                RackCommand::ImportRacks { racks } => {
                    let count = racks.len();
                    registry.replace_all(racks)?;
                    CommandOutcome::Imported(count)
                }
                RackCommand::Select { id } => {
                    registry.set_selected(Some(&id))?;
                    CommandOutcome::SelectionChanged
                }
                RackCommand::ClearSelection => {
                    registry.set_selected(None)?;
                    CommandOutcome::SelectionChanged
                }
                RackCommand::Highlight { id, highlighted } => {
                    let _ = registry.set_highlighted(&id, highlighted)?;
                    CommandOutcome::SelectionChanged
                }
            }
        };
        let _ = self.sync_composer();
        self.sync_binding();
        Ok(outcome)
    }

    /// Advance one frame: sync the composer to the registry, apply
    /// finished fetches, keep the handle binding on the selected rack and
    /// collect handle outcomes.
    pub fn frame(&mut self) -> FrameReport {
        self.frames += 1;
        let started = self.sync_composer();
        let pump = self.composer.pump();
        self.sync_binding();
        let (handle_refreshed, outcomes) =
            self.binding.as_mut().map_or((false, Vec::new()), |b| {
                (b.refresh_from_model(), b.take_outcomes())
            });
        FrameReport {
            started,
            pump,
            handle_refreshed,
            outcomes,
        }
    }

    /// Run frames until every sub-assembly is ready or failed, blocking on
    /// fetch results in between. Returns whether the scene settled before
    /// `timeout`.
    pub fn run_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let _ = self.frame();
            if self.composer.is_settled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let report = self
                .composer
                .wait((deadline - now).min(Duration::from_millis(100)));
            if !report.is_empty() {
                log::debug!(
                    "applied {} / discarded {} / failed {} fetches",
                    report.applied,
                    report.discarded,
                    report.failed
                );
            }
        }
    }

    fn sync_composer(&mut self) -> usize {
        let registry = self.registry.borrow();
        if self.synced_generation == Some(registry.generation()) {
            return 0;
        }
        self.synced_generation = Some(registry.generation());
        self.composer.sync_registry(&registry)
    }

    /// Keep exactly one binding, on the selected rack.
    fn sync_binding(&mut self) {
        let selected = self.registry.borrow().selected_id().cloned();
        let current = self.binding.as_ref().map(TransformBinding::rack_id);
        if current == selected.as_ref() {
            return;
        }
        self.binding = None;
        if let Some(id) = selected {
            self.binding = TransformBinding::attach(
                &id,
                &self.registry,
                &self.gate,
                &self.options,
            );
        }
    }

    // -- Queries --

    /// Read access to the registry.
    ///
    /// Do not hold the guard while driving the handle; handle commits
    /// need to borrow the registry mutably.
    #[must_use]
    pub fn registry(&self) -> Ref<'_, SceneRegistry> {
        self.registry.borrow()
    }

    /// Current totals.
    #[must_use]
    pub fn aggregates(&self) -> SceneAggregates {
        self.registry.borrow().aggregates()
    }

    /// Renderable composites of every rack, in registry order.
    #[must_use]
    pub fn composites(&self) -> Vec<RackComposite> {
        self.composer.compose_all(&self.registry.borrow())
    }

    /// The composer.
    #[must_use]
    pub fn composer(&self) -> &AssemblyComposer {
        &self.composer
    }

    /// Handle of the selected rack, if any.
    pub fn handle_mut(&mut self) -> Option<&mut TransformHandle> {
        self.binding.as_mut().map(TransformBinding::handle_mut)
    }

    /// Whether camera orbit navigation is allowed right now.
    #[must_use]
    pub fn orbit_enabled(&self) -> bool {
        self.gate.orbit_enabled()
    }

    /// Fetch counters.
    #[must_use]
    pub fn stats(&self) -> FetchStats {
        self.composer.stats()
    }

    /// Whether every sub-assembly is ready or failed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.composer.is_settled()
    }

    /// Frames advanced so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Options the engine was built with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The rack list in JSON exchange form.
    ///
    /// # Errors
    ///
    /// [`RackroomError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, RackroomError> {
        self.registry.borrow().to_json()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::geometry::testing::ScriptedSource;
    use crate::geometry::SubAssemblyKind;
    use crate::scene::{RackId, RackParams, RackPatch};

    const SETTLE: Duration = Duration::from_secs(5);

    fn new_engine() -> (RackRoomEngine, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new());
        let engine =
            RackRoomEngine::new(Options::default(), source.clone()).unwrap();
        (engine, source)
    }

    fn add(engine: &mut RackRoomEngine) -> RackId {
        match engine
            .execute(RackCommand::AddRack {
                params: RackParams::default(),
            })
            .unwrap()
        {
            CommandOutcome::Added(rack) => rack.id,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn added_racks_compose_once_fetched() {
        let (mut engine, _) = new_engine();
        let a = add(&mut engine);
        let _ = add(&mut engine);
        assert!(engine.run_until_settled(SETTLE));

        let composites = engine.composites();
        assert_eq!(composites.len(), 2);
        assert!(composites.iter().all(RackComposite::is_complete));
        assert_eq!(composites[0].rack_id, a);
        assert_eq!(engine.aggregates().total_servers, 6);
        // Two identical racks share every fetch.
        assert_eq!(engine.stats().network_requests, 4);
    }

    #[test]
    fn idle_frames_issue_no_fetches() {
        let (mut engine, source) = new_engine();
        let _ = add(&mut engine);
        assert!(engine.run_until_settled(SETTLE));
        let calls = source.metadata_calls();

        for _ in 0..5 {
            let report = engine.frame();
            assert_eq!(report.started, 0);
        }
        assert_eq!(source.metadata_calls(), calls);
    }

    #[test]
    fn selection_attaches_the_handle_and_drags_commit() {
        let (mut engine, _) = new_engine();
        let a = add(&mut engine);
        assert!(engine.handle_mut().is_none());

        let _ = engine.execute(RackCommand::Select { id: a.clone() }).unwrap();
        let handle = engine.handle_mut().unwrap();
        handle.begin_drag();
        let _ = handle.drag_to(Vec3::new(3.1, 0.0, 0.0));
        assert!(!engine.orbit_enabled());
        engine.handle_mut().unwrap().end_drag();
        assert!(engine.orbit_enabled());

        let report = engine.frame();
        assert_eq!(
            report.outcomes,
            vec![
                SyncOutcome::DragStarted,
                SyncOutcome::Committed(Vec3::new(3.0, 0.0, 0.0)),
                SyncOutcome::DragEnded,
            ]
        );
        assert_eq!(
            engine.registry().entity(&a).unwrap().location,
            Vec3::new(3.0, 0.0, 0.0)
        );

        let _ = engine.execute(RackCommand::ClearSelection).unwrap();
        assert!(engine.handle_mut().is_none());
    }

    #[test]
    fn drags_snap_to_the_configured_slot_width() {
        let mut options = Options::default();
        options.layout.slot_width = 2.0;
        let mut engine =
            RackRoomEngine::new(options, Arc::new(ScriptedSource::new())).unwrap();
        let a = add(&mut engine);
        let _ = engine.execute(RackCommand::Select { id: a.clone() }).unwrap();

        let handle = engine.handle_mut().unwrap();
        handle.begin_drag();
        assert_eq!(handle.drag_to(Vec3::new(3.1, 0.0, 0.0)), Vec3::new(4.0, 0.0, 0.0));
        handle.end_drag();
        let _ = engine.frame();
        assert_eq!(
            engine.registry().entity(&a).unwrap().location,
            Vec3::new(4.0, 0.0, 0.0)
        );
    }

    #[test]
    fn programmatic_move_follows_into_the_handle() {
        let (mut engine, _) = new_engine();
        let a = add(&mut engine);
        let _ = engine.execute(RackCommand::Select { id: a.clone() }).unwrap();
        let _ = engine
            .execute(RackCommand::UpdateRack {
                id: a,
                patch: RackPatch::location(Vec3::new(0.0, 0.0, 4.5)),
            })
            .unwrap();

        let report = engine.frame();
        assert!(report.handle_refreshed);
        assert!(report.outcomes.is_empty());
        assert_eq!(
            engine.handle_mut().unwrap().position(),
            Vec3::new(0.0, 0.0, 4.5)
        );
    }

    #[test]
    fn server_change_refetches_and_removal_drops_assembly() {
        let (mut engine, _) = new_engine();
        let a = add(&mut engine);
        assert!(engine.run_until_settled(SETTLE));
        let frame_generation = |engine: &RackRoomEngine| {
            engine
                .composer()
                .assembly(&a)
                .unwrap()
                .slot(SubAssemblyKind::Frame)
                .generation()
        };
        let before = frame_generation(&engine);

        let _ = engine
            .execute(RackCommand::UpdateRack {
                id: a.clone(),
                patch: RackPatch::server_amount(8),
            })
            .unwrap();
        assert!(frame_generation(&engine) > before);
        assert!(engine.run_until_settled(SETTLE));

        let _ = engine.execute(RackCommand::RemoveRack { id: a.clone() }).unwrap();
        assert!(engine.composer().assembly(&a).is_none());
        assert!(engine.composites().is_empty());
    }

    #[test]
    fn rejected_commands_leave_the_scene_alone() {
        let (mut engine, _) = new_engine();
        let _ = add(&mut engine);
        let before = engine.registry().generation();
        let missing = RackId::from("missing");

        assert!(engine
            .execute(RackCommand::RemoveRack { id: missing.clone() })
            .is_err());
        assert!(engine.execute(RackCommand::Select { id: missing }).is_err());
        assert_eq!(engine.registry().generation(), before);
    }

    #[test]
    fn import_replaces_the_list() {
        let (mut engine, _) = new_engine();
        let _ = add(&mut engine);
        let json = engine.to_json().unwrap();
        let racks: Vec<crate::scene::RackEntity> =
            serde_json::from_str(&json).unwrap();

        let (mut other, _) = new_engine();
        let outcome = other
            .execute(RackCommand::ImportRacks { racks: racks.clone() })
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Imported(1));
        assert_eq!(other.registry().entities(), racks.as_slice());
        assert!(other.run_until_settled(SETTLE));
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let cmd: RackCommand = serde_json::from_str(
            r#"{"type": "update_rack", "id": "abc", "patch": {"serverWattage": 900}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            RackCommand::UpdateRack {
                id: RackId::from("abc"),
                patch: RackPatch {
                    server_wattage: Some(900.0),
                    ..RackPatch::default()
                },
            }
        );
    }
}
