//! Handle ↔ registry synchronization for one rack.
//!
//! [`TransformSyncController`] turns handle events into registry writes.
//! [`TransformBinding`] wires a [`TransformHandle`] to a controller and to
//! the shared registry, and pushes programmatic moves back into the handle.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use super::handle::{HandleEvent, Subscription, TransformHandle};
use super::orbit::OrbitGate;
use crate::options::Options;
use crate::scene::{RackId, SceneRegistry};

/// Verdict of the change-event guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Write the position.
    Commit,
    /// Position equals the committed location.
    Unchanged,
    /// Spurious origin report.
    FilteredOrigin,
}

/// Decide whether a reported handle `position` should be written over the
/// rack's `committed` location.
///
/// Handles report the origin once when they (re)attach. That report is
/// dropped unless the rack really sits at the origin. This is a workaround:
/// a deliberate drag to the origin of a rack placed elsewhere is dropped
/// too.
#[must_use]
pub fn guard(position: Vec3, committed: Vec3) -> GuardDecision {
    if position == committed {
        GuardDecision::Unchanged
    } else if position == Vec3::ZERO {
        GuardDecision::FilteredOrigin
    } else {
        GuardDecision::Commit
    }
}

/// What one handle event did.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// Location written.
    Committed(Vec3),
    /// Position already committed; no write.
    Unchanged,
    /// Spurious origin report; no write.
    FilteredOrigin,
    /// The registry refused the position.
    Rejected,
    /// The bound rack no longer exists.
    RackMissing,
    /// This handle now holds the orbit gate.
    DragStarted,
    /// Another handle is dragging; this drag is ignored until it ends.
    DragRejected,
    /// Drag finished and the orbit gate was released.
    DragEnded,
    /// The registry was borrowed elsewhere; event dropped.
    RegistryBusy,
    /// Nothing to do for this event.
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragState {
    Idle,
    Active,
    Rejected,
}

/// Applies one rack's handle events to the registry.
#[derive(Debug)]
pub struct TransformSyncController {
    rack_id: RackId,
    gate: OrbitGate,
    drag: DragState,
}

impl TransformSyncController {
    /// Controller for `rack_id` sharing `gate` with every other handle.
    #[must_use]
    pub fn new(rack_id: RackId, gate: OrbitGate) -> Self {
        Self {
            rack_id,
            gate,
            drag: DragState::Idle,
        }
    }

    /// Rack this controller writes to.
    #[must_use]
    pub fn rack_id(&self) -> &RackId {
        &self.rack_id
    }

    /// Whether this controller's drag holds the orbit gate.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag == DragState::Active
    }

    /// Apply one handle event. Commits happen synchronously.
    pub fn handle_event(
        &mut self,
        event: &HandleEvent,
        registry: &mut SceneRegistry,
    ) -> SyncOutcome {
        match *event {
            HandleEvent::DragStarted => {
                if self.gate.try_acquire(&self.rack_id) {
                    self.drag = DragState::Active;
                    SyncOutcome::DragStarted
                } else {
                    log::debug!(
                        "rack {}: drag refused, another handle is dragging",
                        self.rack_id
                    );
                    self.drag = DragState::Rejected;
                    SyncOutcome::DragRejected
                }
            }
            HandleEvent::DragEnded => {
                let was = std::mem::replace(&mut self.drag, DragState::Idle);
                if was == DragState::Active {
                    self.gate.release(&self.rack_id);
                    SyncOutcome::DragEnded
                } else {
                    SyncOutcome::Ignored
                }
            }
            HandleEvent::Changed { .. } if self.drag == DragState::Rejected => {
                SyncOutcome::DragRejected
            }
            HandleEvent::Changed { position } => self.commit(position, registry),
            HandleEvent::Rotated { .. } => SyncOutcome::Ignored,
        }
    }

    fn commit(&self, position: Vec3, registry: &mut SceneRegistry) -> SyncOutcome {
        let Some(rack) = registry.entity(&self.rack_id) else {
            return SyncOutcome::RackMissing;
        };
        match guard(position, rack.location) {
            GuardDecision::Unchanged => SyncOutcome::Unchanged,
            GuardDecision::FilteredOrigin => {
                log::debug!(
                    "rack {}: ignoring origin report from handle",
                    self.rack_id
                );
                SyncOutcome::FilteredOrigin
            }
            GuardDecision::Commit => {
                match registry.set_location(&self.rack_id, position) {
                    Ok(true) => SyncOutcome::Committed(position),
                    Ok(false) => SyncOutcome::Unchanged,
                    Err(e) => {
                        log::warn!("rack {}: {e}", self.rack_id);
                        SyncOutcome::Rejected
                    }
                }
            }
        }
    }
}

impl Drop for TransformSyncController {
    fn drop(&mut self) {
        if self.drag == DragState::Active {
            self.gate.release(&self.rack_id);
        }
    }
}

/// A handle bound to one rack in a shared registry.
pub struct TransformBinding {
    rack_id: RackId,
    handle: TransformHandle,
    registry: Rc<RefCell<SceneRegistry>>,
    outcomes: Rc<RefCell<Vec<SyncOutcome>>>,
    controller: Rc<RefCell<TransformSyncController>>,
    _subscription: Subscription,
}

impl TransformBinding {
    /// Bind a new handle to `rack_id`, placed at the rack's location.
    /// `None` if the rack does not exist.
    #[must_use]
    pub fn attach(
        rack_id: &RackId,
        registry: &Rc<RefCell<SceneRegistry>>,
        gate: &OrbitGate,
        options: &Options,
    ) -> Option<Self> {
        let location = registry.borrow().entity(rack_id)?.location;
        let handle = TransformHandle::new(
            location,
            options.handle.translation_step(&options.layout),
            options.handle.rotation_snap,
        );
        let controller = Rc::new(RefCell::new(TransformSyncController::new(
            rack_id.clone(),
            gate.clone(),
        )));
        let outcomes = Rc::new(RefCell::new(Vec::new()));

        let subscription = {
            let registry = Rc::clone(registry);
            let controller = Rc::clone(&controller);
            let outcomes = Rc::clone(&outcomes);
            handle.subscribe(move |event| {
                let outcome = match registry.try_borrow_mut() {
                    Ok(mut registry) => {
                        controller.borrow_mut().handle_event(event, &mut registry)
                    }
                    Err(_) => SyncOutcome::RegistryBusy,
                };
                outcomes.borrow_mut().push(outcome);
            })
        };
        log::debug!("handle attached to rack {rack_id}");

        Some(Self {
            rack_id: rack_id.clone(),
            handle,
            registry: Rc::clone(registry),
            outcomes,
            controller,
            _subscription: subscription,
        })
    }

    /// Bound rack.
    #[must_use]
    pub fn rack_id(&self) -> &RackId {
        &self.rack_id
    }

    /// The handle.
    #[must_use]
    pub fn handle(&self) -> &TransformHandle {
        &self.handle
    }

    /// The handle, for driving manipulation.
    pub fn handle_mut(&mut self) -> &mut TransformHandle {
        &mut self.handle
    }

    /// Whether this binding's drag holds the orbit gate.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.controller.borrow().is_dragging()
    }

    /// Outcomes recorded since the last call.
    pub fn take_outcomes(&self) -> Vec<SyncOutcome> {
        std::mem::take(&mut *self.outcomes.borrow_mut())
    }

    /// Push the rack's committed location into the handle without an
    /// event. Skipped while the handle is dragging. Returns whether the
    /// handle moved.
    pub fn refresh_from_model(&mut self) -> bool {
        let Some(location) = self
            .registry
            .borrow()
            .entity(&self.rack_id)
            .map(|r| r.location)
        else {
            return false;
        };
        if self.handle.position() == location {
            return false;
        }
        self.handle.set_position_silently(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LayoutOptions;
    use crate::scene::RackParams;

    struct Fixture {
        registry: Rc<RefCell<SceneRegistry>>,
        gate: OrbitGate,
        ids: Vec<RackId>,
    }

    /// Two racks at (0,0,0) and (1.5,0,0).
    fn fixture() -> Fixture {
        let mut registry = SceneRegistry::new(&LayoutOptions::default());
        let ids = (0..2)
            .map(|_| registry.add(RackParams::default()).unwrap().id)
            .collect();
        Fixture {
            registry: Rc::new(RefCell::new(registry)),
            gate: OrbitGate::new(),
            ids,
        }
    }

    impl Fixture {
        fn bind(&self, idx: usize) -> TransformBinding {
            TransformBinding::attach(
                &self.ids[idx],
                &self.registry,
                &self.gate,
                &Options::default(),
            )
            .unwrap()
        }

        fn writes(&self) -> u64 {
            self.registry.borrow().writes()
        }

        fn location(&self, idx: usize) -> Vec3 {
            self.registry.borrow().entity(&self.ids[idx]).unwrap().location
        }
    }

    #[test]
    fn guard_table() {
        let at = Vec3::new(1.5, 0.0, 0.0);
        assert_eq!(guard(at, at), GuardDecision::Unchanged);
        assert_eq!(guard(Vec3::ZERO, at), GuardDecision::FilteredOrigin);
        assert_eq!(guard(Vec3::ZERO, Vec3::ZERO), GuardDecision::Unchanged);
        assert_eq!(guard(at * 2.0, at), GuardDecision::Commit);
        assert_eq!(guard(at, Vec3::ZERO), GuardDecision::Commit);
    }

    #[test]
    fn drag_at_committed_location_writes_nothing() {
        let fx = fixture();
        let mut binding = fx.bind(1);
        let writes = fx.writes();

        let handle = binding.handle_mut();
        handle.begin_drag();
        let _ = handle.drag_to(Vec3::new(1.5, 0.0, 0.0));
        let _ = handle.drag_to(Vec3::new(1.6, 0.0, 0.1));
        handle.end_drag();

        assert_eq!(fx.writes(), writes);
        assert_eq!(
            binding.take_outcomes(),
            vec![
                SyncOutcome::DragStarted,
                SyncOutcome::Unchanged,
                SyncOutcome::Unchanged,
                SyncOutcome::DragEnded,
            ]
        );
    }

    #[test]
    fn origin_report_after_attach_is_filtered() {
        let fx = fixture();
        let binding = fx.bind(1);
        let writes = fx.writes();

        binding.handle().emit_raw(HandleEvent::Changed {
            position: Vec3::ZERO,
        });

        assert_eq!(fx.writes(), writes);
        assert_eq!(fx.location(1), Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(binding.take_outcomes(), vec![SyncOutcome::FilteredOrigin]);
    }

    #[test]
    fn qualifying_change_commits_synchronously() {
        let fx = fixture();
        let mut binding = fx.bind(0);
        let writes = fx.writes();

        let handle = binding.handle_mut();
        handle.begin_drag();
        let snapped = handle.drag_to(Vec3::new(4.4, 0.0, 1.4));
        assert_eq!(snapped, Vec3::new(4.5, 0.0, 1.5));
        assert_eq!(fx.location(0), snapped);
        assert_eq!(fx.writes(), writes + 1);

        // Dragging back to the origin is dropped by the workaround.
        let _ = binding.handle_mut().drag_to(Vec3::ZERO);
        assert_eq!(fx.location(0), snapped);
        binding.handle_mut().end_drag();
    }

    #[test]
    fn orbit_is_gated_and_second_drag_is_rejected() {
        let fx = fixture();
        let mut a = fx.bind(0);
        let mut b = fx.bind(1);

        a.handle_mut().begin_drag();
        assert!(!fx.gate.orbit_enabled());
        assert!(a.is_dragging());

        b.handle_mut().begin_drag();
        let _ = b.handle_mut().drag_to(Vec3::new(6.0, 0.0, 0.0));
        assert_eq!(fx.location(1), Vec3::new(1.5, 0.0, 0.0));
        b.handle_mut().end_drag();
        assert_eq!(
            b.take_outcomes(),
            vec![
                SyncOutcome::DragRejected,
                SyncOutcome::DragRejected,
                SyncOutcome::Ignored,
            ]
        );
        assert!(!fx.gate.orbit_enabled());

        a.handle_mut().end_drag();
        assert!(fx.gate.orbit_enabled());
    }

    #[test]
    fn dropping_a_dragging_binding_releases_the_gate() {
        let fx = fixture();
        let mut a = fx.bind(0);
        a.handle_mut().begin_drag();
        assert!(!fx.gate.orbit_enabled());
        drop(a);
        assert!(fx.gate.orbit_enabled());
    }

    #[test]
    fn programmatic_moves_reach_the_handle_silently() {
        let fx = fixture();
        let mut binding = fx.bind(0);
        let moved = Vec3::new(3.0, 0.0, 0.0);
        let _ = fx.registry.borrow_mut().set_location(&fx.ids[0], moved).unwrap();
        let writes = fx.writes();

        assert!(binding.refresh_from_model());
        assert_eq!(binding.handle().position(), moved);
        assert!(binding.take_outcomes().is_empty());
        assert_eq!(fx.writes(), writes);
        assert!(!binding.refresh_from_model());
    }

    #[test]
    fn refresh_waits_for_drag_to_end() {
        let fx = fixture();
        let mut binding = fx.bind(0);
        binding.handle_mut().begin_drag();
        let _ = fx
            .registry
            .borrow_mut()
            .set_location(&fx.ids[0], Vec3::new(3.0, 0.0, 0.0))
            .unwrap();
        assert!(!binding.refresh_from_model());
        assert_eq!(binding.handle().position(), Vec3::ZERO);

        binding.handle_mut().end_drag();
        assert!(binding.refresh_from_model());
    }

    #[test]
    fn removed_rack_is_reported_and_handlers_do_not_leak() {
        let fx = fixture();
        let mut binding = fx.bind(0);
        let _ = fx.registry.borrow_mut().remove(&fx.ids[0]).unwrap();
        let _ = binding.handle_mut().drag_to(Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(binding.take_outcomes(), vec![SyncOutcome::RackMissing]);
        assert_eq!(binding.handle().listener_count(), 1);

        assert!(TransformBinding::attach(
            &fx.ids[0],
            &fx.registry,
            &fx.gate,
            &Options::default()
        )
        .is_none());
    }

    #[test]
    fn busy_registry_drops_the_event() {
        let fx = fixture();
        let mut binding = fx.bind(0);
        let held = fx.registry.borrow();
        let _ = binding.handle_mut().drag_to(Vec3::new(3.0, 0.0, 0.0));
        drop(held);
        assert_eq!(binding.take_outcomes(), vec![SyncOutcome::RegistryBusy]);
        assert_eq!(fx.location(0), Vec3::ZERO);
    }
}
