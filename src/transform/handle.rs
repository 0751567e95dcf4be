//! A manipulable translate handle with snapping and an observer list.
//!
//! The handle is the in-scene gizmo a user drags. It owns its own
//! position, snaps every manipulation to the configured grid and reports
//! each manipulated frame to its subscribers. Subscriptions are RAII:
//! dropping the returned [`Subscription`] removes the handler, so a
//! binding torn down with its rack never leaves a handler behind.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec3;


/// What the handle reports to subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandleEvent {
    /// The user grabbed the handle.
    DragStarted,
    /// The handle moved during a manipulated frame.
    Changed {
        /// Snapped handle position.
        position: Vec3,
    },
    /// The handle's rotation ring was turned.
    Rotated {
        /// Snapped yaw in radians.
        yaw: f32,
    },
    /// The user let go.
    DragEnded,
}

type Handler = Box<dyn FnMut(&HandleEvent)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
    /// Set while handlers are taken out for dispatch.
    emitting: bool,
    /// Ids unsubscribed during dispatch.
    removed: Vec<u64>,
}

/// Keeps a handler registered until dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let Ok(mut listeners) = listeners.try_borrow_mut() else {
            return;
        };
        if listeners.emitting {
            listeners.removed.push(self.id);
        } else {
            listeners.handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

fn snap(value: f32, step: f32) -> f32 {
    if step > 0.0 {
        (value / step).round() * step
    } else {
        value
    }
}

/// Translate-only manipulation handle.
pub struct TransformHandle {
    position: Vec3,
    yaw: f32,
    dragging: bool,
    translation_snap: f32,
    rotation_snap: f32,
    listeners: Rc<RefCell<Listeners>>,
}

impl TransformHandle {
    /// Create a handle at `position` snapping to `translation_snap` metres
    /// and `rotation_snap` radians. A zero step disables that snapping.
    #[must_use]
    pub fn new(position: Vec3, translation_snap: f32, rotation_snap: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            dragging: false,
            translation_snap,
            rotation_snap,
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    /// Current handle position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Current yaw in radians.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let listeners = self.listeners.borrow();
        listeners.handlers.len().saturating_sub(listeners.removed.len())
    }

    /// Register `handler` for every subsequent event.
    pub fn subscribe(
        &self,
        handler: impl FnMut(&HandleEvent) + 'static,
    ) -> Subscription {
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.handlers.push((id, Box::new(handler)));
        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    /// Deliver `event` to every handler, exactly as given.
    ///
    /// Handlers may subscribe or unsubscribe while being called; such
    /// changes take effect from the next event.
    pub fn emit_raw(&self, event: HandleEvent) {
        let mut handlers = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.emitting = true;
            std::mem::take(&mut listeners.handlers)
        };
        for (_, handler) in &mut handlers {
            handler(&event);
        }
        let mut listeners = self.listeners.borrow_mut();
        let added = std::mem::take(&mut listeners.handlers);
        let removed = std::mem::take(&mut listeners.removed);
        handlers.retain(|(id, _)| !removed.contains(id));
        handlers.extend(added);
        listeners.handlers = handlers;
        listeners.emitting = false;
    }

    /// Grab the handle.
    pub fn begin_drag(&mut self) {
        if !self.dragging {
            self.dragging = true;
            self.emit_raw(HandleEvent::DragStarted);
        }
    }

    /// Move the handle toward `target` for one manipulated frame. The
    /// position is snapped before it is reported. Returns the snapped
    /// position.
    pub fn drag_to(&mut self, target: Vec3) -> Vec3 {
        let step = self.translation_snap;
        self.position = Vec3::new(
            snap(target.x, step),
            snap(target.y, step),
            snap(target.z, step),
        );
        self.emit_raw(HandleEvent::Changed {
            position: self.position,
        });
        self.position
    }

    /// Turn the rotation ring by `delta` radians, snapped to whole steps.
    pub fn rotate_by(&mut self, delta: f32) -> f32 {
        self.yaw = snap(self.yaw + delta, self.rotation_snap);
        self.emit_raw(HandleEvent::Rotated { yaw: self.yaw });
        self.yaw
    }

    /// Let go of the handle.
    pub fn end_drag(&mut self) {
        if self.dragging {
            self.dragging = false;
            self.emit_raw(HandleEvent::DragEnded);
        }
    }

    /// Move the handle without emitting anything. Refused while dragging.
    pub fn set_position_silently(&mut self, position: Vec3) -> bool {
        if self.dragging {
            return false;
        }
        self.position = position;
        true
    }
}
