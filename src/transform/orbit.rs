use std::cell::RefCell;
use std::rc::Rc;

use crate::scene::RackId;

/// Global mutual exclusion between handle drags and camera orbit.
///
/// Clones share one state. While a rack's handle holds the gate, orbit
/// navigation is off and no other handle may start a drag.
#[derive(Clone, Debug, Default)]
pub struct OrbitGate {
    holder: Rc<RefCell<Option<RackId>>>,
}

impl OrbitGate {
    /// A gate with orbit enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether camera orbit navigation is currently allowed.
    #[must_use]
    pub fn orbit_enabled(&self) -> bool {
        self.holder.borrow().is_none()
    }

    /// Rack whose handle is dragging, if any.
    #[must_use]
    pub fn dragging_rack(&self) -> Option<RackId> {
        self.holder.borrow().clone()
    }

    /// Take the gate for `rack`. Succeeds if the gate is free or already
    /// held by the same rack.
    pub fn try_acquire(&self, rack: &RackId) -> bool {
        let mut holder = self.holder.borrow_mut();
        match holder.as_ref() {
            Some(current) => current == rack,
            None => {
                log::debug!("orbit disabled while dragging rack {rack}");
                *holder = Some(rack.clone());
                true
            }
        }
    }

    /// Give the gate back. No effect unless `rack` holds it.
    pub fn release(&self, rack: &RackId) {
        let mut holder = self.holder.borrow_mut();
        if holder.as_ref() == Some(rack) {
            *holder = None;
            log::debug!("orbit re-enabled after dragging rack {rack}");
        }
    }
}
