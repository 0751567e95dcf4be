//! Interactive rack placement.
//!
//! A [`TransformHandle`] is the draggable gizmo, [`OrbitGate`] keeps camera
//! orbit and handle drags mutually exclusive, and [`TransformBinding`]
//! keeps one rack's canonical location and its handle consistent.

mod controller;
mod handle;
mod orbit;

pub use controller::{
    guard, GuardDecision, SyncOutcome, TransformBinding,
    TransformSyncController,
};
pub use handle::{HandleEvent, Subscription, TransformHandle};
pub use orbit::OrbitGate;
