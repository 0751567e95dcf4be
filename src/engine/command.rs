//! The engine's complete interactive vocabulary.
//!
//! Every user-facing operation on the rack list (add button, config form,
//! click to select, hover, import) is represented as a [`RackCommand`].
//! Consumers construct commands and pass them to
//! [`RackRoomEngine::execute`](super::RackRoomEngine::execute).

use serde::{Deserialize, Serialize};

use crate::scene::{RackEntity, RackId, RackParams, RackPatch};

/// A rack-list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RackCommand {
    // ── Rack list ───────────────────────────────────────────────────
    /// Append a rack at the next free slot.
    AddRack {
        /// Initial values; unset fields use the layout defaults.
        #[serde(default)]
        params: RackParams,
    },

    /// Merge fields into an existing rack.
    UpdateRack {
        /// Target rack.
        id: RackId,
        /// Fields to change.
        patch: RackPatch,
    },

    /// Remove a rack.
    RemoveRack {
        /// Target rack.
        id: RackId,
    },

    /// Replace the whole list with an imported one.
    ImportRacks {
        /// Racks in exchange form.
        racks: Vec<RackEntity>,
    },

    // ── Selection ───────────────────────────────────────────────────
    /// Select one rack, deselecting any other.
    Select {
        /// Target rack.
        id: RackId,
    },

    /// Clear the selection (click on empty space).
    ClearSelection,

    /// Set or clear the hover/preview flag.
    Highlight {
        /// Target rack.
        id: RackId,
        /// New flag.
        highlighted: bool,
    },
}

/// What an executed command changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// A rack was created.
    Added(RackEntity),
    /// A rack was modified (`false` when the patch changed nothing).
    Updated(bool),
    /// A rack was removed.
    Removed(RackEntity),
    /// The list was replaced; carries the new rack count.
    Imported(usize),
    /// Selection or hover state was applied.
    SelectionChanged,
}
