//! Authoritative rack list: flat entity storage, single selection and
//! derived aggregates.
//!
//! [`SceneRegistry`] is the only writer of `selected` and the only place
//! rack ids are minted. Every mutation bumps the generation counter and
//! recomputes the aggregates, so readers never see a stale total.

mod entity;

use std::fmt;

pub use entity::{RackEntity, RackId, RackParams, RackPatch};
use glam::Vec3;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::error::RackroomError;
use crate::options::LayoutOptions;

/// Length of a freshly minted rack id.
const ID_LEN: usize = 7;
const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A rejected registry operation. The registry is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// No rack with this id.
    UnknownRack(RackId),
    /// A field value violates the rack invariants.
    InvalidField {
        /// Offending field, in exchange-form spelling.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// Two racks in one list share an id.
    DuplicateId(RackId),
}

impl SceneError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRack(id) => write!(f, "no rack with id {id}"),
            Self::InvalidField { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            Self::DuplicateId(id) => write!(f, "duplicate rack id {id}"),
        }
    }
}

impl std::error::Error for SceneError {}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Totals over the whole rack list.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SceneAggregates {
    /// Sum of `server_wattage` over all racks.
    pub total_wattage: f64,
    /// Sum of `server_amount` over all racks.
    pub total_servers: u64,
    /// Number of racks.
    pub rack_count: usize,
}

impl SceneAggregates {
    fn compute(entities: &[RackEntity]) -> Self {
        Self {
            total_wattage: entities.iter().map(|r| r.server_wattage).sum(),
            total_servers: entities
                .iter()
                .map(|r| u64::from(r.server_amount))
                .sum(),
            rack_count: entities.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_location(location: Vec3) -> Result<(), SceneError> {
    if location.is_finite() {
        Ok(())
    } else {
        Err(SceneError::invalid(
            "location",
            format!("{location} is not finite"),
        ))
    }
}

fn check_wattage(wattage: f64) -> Result<(), SceneError> {
    if wattage.is_finite() && wattage >= 0.0 {
        Ok(())
    } else {
        Err(SceneError::invalid(
            "serverWattage",
            format!("{wattage} is not a finite non-negative number"),
        ))
    }
}

// ---------------------------------------------------------------------------
// SceneRegistry
// ---------------------------------------------------------------------------

/// The authoritative rack list.
pub struct SceneRegistry {
    /// Racks in insertion order.
    entities: Vec<RackEntity>,
    /// Every id this registry has handed out or imported.
    issued: FxHashSet<RackId>,
    aggregates: SceneAggregates,
    layout: LayoutOptions,
    /// Monotonically increasing; bumped on any mutation.
    generation: u64,
    /// Number of applied mutating calls.
    writes: u64,
}

impl SceneRegistry {
    /// Create an empty registry placing racks per `layout`.
    #[must_use]
    pub fn new(layout: &LayoutOptions) -> Self {
        Self {
            entities: Vec::new(),
            issued: FxHashSet::default(),
            aggregates: SceneAggregates::default(),
            layout: layout.clone(),
            generation: 0,
            writes: 0,
        }
    }

    /// Rebuild a registry from a serialized rack list.
    ///
    /// Rejects duplicate ids and invalid fields. When several racks claim
    /// to be selected, only the first keeps the flag.
    ///
    /// # Errors
    ///
    /// [`SceneError::DuplicateId`] or [`SceneError::InvalidField`].
    pub fn from_entities(
        entities: Vec<RackEntity>,
        layout: &LayoutOptions,
    ) -> Result<Self, SceneError> {
        let mut registry = Self::new(layout);
        registry.replace_all(entities)?;
        Ok(registry)
    }

    /// Parse the JSON exchange form into a registry.
    ///
    /// # Errors
    ///
    /// [`RackroomError::Serialization`] for malformed JSON and
    /// [`RackroomError::Scene`] when the list violates rack invariants.
    pub fn from_json(
        json: &str,
        layout: &LayoutOptions,
    ) -> Result<Self, RackroomError> {
        let entities: Vec<RackEntity> = serde_json::from_str(json)?;
        Ok(Self::from_entities(entities, layout)?)
    }

    /// Serialize the rack list to the JSON exchange form.
    ///
    /// # Errors
    ///
    /// [`RackroomError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, RackroomError> {
        Ok(serde_json::to_string_pretty(&self.entities)?)
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.writes += 1;
        self.aggregates = SceneAggregates::compute(&self.entities);
    }

    fn position(&self, id: &RackId) -> Result<usize, SceneError> {
        self.entities
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| SceneError::UnknownRack(id.clone()))
    }

    fn mint_id(&mut self) -> RackId {
        let mut rng = rand::rng();
        loop {
            let text: String = (0..ID_LEN)
                .map(|_| char::from(ID_ALPHABET[rng.random_range(0..36)]))
                .collect();
            let id = RackId::new(text);
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Anchor one slot width past the furthest rack along +X.
    fn next_anchor(&self) -> Vec3 {
        self.entities
            .iter()
            .map(|r| r.location.x)
            .reduce(f32::max)
            .map_or(Vec3::ZERO, |x| Vec3::new(x + self.layout.slot_width, 0.0, 0.0))
    }

    // -- Entity management --

    /// Add a rack, filling unset fields from the layout defaults.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidField`] for a non-finite location or a negative
    /// or non-finite wattage.
    pub fn add(&mut self, params: RackParams) -> Result<RackEntity, SceneError> {
        let server_wattage = params
            .server_wattage
            .unwrap_or(self.layout.default_server_wattage);
        check_wattage(server_wattage)?;
        let location = params.location.unwrap_or_else(|| self.next_anchor());
        check_location(location)?;

        let rack = RackEntity {
            id: self.mint_id(),
            server_amount: params
                .server_amount
                .unwrap_or(self.layout.default_server_amount),
            server_wattage,
            name: params.name.unwrap_or_else(|| {
                format!("Server Rack {}", self.entities.len() + 1)
            }),
            highlighted: false,
            location,
            selected: false,
        };
        log::info!("added rack {} ({}) at {}", rack.id, rack.name, location);
        self.entities.push(rack.clone());
        self.invalidate();
        Ok(rack)
    }

    /// Merge `patch` into rack `id`. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownRack`] or [`SceneError::InvalidField`]; the
    /// rack is left untouched in both cases.
    pub fn update(
        &mut self,
        id: &RackId,
        patch: RackPatch,
    ) -> Result<bool, SceneError> {
        let idx = self.position(id)?;
        if let Some(location) = patch.location {
            check_location(location)?;
        }
        if let Some(wattage) = patch.server_wattage {
            check_wattage(wattage)?;
        }

        let rack = &mut self.entities[idx];
        let before = rack.clone();
        if let Some(amount) = patch.server_amount {
            rack.server_amount = amount;
        }
        if let Some(wattage) = patch.server_wattage {
            rack.server_wattage = wattage;
        }
        if let Some(name) = patch.name {
            rack.name = name;
        }
        if let Some(location) = patch.location {
            rack.location = location;
        }
        if let Some(highlighted) = patch.highlighted {
            rack.highlighted = highlighted;
        }

        if *rack == before {
            return Ok(false);
        }
        log::debug!("updated rack {id}");
        self.invalidate();
        Ok(true)
    }

    /// Move rack `id`. Shorthand for a location-only [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update).
    pub fn set_location(
        &mut self,
        id: &RackId,
        location: Vec3,
    ) -> Result<bool, SceneError> {
        self.update(id, RackPatch::location(location))
    }

    /// Remove a rack by id. Returns the removed rack, if any.
    pub fn remove(&mut self, id: &RackId) -> Option<RackEntity> {
        let idx = self.position(id).ok()?;
        let rack = self.entities.remove(idx);
        log::info!("removed rack {id}");
        self.invalidate();
        Some(rack)
    }

    /// Select exactly `id`, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownRack`]; the previous selection is kept.
    pub fn set_selected(&mut self, id: Option<&RackId>) -> Result<(), SceneError> {
        if let Some(id) = id {
            let _ = self.position(id)?;
        }
        if self.selected_id() == id {
            return Ok(());
        }
        for rack in &mut self.entities {
            rack.selected = Some(&rack.id) == id;
        }
        self.invalidate();
        Ok(())
    }

    /// Set the hover/preview flag of rack `id`.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownRack`].
    pub fn set_highlighted(
        &mut self,
        id: &RackId,
        highlighted: bool,
    ) -> Result<bool, SceneError> {
        self.update(
            id,
            RackPatch {
                highlighted: Some(highlighted),
                ..RackPatch::default()
            },
        )
    }

    /// Replace the whole list with `entities` (import).
    ///
    /// Imported ids join the issued set so they are never minted again.
    ///
    /// # Errors
    ///
    /// [`SceneError::DuplicateId`] or [`SceneError::InvalidField`]; the
    /// current list is kept.
    pub fn replace_all(
        &mut self,
        mut entities: Vec<RackEntity>,
    ) -> Result<(), SceneError> {
        let mut seen = FxHashSet::default();
        for rack in &entities {
            if !seen.insert(&rack.id) {
                return Err(SceneError::DuplicateId(rack.id.clone()));
            }
            check_location(rack.location)?;
            check_wattage(rack.server_wattage)?;
        }

        let mut selected_seen = false;
        for rack in &mut entities {
            if rack.selected && selected_seen {
                log::warn!("rack {} also marked selected; clearing", rack.id);
                rack.selected = false;
            }
            selected_seen |= rack.selected;
        }

        self.issued.extend(entities.iter().map(|r| r.id.clone()));
        self.entities = entities;
        log::info!("imported {} racks", self.entities.len());
        self.invalidate();
        Ok(())
    }

    /// Remove all racks. Issued ids stay reserved.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.invalidate();
    }

    // -- Queries --

    /// Read access to a rack.
    #[must_use]
    pub fn entity(&self, id: &RackId) -> Option<&RackEntity> {
        self.entities.iter().find(|r| &r.id == id)
    }

    /// All racks in insertion order.
    #[must_use]
    pub fn entities(&self) -> &[RackEntity] {
        &self.entities
    }

    /// Check if a rack exists.
    #[must_use]
    pub fn contains(&self, id: &RackId) -> bool {
        self.entities.iter().any(|r| &r.id == id)
    }

    /// Number of racks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry holds no racks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The selected rack's id, if any.
    #[must_use]
    pub fn selected_id(&self) -> Option<&RackId> {
        self.entities.iter().find(|r| r.selected).map(|r| &r.id)
    }

    /// Current totals.
    #[must_use]
    pub fn aggregates(&self) -> SceneAggregates {
        self.aggregates
    }

    /// Mutation generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of applied mutations.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes
    }
}
