//! Rack records and the partial updates applied to them.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable opaque rack identifier.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RackId(String);

impl RackId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RackId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// One server rack as held by the registry.
///
/// Serializes to the exchange form
/// `{ id, serverAmount, serverWattage, name, highlighted, location, selected }`
/// with `location` as an `[x, y, z]` array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RackEntity {
    /// Unique, never reused.
    pub id: RackId,
    /// Number of servers; drives frame, enclosure and duct sizing.
    pub server_amount: u32,
    /// Per-server wattage; drives AC unit sizing.
    pub server_wattage: f64,
    /// Display name.
    pub name: String,
    /// Hover/preview flag.
    #[serde(default)]
    pub highlighted: bool,
    /// World-space anchor.
    pub location: Vec3,
    /// Selection flag. Only the registry writes it.
    #[serde(default)]
    pub selected: bool,
}

/// Initial values for [`SceneRegistry::add`](super::SceneRegistry::add).
/// Unset fields take the registry defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RackParams {
    /// Server count.
    pub server_amount: Option<u32>,
    /// Per-server wattage.
    pub server_wattage: Option<f64>,
    /// Display name.
    pub name: Option<String>,
    /// Explicit anchor instead of the next free slot.
    pub location: Option<Vec3>,
}

/// Partial update merged by
/// [`SceneRegistry::update`](super::SceneRegistry::update).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RackPatch {
    /// New server count.
    pub server_amount: Option<u32>,
    /// New per-server wattage.
    pub server_wattage: Option<f64>,
    /// New display name.
    pub name: Option<String>,
    /// New anchor.
    pub location: Option<Vec3>,
    /// New hover flag.
    pub highlighted: Option<bool>,
}

impl RackPatch {
    /// Patch that only moves the rack.
    #[must_use]
    pub fn location(location: Vec3) -> Self {
        Self {
            location: Some(location),
            ..Self::default()
        }
    }

    /// Patch that only changes the server count.
    #[must_use]
    pub fn server_amount(server_amount: u32) -> Self {
        Self {
            server_amount: Some(server_amount),
            ..Self::default()
        }
    }

    /// Whether the patch carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.server_amount.is_none()
            && self.server_wattage.is_none()
            && self.name.is_none()
            && self.location.is_none()
            && self.highlighted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_form_uses_camel_case_and_arrays() {
        let rack = RackEntity {
            id: RackId::from("k3x9q2a"),
            server_amount: 4,
            server_wattage: 750.0,
            name: "Server Rack 1".to_owned(),
            highlighted: false,
            location: Vec3::new(1.5, 0.0, 0.0),
            selected: true,
        };
        let value = serde_json::to_value(&rack).unwrap();
        assert_eq!(value["id"], "k3x9q2a");
        assert_eq!(value["serverAmount"], 4);
        assert_eq!(value["serverWattage"], 750.0);
        assert_eq!(value["location"], serde_json::json!([1.5, 0.0, 0.0]));
        assert_eq!(value["selected"], true);
    }

    #[test]
    fn patch_accepts_partial_json() {
        let patch: RackPatch =
            serde_json::from_str(r#"{"serverAmount": 8}"#).unwrap();
        assert_eq!(patch, RackPatch::server_amount(8));
        assert!(!patch.is_empty());
        assert!(RackPatch::default().is_empty());
    }
}
