use std::f32::consts::FRAC_PI_2;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::LayoutOptions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Handle", inline)]
#[serde(default)]
/// Transform handle snapping.
pub struct HandleOptions {
    /// Translation snap step in metres. Unset follows the layout slot
    /// width; zero disables snapping.
    #[schemars(title = "Translation Snap", range(min = 0.0, max = 5.0), extend("step" = 0.05))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_snap: Option<f32>,
    /// Rotation snap step in radians. Zero disables snapping.
    #[schemars(skip)]
    pub rotation_snap: f32,
}

impl HandleOptions {
    /// Effective translation snap step for `layout`.
    #[must_use]
    pub fn translation_step(&self, layout: &LayoutOptions) -> f32 {
        self.translation_snap.unwrap_or(layout.slot_width)
    }
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            translation_snap: None,
            rotation_snap: FRAC_PI_2,
        }
    }
}
