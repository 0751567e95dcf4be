use serde::{Deserialize, Serialize};

/// Physically based surface parameters for one material class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaterialPreset {
    /// Base color (linear RGB).
    pub color: [f32; 3],
    /// Metalness factor (0 = dielectric, 1 = metal).
    pub metalness: f32,
    /// Roughness factor.
    pub roughness: f32,
    /// Environment map contribution.
    pub env_map_intensity: f32,
    /// Opacity; anything below 1 renders transparent.
    pub opacity: f32,
}

impl Default for MaterialPreset {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8],
            metalness: 0.0,
            roughness: 0.5,
            env_map_intensity: 1.0,
            opacity: 1.0,
        }
    }
}

/// Presets for the three material classes the service reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaterialOptions {
    /// Housings, bezels and cable trays.
    pub plastic: MaterialPreset,
    /// Frames, rails and the fallback for unknown tags.
    pub metal: MaterialPreset,
    /// Enclosure door panels.
    pub glass: MaterialPreset,
}

impl Default for MaterialOptions {
    fn default() -> Self {
        Self {
            plastic: MaterialPreset {
                color: [0.067, 0.067, 0.067],
                metalness: 0.2,
                roughness: 0.8,
                env_map_intensity: 0.5,
                opacity: 1.0,
            },
            metal: MaterialPreset {
                color: [1.0, 1.0, 1.0],
                metalness: 0.8,
                roughness: 0.05,
                env_map_intensity: 1.5,
                opacity: 1.0,
            },
            glass: MaterialPreset {
                color: [0.75, 0.85, 0.9],
                metalness: 0.0,
                roughness: 0.05,
                env_map_intensity: 1.5,
                opacity: 0.3,
            },
        }
    }
}
