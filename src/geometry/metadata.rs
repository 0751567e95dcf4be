use serde::{Deserialize, Serialize};

use super::GeometryError;

/// Surface class of one mesh within a sub-assembly.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MaterialTag {
    /// Dark, rough plastic.
    Plastic,
    /// Bright polished metal.
    #[default]
    Metal,
    /// Transparent panel.
    Glass,
}

impl MaterialTag {
    /// Parse a service-reported tag (case-insensitive).
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "plastic" => Some(Self::Plastic),
            "metal" => Some(Self::Metal),
            "glass" => Some(Self::Glass),
            _ => None,
        }
    }
}

/// Axis-aligned bounds reported by the service, in model units (mm).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBounds {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
    /// Center point.
    pub center: [f32; 3],
    /// Extent along each axis.
    pub size: [f32; 3],
}

/// The metadata envelope returned by a sub-assembly endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Opaque model-set id used in mesh URLs.
    pub id: String,
    /// Model names, one mesh buffer each.
    #[serde(default)]
    pub models: Vec<String>,
    /// Material tags parallel to `models`.
    #[serde(default)]
    pub materials: Vec<String>,
    /// Reported bounds.
    #[serde(flatten)]
    pub bounds: ModelBounds,
}

impl ModelInfo {
    /// Parse and validate a metadata response body.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::MalformedMetadata`] when the body is not a
    /// JSON object, carries an `error` field, lacks an `id`, or has no
    /// models.
    pub fn parse(body: &[u8]) -> Result<Self, GeometryError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GeometryError::malformed(format!("invalid JSON: {e}")))?;

        let Some(object) = value.as_object() else {
            return Err(GeometryError::malformed("response is not an object"));
        };
        if let Some(error) = object.get("error") {
            return Err(GeometryError::malformed(format!(
                "service reported error: {error}"
            )));
        }

        let info: Self = serde_json::from_value(value)
            .map_err(|e| GeometryError::malformed(e.to_string()))?;
        if info.models.is_empty() {
            return Err(GeometryError::malformed("`models` is absent or empty"));
        }
        Ok(info)
    }

    /// Reported tags mapped onto [`MaterialTag`], one per model.
    ///
    /// Missing or unrecognized entries fall back to [`MaterialTag::Metal`].
    #[must_use]
    pub fn material_tags(&self) -> Vec<MaterialTag> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, model)| {
                let reported = self.materials.get(i);
                match reported.and_then(|t| MaterialTag::parse(t)) {
                    Some(tag) => tag,
                    None => {
                        log::warn!(
                            "model {}/{model}: unrecognized material {:?}, using metal",
                            self.id,
                            reported
                        );
                        MaterialTag::Metal
                    }
                }
            })
            .collect()
    }
}
