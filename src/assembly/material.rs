//! Per-mesh material classification.
//!
//! The service reports one tag per mesh. Enclosure door panels come back
//! tagged like any other sheet part, so their indices are overridden to
//! [`MaterialTag::Glass`].

use std::ops::Range;

use crate::geometry::{MaterialTag, SubAssemblyKind};
use crate::options::{MaterialOptions, MaterialPreset};

/// Enclosure mesh indices that are always glass (front and rear doors).
pub const ENCLOSURE_GLASS_INDICES: Range<usize> = 2..4;

/// Final material class of mesh `index` in a `kind` sub-assembly.
#[must_use]
pub fn classify(
    kind: SubAssemblyKind,
    index: usize,
    reported: MaterialTag,
) -> MaterialTag {
    if kind == SubAssemblyKind::Enclosure
        && ENCLOSURE_GLASS_INDICES.contains(&index)
    {
        MaterialTag::Glass
    } else {
        reported
    }
}

/// Classify every mesh of a sub-assembly.
#[must_use]
pub fn classify_all(
    kind: SubAssemblyKind,
    reported: &[MaterialTag],
) -> Vec<MaterialTag> {
    reported
        .iter()
        .enumerate()
        .map(|(i, &tag)| classify(kind, i, tag))
        .collect()
}

/// Render preset for a material class.
#[must_use]
pub fn preset(materials: &MaterialOptions, tag: MaterialTag) -> &MaterialPreset {
    match tag {
        MaterialTag::Plastic => &materials.plastic,
        MaterialTag::Metal => &materials.metal,
        MaterialTag::Glass => &materials.glass,
    }
}
