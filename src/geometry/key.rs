use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// One independently fetched part of a rack.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SubAssemblyKind {
    /// The rack frame holding the servers.
    Frame,
    /// Side, top and door panels around the frame.
    Enclosure,
    /// The air-conditioning unit behind the enclosure.
    AcUnit,
    /// The ventilation duct rising from the AC unit.
    Duct,
}

impl SubAssemblyKind {
    /// Every kind, in composition order.
    pub const ALL: [Self; 4] =
        [Self::Frame, Self::Enclosure, Self::AcUnit, Self::Duct];

    /// Position of this kind in [`Self::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Frame => 0,
            Self::Enclosure => 1,
            Self::AcUnit => 2,
            Self::Duct => 3,
        }
    }

    /// Metadata endpoint path on the generation service.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Frame => "server-rack",
            Self::Enclosure => "enclosure",
            Self::AcUnit => "ac-unit",
            Self::Duct => "duct",
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Enclosure => "enclosure",
            Self::AcUnit => "AC unit",
            Self::Duct => "duct",
        }
    }
}

impl fmt::Display for SubAssemblyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Deterministic encoding of everything that determines one fetch result.
///
/// Parameters keep their insertion order (it is also the query-string
/// order). Values compare by bit pattern after folding `-0.0` into `0.0`,
/// so equal parameter sets always produce equal keys.
#[derive(Clone, Debug)]
pub struct GeometryRequestKey {
    kind: SubAssemblyKind,
    params: Vec<(&'static str, f64)>,
}

impl GeometryRequestKey {
    /// Build a key for `kind` from named numeric parameters.
    #[must_use]
    pub fn new(kind: SubAssemblyKind, params: &[(&'static str, f64)]) -> Self {
        let params = params
            .iter()
            .map(|&(name, value)| (name, canonical(value)))
            .collect();
        Self { kind, params }
    }

    /// Sub-assembly kind this key fetches.
    #[must_use]
    pub fn kind(&self) -> SubAssemblyKind {
        self.kind
    }

    /// Named parameters in query order.
    #[must_use]
    pub fn params(&self) -> &[(&'static str, f64)] {
        &self.params
    }

    /// Look up one parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, v)| v)
    }

    /// `name=value&...` query string.
    #[must_use]
    pub fn query(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Endpoint path including the query, relative to the service base.
    #[must_use]
    pub fn path(&self) -> String {
        if self.params.is_empty() {
            self.kind.endpoint().to_owned()
        } else {
            format!("{}?{}", self.kind.endpoint(), self.query())
        }
    }
}

fn canonical(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl PartialEq for GeometryRequestKey {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.0 == b.0 && a.1.to_bits() == b.1.to_bits())
    }
}

impl Eq for GeometryRequestKey {}

impl Hash for GeometryRequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.params.len().hash(state);
        for (name, value) in &self.params {
            name.hash(state);
            value.to_bits().hash(state);
        }
    }
}

impl fmt::Display for GeometryRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.endpoint(), self.query())
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;

    use super::*;

    #[test]
    fn equal_params_make_equal_keys() {
        let a = GeometryRequestKey::new(SubAssemblyKind::Frame, &[("servers", 3.0)]);
        let b = GeometryRequestKey::new(SubAssemblyKind::Frame, &[("servers", 3.0)]);
        assert_eq!(a, b);

        let mut set = FxHashSet::default();
        assert!(set.insert(a));
        assert!(!set.insert(b));
    }

    #[test]
    fn kind_and_value_distinguish_keys() {
        let frame = GeometryRequestKey::new(SubAssemblyKind::Frame, &[("servers", 3.0)]);
        let enclosure =
            GeometryRequestKey::new(SubAssemblyKind::Enclosure, &[("servers", 3.0)]);
        let bigger = GeometryRequestKey::new(SubAssemblyKind::Frame, &[("servers", 4.0)]);
        assert_ne!(frame, enclosure);
        assert_ne!(frame, bigger);
    }

    #[test]
    fn negative_zero_folds_into_zero() {
        let a = GeometryRequestKey::new(SubAssemblyKind::AcUnit, &[("height", 0.0)]);
        let b = GeometryRequestKey::new(SubAssemblyKind::AcUnit, &[("height", -0.0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn path_formats_integral_values_without_fraction() {
        let key = GeometryRequestKey::new(
            SubAssemblyKind::Duct,
            &[("square_width", 50.0), ("wall_thickness", 1.5)],
        );
        assert_eq!(key.path(), "duct?square_width=50&wall_thickness=1.5");
        assert_eq!(key.param("wall_thickness"), Some(1.5));
        assert_eq!(key.param("length"), None);
    }

    #[test]
    fn kind_indices_follow_all_order() {
        for (i, kind) in SubAssemblyKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
