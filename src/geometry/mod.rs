//! Remote sub-assembly geometry: request keys, the metadata envelope, mesh
//! decoding, geometry sources and the shared fetch cache.
//!
//! The generation service is consumed as an HTTP contract: a metadata
//! endpoint per [`SubAssemblyKind`] describing the models that make up the
//! part, and one mesh buffer per named model. Everything here is keyed by
//! [`GeometryRequestKey`], so two racks with identical driving parameters
//! share one fetch and one cached result.

pub mod cache;
mod key;
mod metadata;
pub mod source;
mod stl;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

pub use cache::{
    CachedGeometry, FetchCompletion, FetchStats, FetchStatus,
    GeometryFetchCache,
};
pub use key::{GeometryRequestKey, SubAssemblyKind};
pub use metadata::{MaterialTag, ModelBounds, ModelInfo};
pub use source::GeometrySource;
#[cfg(feature = "http")]
pub use source::HttpGeometrySource;
pub use stl::MeshGeometry;

/// Discriminant of a [`GeometryError`], for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryErrorKind {
    /// Network or HTTP failure.
    Transport,
    /// The metadata envelope violated the service contract.
    MalformedMetadata,
    /// A mesh buffer failed to decode.
    MeshParse,
}

/// A failed sub-assembly fetch. Never cached; every waiter on a coalesced
/// request receives its own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Network or HTTP failure.
    Transport {
        /// Request target (URL or endpoint path).
        target: String,
        /// Underlying transport message.
        message: String,
    },
    /// `error` field present, `models` absent or empty, or invalid JSON.
    MalformedMetadata {
        /// Description of the violation.
        message: String,
    },
    /// A mesh buffer could not be decoded.
    MeshParse {
        /// Model name the buffer was fetched for.
        model: String,
        /// Description of the decode failure.
        message: String,
    },
}

impl GeometryError {
    /// Build a [`GeometryError::Transport`].
    pub fn transport(target: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Build a [`GeometryError::MalformedMetadata`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            message: message.into(),
        }
    }

    /// Build a [`GeometryError::MeshParse`].
    pub fn mesh_parse(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MeshParse {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Which of the three contract failures this is.
    #[must_use]
    pub fn kind(&self) -> GeometryErrorKind {
        match self {
            Self::Transport { .. } => GeometryErrorKind::Transport,
            Self::MalformedMetadata { .. } => {
                GeometryErrorKind::MalformedMetadata
            }
            Self::MeshParse { .. } => GeometryErrorKind::MeshParse,
        }
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { target, message } => {
                write!(f, "transport failure for {target}: {message}")
            }
            Self::MalformedMetadata { message } => {
                write!(f, "malformed metadata: {message}")
            }
            Self::MeshParse { model, message } => {
                write!(f, "mesh parse failure for {model}: {message}")
            }
        }
    }
}

impl std::error::Error for GeometryError {}
