//! Crate-level error types.

use std::fmt;

use crate::geometry::GeometryError;
use crate::scene::SceneError;

/// Errors produced by the rackroom crate.
#[derive(Debug)]
pub enum RackroomError {
    /// A sub-assembly geometry fetch failed.
    Geometry(GeometryError),
    /// A scene registry operation was rejected.
    Scene(SceneError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// Failed to spawn a background thread.
    ThreadSpawn(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Rack list (de)serialization failure.
    Serialization(String),
}

impl fmt::Display for RackroomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry(e) => write!(f, "geometry error: {e}"),
            Self::Scene(e) => write!(f, "scene error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn thread: {e}")
            }
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Serialization(msg) => {
                write!(f, "rack list serialization error: {msg}")
            }
        }
    }
}

impl std::error::Error for RackroomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Geometry(e) => Some(e),
            Self::Scene(e) => Some(e),
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GeometryError> for RackroomError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}

impl From<SceneError> for RackroomError {
    fn from(e: SceneError) -> Self {
        Self::Scene(e)
    }
}

impl From<std::io::Error> for RackroomError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for RackroomError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
