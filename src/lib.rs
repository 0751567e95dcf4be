// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Parametric server-room rack assembly.
//!
//! Rackroom keeps an authoritative list of server racks, composes each rack
//! from four remotely generated sub-assemblies (frame, enclosure, AC unit,
//! duct) and keeps a draggable placement handle in sync with the selected
//! rack's location.
//!
//! # Key entry points
//!
//! - [`engine::RackRoomEngine`] - the frame-driven facade
//! - [`scene::SceneRegistry`] - the rack list and its aggregates
//! - [`assembly::AssemblyComposer`] - per-rack sub-assembly state and
//!   composition
//! - [`geometry::GeometryFetchCache`] - coalescing, bounded fetch cache
//! - [`transform::TransformBinding`] - handle/model location sync
//! - [`options::Options`] - runtime configuration (service, layout, handle,
//!   materials)
//!
//! # Architecture
//!
//! Geometry requests are derived from rack parameters and keyed so that
//! racks with identical parameters share a fetch. A small worker pool
//! performs the fetches; results are drained on the owning thread during
//! [`engine::RackRoomEngine::frame`], and results superseded by a newer
//! request for the same slot are discarded.

pub mod assembly;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod options;
pub mod scene;
pub mod transform;

pub use engine::{CommandOutcome, FrameReport, RackCommand, RackRoomEngine};
pub use error::RackroomError;
