//! Rack composition from four independently loaded sub-assemblies.
//!
//! - [`params`]: rack parameters to request keys, offsets and extents
//! - [`material`]: per-mesh material classification
//! - [`composer`]: per-rack slots, generation tracking and composites

pub mod composer;
pub mod material;
pub mod params;

pub use composer::{
    AssemblyComposer, CompositePart, LoadState, PartContent, PlaceholderTag,
    PumpReport, RackAssembly, RackComposite, SlotTicket, SubAssemblySlot,
};
pub use material::ENCLOSURE_GLASS_INDICES;
