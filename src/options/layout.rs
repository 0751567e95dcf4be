use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Layout", inline)]
#[serde(default)]
/// Rack placement and sub-assembly layout, in scene units (metres).
pub struct LayoutOptions {
    /// Distance between neighbouring rack anchors along X.
    #[schemars(title = "Slot Width", range(min = 0.5, max = 5.0), extend("step" = 0.1))]
    pub slot_width: f32,
    /// Frame width along X.
    #[schemars(skip)]
    pub frame_width: f32,
    /// Frame height along Y.
    #[schemars(skip)]
    pub frame_height: f32,
    /// Frame depth before any server is added.
    #[schemars(skip)]
    pub base_depth: f32,
    /// Depth each server adds to the frame.
    #[schemars(title = "Server Depth", range(min = 0.01, max = 1.0), extend("step" = 0.01))]
    pub server_depth: f32,
    /// Gap between the back of the frame and the AC unit.
    #[schemars(title = "AC Gap", range(min = 0.0, max = 2.0), extend("step" = 0.05))]
    pub ac_gap: f32,
    /// AC unit depth.
    #[schemars(skip)]
    pub ac_depth: f32,
    /// Clearance between the frame and its enclosure on every side.
    #[schemars(skip)]
    pub enclosure_margin: f32,
    /// Server count for racks added without one.
    #[schemars(title = "Default Servers", range(min = 1, max = 42))]
    pub default_server_amount: u32,
    /// Per-server wattage for racks added without one.
    #[schemars(title = "Default Wattage", range(min = 0.0, max = 5000.0), extend("step" = 50.0))]
    pub default_server_wattage: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            slot_width: 1.5,
            frame_width: 0.6,
            frame_height: 2.0,
            base_depth: 0.2,
            server_depth: 0.1,
            ac_gap: 0.0,
            ac_depth: 0.5,
            enclosure_margin: 0.02,
            default_server_amount: 3,
            default_server_wattage: 500.0,
        }
    }
}
