//! Rack parameters to request keys and local placement.
//!
//! Every sub-assembly depends on a subset of the rack's parameters. Keys are
//! built from exactly that subset, so e.g. changing the wattage only
//! re-fetches the AC unit. Offsets are measured from the rack anchor to the
//! center of each part and grow linearly with the server count, which keeps
//! the composite contiguous while a rack is resized.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Quat, Vec3};

use crate::geometry::{GeometryRequestKey, SubAssemblyKind};
use crate::options::LayoutOptions;
use crate::scene::RackEntity;

/// Service models are in millimetres; the scene is in metres.
pub const MODEL_UNIT_SCALE: f32 = 0.001;

/// Fixed model orientation as Euler angles (XYZ order).
pub const MODEL_EULER: [f32; 3] = [FRAC_PI_2, FRAC_PI_2, 0.0];

/// Smallest AC unit height the service is asked for (mm).
pub const AC_MIN_HEIGHT: f64 = 250.0;

/// Fixed duct dimensions (mm).
pub const DUCT_SQUARE_WIDTH: f64 = 50.0;
/// Duct length (mm).
pub const DUCT_LENGTH: f64 = 60.0;
/// Radius of the circular duct end (mm).
pub const DUCT_CIRCULAR_RADIUS: f64 = 10.0;
/// Duct wall thickness (mm).
pub const DUCT_WALL_THICKNESS: f64 = 1.0;
/// Smallest square duct height (mm).
pub const DUCT_MIN_SQUARE_HEIGHT: f64 = 30.0;

/// Model rotation applied to every fetched mesh.
#[must_use]
pub fn model_rotation() -> Quat {
    Quat::from_euler(EulerRot::XYZ, MODEL_EULER[0], MODEL_EULER[1], MODEL_EULER[2])
}

/// AC unit height in mm: 1000 per 500 W per server, at least 250.
#[must_use]
pub fn ac_unit_height(server_wattage: f64) -> f64 {
    (1000.0 * server_wattage / 500.0).max(AC_MIN_HEIGHT)
}

/// Duct square section height in mm: 10 per server, at least 30.
#[must_use]
pub fn duct_square_height(server_amount: u32) -> f64 {
    (10.0 * f64::from(server_amount)).max(DUCT_MIN_SQUARE_HEIGHT)
}

/// Request key for one sub-assembly of `rack`.
#[must_use]
pub fn request_key(kind: SubAssemblyKind, rack: &RackEntity) -> GeometryRequestKey {
    let servers = f64::from(rack.server_amount);
    match kind {
        SubAssemblyKind::Frame | SubAssemblyKind::Enclosure => {
            GeometryRequestKey::new(kind, &[("servers", servers)])
        }
        SubAssemblyKind::AcUnit => GeometryRequestKey::new(
            kind,
            &[("height", ac_unit_height(rack.server_wattage))],
        ),
        SubAssemblyKind::Duct => GeometryRequestKey::new(
            kind,
            &[
                ("square_width", DUCT_SQUARE_WIDTH),
                ("square_height", duct_square_height(rack.server_amount)),
                ("length", DUCT_LENGTH),
                ("circular_radius", DUCT_CIRCULAR_RADIUS),
                ("wall_thickness", DUCT_WALL_THICKNESS),
            ],
        ),
    }
}

/// Frame depth in metres for `server_amount` servers.
fn rack_depth(layout: &LayoutOptions, server_amount: u32) -> f32 {
    layout.base_depth + layout.server_depth * server_amount as f32
}

/// Z of the AC unit (and duct) center.
fn ac_center_z(layout: &LayoutOptions, server_amount: u32) -> f32 {
    rack_depth(layout, server_amount) + layout.ac_gap + layout.ac_depth * 0.5
}

fn mm(value: f64) -> f32 {
    (value as f32) * MODEL_UNIT_SCALE
}

/// Bounding-box extent (metres) used for a part's placeholder.
#[must_use]
pub fn placeholder_extent(
    kind: SubAssemblyKind,
    rack: &RackEntity,
    layout: &LayoutOptions,
) -> Vec3 {
    let depth = rack_depth(layout, rack.server_amount);
    match kind {
        SubAssemblyKind::Frame => {
            Vec3::new(layout.frame_width, layout.frame_height, depth)
        }
        SubAssemblyKind::Enclosure => {
            Vec3::new(layout.frame_width, layout.frame_height, depth)
                + Vec3::splat(2.0 * layout.enclosure_margin)
        }
        SubAssemblyKind::AcUnit => Vec3::new(
            layout.frame_width,
            mm(ac_unit_height(rack.server_wattage)),
            layout.ac_depth,
        ),
        SubAssemblyKind::Duct => Vec3::new(
            mm(DUCT_SQUARE_WIDTH),
            mm(duct_square_height(rack.server_amount)),
            mm(DUCT_LENGTH),
        ),
    }
}

/// Center of a part relative to the rack anchor (metres).
#[must_use]
pub fn local_offset(
    kind: SubAssemblyKind,
    rack: &RackEntity,
    layout: &LayoutOptions,
) -> Vec3 {
    let depth = rack_depth(layout, rack.server_amount);
    match kind {
        SubAssemblyKind::Frame | SubAssemblyKind::Enclosure => {
            Vec3::new(0.0, layout.frame_height * 0.5, depth * 0.5)
        }
        SubAssemblyKind::AcUnit => {
            let height = mm(ac_unit_height(rack.server_wattage));
            Vec3::new(0.0, height * 0.5, ac_center_z(layout, rack.server_amount))
        }
        SubAssemblyKind::Duct => {
            let ac_height = mm(ac_unit_height(rack.server_wattage));
            let duct_height = mm(duct_square_height(rack.server_amount));
            Vec3::new(
                0.0,
                ac_height + duct_height * 0.5,
                ac_center_z(layout, rack.server_amount),
            )
        }
    }
}
