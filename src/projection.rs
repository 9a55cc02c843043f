// projection.rs: 小行星投影数学 (与 little_planet.wgsl 一一对应)
//
// Plane coordinates are [-1,1]^2 with +y up. Directions are x right, y up,
// z forward.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat2, Mat3, Vec2, Vec3, Vec4};

use crate::params::{CameraParams, LogoTransform};

/// Lower bound for zoom and logo scale divisors.
pub const EPSILON: f32 = 0.0001;
/// Logo feather runs from this Chebyshev radius...
pub const FEATHER_INNER: f32 = 0.48;
/// ...to this one, beyond which the logo contributes nothing.
pub const FEATHER_OUTER: f32 = 0.5;

pub fn rot_x(a: f32) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::from_cols(
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, c, -s),
        Vec3::new(0.0, s, c),
    )
}

pub fn rot_y(a: f32) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::from_cols(
        Vec3::new(c, 0.0, s),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(-s, 0.0, c),
    )
}

pub fn rot_z(a: f32) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::from_cols(
        Vec3::new(c, -s, 0.0),
        Vec3::new(s, c, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    )
}

/// `Rz(yaw) * Rx(pitch) * Ry(roll)`. The order is fixed; rotations do not
/// commute and saved settings depend on it.
pub fn camera_rotation(camera: &CameraParams) -> Mat3 {
    rot_z(camera.yaw.to_radians())
        * rot_x(camera.pitch.to_radians())
        * rot_y(camera.roll.to_radians())
}

/// Unit vector of the stereographic projection from the north pole.
pub fn stereographic_lift(p: Vec2) -> Vec3 {
    let r2 = p.length_squared();
    let denom = 1.0 + r2;
    Vec3::new(2.0 * p.x / denom, 2.0 * p.y / denom, (r2 - 1.0) / denom)
}

/// Map a plane coordinate to a unit direction on the sphere. The plane
/// center looks at the nadir when all angles are zero.
pub fn plane_to_dir(p: Vec2, camera: &CameraParams) -> Vec3 {
    // 屏幕 Y 向上
    let p = Vec2::new(p.x, -p.y) / camera.zoom.max(EPSILON);
    let n = stereographic_lift(p);
    // 投影极点 -> 天底 (0,-1,0)
    let n = rot_x(FRAC_PI_2) * n;
    (camera_rotation(camera) * n).normalize()
}

/// Equirectangular texture coordinate of a unit direction. `u` runs over
/// longitude from -π to π, `v` from the zenith (0) to the nadir (1).
pub fn equi_uv(dir: Vec3) -> Vec2 {
    let theta = dir.z.atan2(dir.x);
    let phi = dir.y.clamp(-1.0, 1.0).asin();
    Vec2::new((theta + PI) / TAU, (FRAC_PI_2 - phi) / PI)
}

/// Where a viewport coordinate lands inside the logo, and how much of it
/// survives the edge feather.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoQuery {
    /// Logo-local plane point; the logo covers `[-0.5,0.5]^2`.
    pub local: Vec2,
    /// Logo texture coordinate (x mirrored).
    pub uv: Vec2,
    pub feather: f32,
}

pub fn logo_query(uv: Vec2, logo: &LogoTransform) -> LogoQuery {
    let p = uv * 2.0 - Vec2::ONE;
    let p = p - Vec2::from(logo.position);
    // 旋转查询点而不是 logo
    let (s, c) = (-logo.rotation.to_radians()).sin_cos();
    let p = Mat2::from_cols(Vec2::new(c, -s), Vec2::new(s, c)) * p;
    let local = p / logo.scale.max(EPSILON);
    let uv = local * Vec2::new(-1.0, 1.0) + Vec2::splat(0.5);
    LogoQuery {
        local,
        uv,
        feather: feather(local),
    }
}

/// 1 inside radius 0.48, 0 from radius 0.5 on, smooth in between.
pub fn feather(local: Vec2) -> f32 {
    let radius = local.x.abs().max(local.y.abs());
    1.0 - smoothstep(FEATHER_INNER, FEATHER_OUTER, radius)
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Straight-alpha "over" of the logo onto the panorama; always opaque.
pub fn composite(panorama: Vec3, logo: Vec4) -> Vec4 {
    panorama.lerp(logo.truncate(), logo.w).extend(1.0)
}
