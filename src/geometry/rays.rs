//! Angles between viewing rays, used to score how well a track can be
//! triangulated.

use crate::camera::CameraModel;
use crate::geometry::Pose3;
use nalgebra::{Vector2, Vector3};

/// The cosine is clamped to `[-1 + eps, 1 - eps]` before `acos`, so parallel
/// rays report a tiny positive angle rather than NaN.
pub const RAY_ANGLE_CLAMP_EPS: f64 = 1e-8;

/// Angle in degrees between two ray directions of any length.
pub fn angle_between_rays(ray1: &Vector3<f64>, ray2: &Vector3<f64>) -> f64 {
    let magnitude = ray1.norm() * ray2.norm();
    let cos_angle = (ray1.dot(ray2) / magnitude)
        .clamp(-1.0 + RAY_ANGLE_CLAMP_EPS, 1.0 - RAY_ANGLE_CLAMP_EPS);
    cos_angle.acos().to_degrees()
}

/// Angle in degrees between the world rays through two image observations.
///
/// Each ray is the bearing of the pixel rotated into world orientation by
/// `R^T`.
pub fn angle_between_observations(
    pose1: &Pose3,
    intrinsic1: &dyn CameraModel,
    pose2: &Pose3,
    intrinsic2: &dyn CameraModel,
    x1: &Vector2<f64>,
    x2: &Vector2<f64>,
) -> f64 {
    let ray1 = (pose1.rotation().transpose() * intrinsic1.bearing(x1)).normalize();
    let ray2 = (pose2.rotation().transpose() * intrinsic2.bearing(x2)).normalize();
    angle_between_rays(&ray1, &ray2)
}

/// Angle in degrees at `point` between the two camera centers.
pub fn angle_between_poses(pose1: &Pose3, pose2: &Pose3, point: &Vector3<f64>) -> f64 {
    let ray1 = point - pose1.center();
    let ray2 = point - pose2.center();
    angle_between_rays(&ray1, &ray2)
}
