//! Rigid poses and ray angle utilities.

mod pose;
mod rays;

pub use pose::Pose3;
pub use rays::{
    angle_between_observations, angle_between_poses, angle_between_rays, RAY_ANGLE_CLAMP_EPS,
};
