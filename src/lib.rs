//! SfM Intrinsics Library
//!
//! Camera intrinsic models for multi-view reconstruction. Every model maps 3D
//! points to pixels and back, and exposes its parameters as a flat vector so an
//! external bundle adjuster can refine it. Supported models:
//! - Pinhole camera model
//! - Radial distortion model (k1, k2, k3)
//! - Radial-Tangential (Brown) distortion model
//! - Kannala-Brandt fisheye model
//!
//! The library also provides ray angle utilities for triangulation checks and
//! the point feature types consumed by reprojection residuals.

pub mod camera;
pub mod feature;
pub mod geometry;

// Re-export commonly used types
pub use camera::{
    CameraModel, CameraModelEnum, CameraModelError, IntrinsicBase, IntrinsicRecord,
    IntrinsicType, Intrinsics, KannalaBrandtModel, PinholeModel, RadTanModel, Radial3Model,
    Resolution,
};

pub use feature::{FeatureError, PointFeature, SioPointFeature};

pub use geometry::{angle_between_observations, angle_between_poses, angle_between_rays, Pose3};
