//! Implements a purely radial distortion model with three coefficients.
//!
//! The distortion scales a camera plane point by
//! `1 + k1 * r^2 + k2 * r^4 + k3 * r^6`. The inverse has no closed form and
//! is computed by a bounded fixed-point iteration on the undistorted point.

use crate::camera::{
    validation, CameraModel, CameraModelError, IntrinsicBase, IntrinsicType, Intrinsics,
    MAX_FIXED_POINT_ITERATIONS, UNDISTORTION_EPS,
};
use crate::geometry::Pose3;
use log::debug;
use nalgebra::{Matrix3x4, Vector2};
use std::fmt;

/// Pinhole camera with radial distortion `k1, k2, k3`.
///
/// Parameters, in [`CameraModel::get_params`] order: `fx, fy, cx, cy, k1, k2, k3`.
#[derive(Clone, Default)]
pub struct Radial3Model {
    pub base: IntrinsicBase,
    pub intrinsics: Intrinsics,
    /// `[k1, k2, k3]`
    pub radial: [f64; 3],
}

impl Radial3Model {
    pub fn new(
        base: IntrinsicBase,
        intrinsics: Intrinsics,
        radial: [f64; 3],
    ) -> Result<Self, CameraModelError> {
        let model = Radial3Model {
            base,
            intrinsics,
            radial,
        };
        model.validate_params()?;
        Ok(model)
    }

    fn radial_factor(&self, r2: f64) -> f64 {
        let [k1, k2, k3] = self.radial;
        1.0 + r2 * (k1 + r2 * (k2 + r2 * k3))
    }
}

impl fmt::Debug for Radial3Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Radial3Model [{}x{} fx: {} fy: {} cx: {} cy: {} radial: {:?}]",
            self.base.resolution.width,
            self.base.resolution.height,
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.radial,
        )
    }
}

impl PartialEq for Radial3Model {
    fn eq(&self, other: &Self) -> bool {
        self.same_intrinsic(other)
    }
}

impl CameraModel for Radial3Model {
    fn base(&self) -> &IntrinsicBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntrinsicBase {
        &mut self.base
    }

    fn get_type(&self) -> IntrinsicType {
        IntrinsicType::Radial3
    }

    fn get_params(&self) -> Vec<f64> {
        let mut params = self.intrinsics.to_array().to_vec();
        params.extend_from_slice(&self.radial);
        params
    }

    fn update_from_params(&mut self, params: &[f64]) -> bool {
        if !validation::check_param_count(self.get_type(), params) {
            return false;
        }
        self.intrinsics = Intrinsics::from_slice(params);
        self.radial.copy_from_slice(&params[4..]);
        true
    }

    fn cam2ima(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.intrinsics.cam2ima(p)
    }

    fn ima2cam(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.intrinsics.ima2cam(p)
    }

    fn have_disto(&self) -> bool {
        true
    }

    fn add_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        p * self.radial_factor(p.norm_squared())
    }

    /// Iterates `u <- p / factor(|u|^2)` starting from the distorted point.
    ///
    /// Stops once the update is below [`UNDISTORTION_EPS`]; after
    /// [`MAX_FIXED_POINT_ITERATIONS`] the last estimate is returned.
    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        let mut undistorted = *p;
        for _ in 0..MAX_FIXED_POINT_ITERATIONS {
            let next = p / self.radial_factor(undistorted.norm_squared());
            let step = (next - undistorted).norm();
            undistorted = next;
            if step < UNDISTORTION_EPS {
                return undistorted;
            }
        }
        debug!(
            "Radial undistortion of {:?} did not converge after {} iterations",
            p, MAX_FIXED_POINT_ITERATIONS
        );
        undistorted
    }

    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64 {
        value / self.intrinsics.mean_focal()
    }

    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64> {
        self.intrinsics.k_matrix() * pose.rt_matrix()
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.radial.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Radial coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
