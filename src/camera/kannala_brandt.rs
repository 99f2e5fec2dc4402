//! Kannala-Brandt fisheye model with four coefficients.
//!
//! On the camera plane a point at radius `r` sees the incidence angle
//! `theta = atan(r)`. The lens maps it to
//! `theta_d = theta * (1 + k1 theta^2 + k2 theta^4 + k3 theta^6 + k4 theta^8)`
//! and the distorted point keeps the direction of the input with radius
//! `theta_d`. Removing the distortion solves for `theta` with Newton's method.

use crate::camera::{
    validation, CameraModel, CameraModelError, IntrinsicBase, IntrinsicType, Intrinsics,
    MAX_UNDISTORTION_ITERATIONS, UNDISTORTION_EPS,
};
use crate::geometry::Pose3;
use log::debug;
use nalgebra::{Matrix3x4, Vector2};
use std::f64::consts::FRAC_PI_2;
use std::fmt;

/// Radii below this are treated as the optical axis.
const AXIS_EPS: f64 = 1e-12;

/// Largest incidence angle the undistortion may return.
const MAX_INCIDENCE: f64 = FRAC_PI_2 - 1e-9;

/// Fisheye camera following the Kannala-Brandt polynomial.
///
/// Parameters, in [`CameraModel::get_params`] order:
/// `fx, fy, cx, cy, k1, k2, k3, k4`.
///
/// Points are only meaningful in front of the camera (incidence angle below
/// 90 degrees), since the camera plane representation is used throughout.
#[derive(Clone, Default)]
pub struct KannalaBrandtModel {
    pub base: IntrinsicBase,
    pub intrinsics: Intrinsics,
    pub coefficients: [f64; 4], // k1, k2, k3, k4
}

impl KannalaBrandtModel {
    pub fn new(
        base: IntrinsicBase,
        intrinsics: Intrinsics,
        coefficients: [f64; 4],
    ) -> Result<Self, CameraModelError> {
        let model = KannalaBrandtModel {
            base,
            intrinsics,
            coefficients,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// `theta_d(theta)` and its derivative.
    fn distort_angle(&self, theta: f64) -> (f64, f64) {
        let [k1, k2, k3, k4] = self.coefficients;
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;
        let theta_d = theta * (1.0 + k1 * theta2 + k2 * theta4 + k3 * theta6 + k4 * theta8);
        let derivative =
            1.0 + 3.0 * k1 * theta2 + 5.0 * k2 * theta4 + 7.0 * k3 * theta6 + 9.0 * k4 * theta8;
        (theta_d, derivative)
    }
}

impl fmt::Debug for KannalaBrandtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KannalaBrandtModel [{}x{} fx: {} fy: {} cx: {} cy: {} coefficients: {:?}]",
            self.base.resolution.width,
            self.base.resolution.height,
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.coefficients,
        )
    }
}

impl PartialEq for KannalaBrandtModel {
    fn eq(&self, other: &Self) -> bool {
        self.same_intrinsic(other)
    }
}

impl CameraModel for KannalaBrandtModel {
    fn base(&self) -> &IntrinsicBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntrinsicBase {
        &mut self.base
    }

    fn get_type(&self) -> IntrinsicType {
        IntrinsicType::Fisheye4
    }

    fn get_params(&self) -> Vec<f64> {
        let mut params = self.intrinsics.to_array().to_vec();
        params.extend_from_slice(&self.coefficients);
        params
    }

    fn update_from_params(&mut self, params: &[f64]) -> bool {
        if !validation::check_param_count(self.get_type(), params) {
            return false;
        }
        self.intrinsics = Intrinsics::from_slice(params);
        self.coefficients.copy_from_slice(&params[4..]);
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
        let r = p.norm();
        if r < AXIS_EPS {
            return *p;
        }
        let (theta_d, _) = self.distort_angle(r.atan());
        p * (theta_d / r)
    }

    /// Solves `theta_d(theta) = |p|` by Newton iteration from `theta = |p|`.
    ///
    /// The distorted radius may exceed 90 degrees for points in front of the
    /// camera, so only the estimate is kept in `[0, 90)` degrees. Stops when
    /// the step is below [`UNDISTORTION_EPS`]; after
    /// [`MAX_UNDISTORTION_ITERATIONS`] the current angle is used.
    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        let theta_d = p.norm();
        if theta_d < AXIS_EPS {
            return *p;
        }

        let mut theta = theta_d.min(MAX_INCIDENCE);
        let mut converged = false;
        for _ in 0..MAX_UNDISTORTION_ITERATIONS {
            let (estimate, derivative) = self.distort_angle(theta);
            let step = (estimate - theta_d) / derivative;
            theta = (theta - step).clamp(0.0, MAX_INCIDENCE);
            if step.abs() < UNDISTORTION_EPS {
                converged = true;
                break;
            }
        }
        if !converged {
            debug!(
                "Fisheye undistortion of {:?} did not converge after {} iterations",
                p, MAX_UNDISTORTION_ITERATIONS
            );
        }

        p * (theta.tan() / theta_d)
    }

    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64 {
        value / self.intrinsics.mean_focal()
    }

    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64> {
        self.intrinsics.k_matrix() * pose.rt_matrix()
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.coefficients.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Kannala-Brandt coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
