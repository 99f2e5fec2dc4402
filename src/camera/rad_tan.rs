//! Implements the Radial-Tangential (Brown) camera model.
//!
//! This module provides the [`RadTanModel`] struct, a pinhole camera with
//! three radial (`k1`, `k2`, `k3`) and two tangential (`p1`, `p2`) distortion
//! coefficients. It is the model most calibration toolboxes export by default.
//!
//! Removing the distortion is done with Newton's method on the 2x2 system
//! `distort(u) - p = 0`, using the analytic Jacobian of the forward map.

use crate::camera::{
    validation, CameraModel, CameraModelError, IntrinsicBase, IntrinsicType, Intrinsics,
    MAX_UNDISTORTION_ITERATIONS, UNDISTORTION_EPS,
};
use crate::geometry::Pose3;
use log::debug;
use nalgebra::{Matrix2, Matrix3x4, Vector2};
use std::fmt;

/// Represents a Radial-Tangential (Brown) camera model.
///
/// Parameters, in [`CameraModel::get_params`] order:
/// `fx, fy, cx, cy, k1, k2, k3, p1, p2`.
///
/// # Examples
///
/// ```rust
/// use sfm_intrinsics::camera::{CameraModel, IntrinsicBase, Intrinsics, RadTanModel};
/// use nalgebra::Vector2;
///
/// let model = RadTanModel::new(
///     IntrinsicBase::new(752, 480, ""),
///     Intrinsics { fx: 461.629, fy: 460.152, cx: 362.680, cy: 246.049 },
///     [-0.2834, 0.0739, 0.0, 0.00019, 1.76e-5],
/// )
/// .unwrap();
///
/// let p = Vector2::new(0.2, -0.1);
/// let back = model.remove_disto(&model.add_disto(&p));
/// assert!((back - p).norm() < 1e-9);
/// ```
#[derive(Clone, Default)]
pub struct RadTanModel {
    pub base: IntrinsicBase,
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The 5 distortion coefficients: `[k1, k2, k3, p1, p2]`.
    pub distortions: [f64; 5],
}

impl RadTanModel {
    /// Creates a new [`RadTanModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidParams`] for non-finite coefficients
    pub fn new(
        base: IntrinsicBase,
        intrinsics: Intrinsics,
        distortions: [f64; 5],
    ) -> Result<Self, CameraModelError> {
        let model = RadTanModel {
            base,
            intrinsics,
            distortions,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Forward distortion and its Jacobian with respect to the undistorted point.
    fn distort_with_jacobian(&self, p: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
        let [k1, k2, k3, p1, p2] = self.distortions;
        let (x, y) = (p.x, p.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));

        let distorted = Vector2::new(
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        );

        // d(radial)/d(r2), chained with d(r2)/dx = 2x and d(r2)/dy = 2y
        let d_radial = k1 + 2.0 * k2 * r2 + 3.0 * k3 * r2 * r2;
        let d_radial_dx = 2.0 * x * d_radial;
        let d_radial_dy = 2.0 * y * d_radial;

        let jacobian = Matrix2::new(
            radial + x * d_radial_dx + 2.0 * p1 * y + 6.0 * p2 * x,
            x * d_radial_dy + 2.0 * p1 * x + 2.0 * p2 * y,
            y * d_radial_dx + 2.0 * p1 * x + 2.0 * p2 * y,
            radial + y * d_radial_dy + 6.0 * p1 * y + 2.0 * p2 * x,
        );
        (distorted, jacobian)
    }
}

/// Provides a debug string representation for [`RadTanModel`].
impl fmt::Debug for RadTanModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadTanModel [{}x{} fx: {} fy: {} cx: {} cy: {} distortions: {:?}]",
            self.base.resolution.width,
            self.base.resolution.height,
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.distortions,
        )
    }
}

impl PartialEq for RadTanModel {
    fn eq(&self, other: &Self) -> bool {
        self.same_intrinsic(other)
    }
}

impl CameraModel for RadTanModel {
    fn base(&self) -> &IntrinsicBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntrinsicBase {
        &mut self.base
    }

    fn get_type(&self) -> IntrinsicType {
        IntrinsicType::Brown
    }

    fn get_params(&self) -> Vec<f64> {
        let mut params = self.intrinsics.to_array().to_vec();
        params.extend_from_slice(&self.distortions);
        params
    }

    fn update_from_params(&mut self, params: &[f64]) -> bool {
        if !validation::check_param_count(self.get_type(), params) {
            return false;
        }
        self.intrinsics = Intrinsics::from_slice(params);
        self.distortions.copy_from_slice(&params[4..]);
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
        self.distort_with_jacobian(p).0
    }

    /// Newton iteration starting from the distorted point.
    ///
    /// Converges when the residual drops below [`UNDISTORTION_EPS`]. A
    /// singular Jacobian or reaching [`MAX_UNDISTORTION_ITERATIONS`] returns
    /// the current estimate.
    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        let mut point = *p;

        for _ in 0..MAX_UNDISTORTION_ITERATIONS {
            let (estimate, jacobian) = self.distort_with_jacobian(&point);
            let error = estimate - p;
            if error.norm() < UNDISTORTION_EPS {
                return point;
            }

            match jacobian.try_inverse() {
                Some(inv_jacobian) => point -= inv_jacobian * error,
                None => {
                    debug!("Brown undistortion of {:?}: singular Jacobian", p);
                    return point;
                }
            }
        }

        debug!(
            "Brown undistortion of {:?} did not converge after {} iterations",
            p, MAX_UNDISTORTION_ITERATIONS
        );
        point
    }

    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64 {
        value / self.intrinsics.mean_focal()
    }

    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64> {
        self.intrinsics.k_matrix() * pose.rt_matrix()
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.distortions.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
