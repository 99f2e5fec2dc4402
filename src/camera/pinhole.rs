//! Implements the Pinhole camera model.
//!
//! This module provides the [`PinholeModel`] struct, the simplest
//! [`CameraModel`]: a linear projection through `K` with no lens distortion.
//! `add_disto` and `remove_disto` are the identity.

use crate::camera::{
    validation, CameraModel, CameraModelError, IntrinsicBase, IntrinsicType, Intrinsics,
};
use crate::geometry::Pose3;
use nalgebra::{Matrix3x4, Vector2};

/// Represents a Pinhole camera model.
///
/// Parameters, in [`CameraModel::get_params`] order: `fx, fy, cx, cy`.
///
/// # Examples
///
/// ```rust
/// use sfm_intrinsics::camera::{CameraModel, IntrinsicBase, Intrinsics, PinholeModel};
/// use sfm_intrinsics::geometry::Pose3;
/// use nalgebra::Vector3;
///
/// let intrinsics = Intrinsics { fx: 500.0, fy: 500.0, cx: 320.0, cy: 240.0 };
/// let model = PinholeModel::new(IntrinsicBase::new(640, 480, ""), intrinsics).unwrap();
///
/// let pixel = model.project(&Pose3::identity(), &Vector3::new(0.1, 0.2, 1.0), true);
/// assert!((pixel.x - 370.0).abs() < 1e-9);
/// assert!((pixel.y - 340.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PinholeModel {
    pub base: IntrinsicBase,
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
}

impl PinholeModel {
    /// Creates a new [`PinholeModel`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    pub fn new(base: IntrinsicBase, intrinsics: Intrinsics) -> Result<Self, CameraModelError> {
        let model = PinholeModel { base, intrinsics };
        model.validate_params()?;
        Ok(model)
    }
}

/// Same intrinsic block; the focal prior is ignored.
impl PartialEq for PinholeModel {
    fn eq(&self, other: &Self) -> bool {
        self.same_intrinsic(other)
    }
}

impl CameraModel for PinholeModel {
    fn base(&self) -> &IntrinsicBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntrinsicBase {
        &mut self.base
    }

    fn get_type(&self) -> IntrinsicType {
        IntrinsicType::Pinhole
    }

    fn get_params(&self) -> Vec<f64> {
        self.intrinsics.to_array().to_vec()
    }

    fn update_from_params(&mut self, params: &[f64]) -> bool {
        if !validation::check_param_count(self.get_type(), params) {
            return false;
        }
        self.intrinsics = Intrinsics::from_slice(params);
        true
    }

    fn cam2ima(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.intrinsics.cam2ima(p)
    }

    fn ima2cam(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.intrinsics.ima2cam(p)
    }

    fn add_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        *p
    }

    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        *p
    }

    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64 {
        value / self.intrinsics.mean_focal()
    }

    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64> {
        self.intrinsics.k_matrix() * pose.rt_matrix()
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)
    }
}

/// Contains unit tests for the Pinhole camera model.
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2xX, Matrix3xX, Vector3, Vector4};

    fn get_sample_model() -> PinholeModel {
        PinholeModel::new(
            IntrinsicBase::new(752, 480, "sample"),
            Intrinsics {
                fx: 461.629,
                fy: 460.152,
                cx: 362.680,
                cy: 246.049,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_pinhole_project_identity_pose() {
        let model = get_sample_model();
        let pixel = model.project(&Pose3::identity(), &Vector3::new(1.0, 1.0, 5.0), true);
        assert_relative_eq!(pixel.x, 461.629 / 5.0 + 362.680, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 460.152 / 5.0 + 246.049, epsilon = 1e-9);
    }

    /// The residual of a point against its own distortion-free projection is zero.
    #[test]
    fn test_pinhole_residual_round_trip() {
        let model = get_sample_model();
        let pose = Pose3::from_axis_angle(&Vector3::new(0.1, -0.2, 0.05), Vector3::new(0.5, 0.1, -2.0));
        let point = Vector3::new(0.3, -0.4, 3.0);
        let observed = model.project(&pose, &point, false);
        assert_relative_eq!(
            model.residual(&pose, &point, &observed),
            Vector2::zeros(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_pinhole_residuals_batch() {
        let model = get_sample_model();
        let pose = Pose3::identity();
        let points = Matrix3xX::from_columns(&[Vector3::new(0.0, 0.0, 1.0), Vector3::new(0.5, 0.5, 2.0)]);
        let observed = Matrix2xX::from_columns(&[
            Vector2::new(363.680, 246.049),
            model.project(&pose, &Vector3::new(0.5, 0.5, 2.0), true) + Vector2::new(0.0, -2.0),
        ]);
        let residuals = model.residuals(&pose, &points, &observed);
        assert_eq!(residuals.ncols(), 2);
        assert_relative_eq!(residuals[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(residuals[(1, 0)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(residuals[(0, 1)], 0.0, epsilon = 1e-9);
        assert_relative_eq!(residuals[(1, 1)], -2.0, epsilon = 1e-9);
    }

    #[test]
    #[should_panic]
    fn test_pinhole_residuals_column_mismatch() {
        let model = get_sample_model();
        let points = Matrix3xX::from_element(3, 1.0);
        let observed = Matrix2xX::from_element(2, 1.0);
        model.residuals(&Pose3::identity(), &points, &observed);
    }

    #[test]
    fn test_pinhole_params_round_trip() {
        let mut model = get_sample_model();
        let params = model.get_params();
        assert_eq!(params, vec![461.629, 460.152, 362.680, 246.049]);
        assert!(model.update_from_params(&params));
        assert_eq!(model.get_params(), params);

        assert!(!model.update_from_params(&[1.0, 2.0, 3.0]));
        assert_eq!(model.get_params(), params);
    }

    #[test]
    fn test_pinhole_bearing() {
        let model = get_sample_model();
        let point = Vector3::new(0.2, -0.1, 1.0);
        let pixel = model.project(&Pose3::identity(), &point, true);
        assert_relative_eq!(model.bearing(&pixel), point, epsilon = 1e-9);
        assert!(!model.have_disto());
        assert_relative_eq!(model.get_ud_pixel(&pixel), pixel, epsilon = 1e-9);
    }

    #[test]
    fn test_pinhole_projective_equivalent() {
        let model = get_sample_model();
        let pose = Pose3::from_axis_angle(&Vector3::new(0.0, 0.3, 0.0), Vector3::new(1.0, 0.0, -4.0));
        let point = Vector3::new(0.2, 0.4, 1.5);
        let p = model.get_projective_equivalent(&pose) * Vector4::new(point.x, point.y, point.z, 1.0);
        let pixel = Vector2::new(p.x / p.z, p.y / p.z);
        assert_relative_eq!(pixel, model.project(&pose, &point, false), epsilon = 1e-9);
    }

    #[test]
    fn test_pinhole_camera_plane_error() {
        let model = get_sample_model();
        let focal = 0.5 * (461.629 + 460.152);
        assert_relative_eq!(model.image_plane_to_camera_plane_error(4.0), 4.0 / focal);
    }

    #[test]
    fn test_pinhole_equality_ignores_focal_prior() {
        let model = get_sample_model();
        let mut other = model.clone();
        other.set_initial_focal_length_pix(123.0);
        assert_eq!(model, other);

        other.set_serial_number("other");
        assert_ne!(model, other);
    }

    #[test]
    fn test_pinhole_validity() {
        let model = get_sample_model();
        assert!(model.is_valid());
        let mut unset = model.clone();
        unset.set_width(0);
        assert!(!unset.is_valid());
        assert!(matches!(
            PinholeModel::new(IntrinsicBase::default(), Intrinsics { fx: -1.0, ..Intrinsics::default() }),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
    }
}
