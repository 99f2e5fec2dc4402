//! Camera intrinsic models.
//!
//! Every concrete model (pinhole, radial, Brown, fisheye) implements the
//! [`CameraModel`] trait, which covers the full transformation chain
//!
//! ```text
//! 3D point --pose--> camera frame --divide by z--> camera plane
//!          --add_disto--> distorted camera plane --cam2ima--> pixel
//! ```
//!
//! and its inverse, plus the flat parameter vector used by external
//! optimizers. [`CameraModelEnum`] is the closed set of variants used when a
//! container needs to hold heterogeneous intrinsics and dispatch on the
//! persisted type tag.

use crate::geometry::Pose3;
use nalgebra::{Matrix2xX, Matrix3, Matrix3x4, Matrix3xX, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub mod kannala_brandt;
pub mod model;
pub mod pinhole;
pub mod rad_tan;
pub mod radial;

pub use kannala_brandt::KannalaBrandtModel;
pub use model::{load_intrinsics_from_json, CameraModelEnum, IntrinsicRecord};
pub use pinhole::PinholeModel;
pub use rad_tan::RadTanModel;
pub use radial::Radial3Model;

/// Sentinel stored in [`IntrinsicBase::initial_focal_length_pix`] when the
/// focal length prior is unknown.
pub const UNKNOWN_FOCAL_LENGTH: f64 = -1.0;

/// Convergence tolerance (camera-plane units) of the iterative undistortion.
pub const UNDISTORTION_EPS: f64 = 1e-10;

/// Iteration cap for the Newton based undistortion (Brown, fisheye).
pub const MAX_UNDISTORTION_ITERATIONS: usize = 20;

/// Iteration cap for the fixed-point undistortion (radial).
pub const MAX_FIXED_POINT_ITERATIONS: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Unknown camera model: {0}")]
    UnknownModel(String),
    #[error("Cannot assign a {found} intrinsic to a {expected} intrinsic")]
    IncompatibleModel {
        expected: IntrinsicType,
        found: IntrinsicType,
    },
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for CameraModelError {
    fn from(err: serde_json::Error) -> Self {
        CameraModelError::JsonError(err.to_string())
    }
}

/// Tag identifying the concrete intrinsic model.
///
/// The discriminants are part of [`CameraModel::hash_value`] and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicType {
    Pinhole = 1,
    Radial3 = 4,
    Brown = 8,
    Fisheye4 = 16,
}

impl IntrinsicType {
    pub const ALL: [IntrinsicType; 4] = [
        IntrinsicType::Pinhole,
        IntrinsicType::Radial3,
        IntrinsicType::Brown,
        IntrinsicType::Fisheye4,
    ];

    /// Name used in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntrinsicType::Pinhole => "pinhole",
            IntrinsicType::Radial3 => "radial3",
            IntrinsicType::Brown => "brown",
            IntrinsicType::Fisheye4 => "fisheye4",
        }
    }

    /// Length of the vector returned by [`CameraModel::get_params`].
    pub fn param_count(&self) -> usize {
        match self {
            IntrinsicType::Pinhole => 4,
            IntrinsicType::Radial3 => 7,
            IntrinsicType::Brown => 9,
            IntrinsicType::Fisheye4 => 8,
        }
    }
}

impl fmt::Display for IntrinsicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntrinsicType {
    type Err = CameraModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntrinsicType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CameraModelError::UnknownModel(s.to_string()))
    }
}

/// Linear intrinsic parameters shared by every model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Intrinsics {
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
        }
    }
}

impl Intrinsics {
    /// Reads `[fx, fy, cx, cy]` from the head of a parameter slice.
    ///
    /// The caller checks that `params` holds at least four values.
    pub(crate) fn from_slice(params: &[f64]) -> Self {
        Intrinsics {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
        }
    }

    pub(crate) fn to_array(&self) -> [f64; 4] {
        [self.fx, self.fy, self.cx, self.cy]
    }

    /// Camera plane to pixel.
    pub fn cam2ima(&self, p: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(self.fx * p.x + self.cx, self.fy * p.y + self.cy)
    }

    /// Pixel to camera plane.
    pub fn ima2cam(&self, p: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }

    /// The calibration matrix `K`.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn mean_focal(&self) -> f64 {
        0.5 * (self.fx + self.fy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// State common to all intrinsic models.
///
/// Serializes to the `width`, `height`, `serialNumber` and
/// `initialFocalLengthPix` fields of an intrinsic record. The last two are
/// optional on read: records written before they existed load with an empty
/// serial number and [`UNKNOWN_FOCAL_LENGTH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrinsicBase {
    #[serde(flatten)]
    pub resolution: Resolution,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default = "unknown_focal_length")]
    pub initial_focal_length_pix: f64,
}

fn unknown_focal_length() -> f64 {
    UNKNOWN_FOCAL_LENGTH
}

impl Default for IntrinsicBase {
    fn default() -> Self {
        IntrinsicBase::new(0, 0, "")
    }
}

impl IntrinsicBase {
    pub fn new(width: u32, height: u32, serial_number: impl Into<String>) -> Self {
        IntrinsicBase {
            resolution: Resolution { width, height },
            serial_number: serial_number.into(),
            initial_focal_length_pix: UNKNOWN_FOCAL_LENGTH,
        }
    }

    /// A zero width or height means the image size was never set.
    pub fn is_valid(&self) -> bool {
        self.resolution.width != 0 && self.resolution.height != 0
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0)
            || !intrinsics.fx.is_finite()
            || !intrinsics.fy.is_finite()
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    /// Checks the length of a parameter vector handed to
    /// [`CameraModel::update_from_params`].
    pub fn check_param_count(model_type: IntrinsicType, params: &[f64]) -> bool {
        if params.len() == model_type.param_count() {
            return true;
        }
        log::debug!(
            "Rejected {} parameter update: expected {} values, got {}",
            model_type,
            model_type.param_count(),
            params.len()
        );
        false
    }
}

/// `-0.0 == 0.0`, so both must hash alike.
fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Trait defining the contract shared by all intrinsic models.
///
/// Implementors provide the model-specific maps (parameter vector, distortion,
/// camera plane / pixel conversion); projection, residuals, equality and the
/// grouping hash are derived from them.
///
/// Implementations are plain data: concurrent reads are fine, mutation
/// (`update_from_params`, setters) needs external synchronization.
pub trait CameraModel {
    fn base(&self) -> &IntrinsicBase;

    fn base_mut(&mut self) -> &mut IntrinsicBase;

    fn get_type(&self) -> IntrinsicType;

    /// The whole tunable state in a fixed, model-specific order. This is what
    /// an external optimizer sees.
    fn get_params(&self) -> Vec<f64>;

    /// Inverse of [`CameraModel::get_params`].
    ///
    /// Returns `false` and leaves the model untouched when `params` does not
    /// have the expected length.
    fn update_from_params(&mut self, params: &[f64]) -> bool;

    /// Transform a point from the camera plane to the image plane.
    fn cam2ima(&self, p: &Vector2<f64>) -> Vector2<f64>;

    /// Transform a point from the image plane to the camera plane.
    fn ima2cam(&self, p: &Vector2<f64>) -> Vector2<f64>;

    /// Does the model carry a distortion field?
    fn have_disto(&self) -> bool {
        false
    }

    /// Add the distortion field to a camera plane point.
    fn add_disto(&self, p: &Vector2<f64>) -> Vector2<f64>;

    /// Remove the distortion from a camera plane point.
    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64>;

    /// Normalize a pixel error magnitude to the camera plane.
    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64;

    /// Collapse pose and intrinsics into one 3x4 projective matrix, ignoring
    /// distortion.
    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64>;

    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Bearing vector (not unit length) of an image point, in the camera
    /// frame.
    fn bearing(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        let p = self.remove_disto(&self.ima2cam(pixel));
        Vector3::new(p.x, p.y, 1.0)
    }

    /// Pixel with the distortion removed.
    fn get_ud_pixel(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.cam2ima(&self.remove_disto(&self.ima2cam(p)))
    }

    /// Pixel with the distortion added.
    fn get_d_pixel(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.cam2ima(&self.add_disto(&self.ima2cam(p)))
    }

    fn is_valid(&self) -> bool {
        self.base().is_valid() && self.validate_params().is_ok()
    }

    fn width(&self) -> u32 {
        self.base().resolution.width
    }

    fn height(&self) -> u32 {
        self.base().resolution.height
    }

    fn serial_number(&self) -> &str {
        &self.base().serial_number
    }

    fn initial_focal_length_pix(&self) -> f64 {
        self.base().initial_focal_length_pix
    }

    fn set_width(&mut self, width: u32) {
        self.base_mut().resolution.width = width;
    }

    fn set_height(&mut self, height: u32) {
        self.base_mut().resolution.height = height;
    }

    fn set_serial_number(&mut self, serial_number: &str) {
        self.base_mut().serial_number = serial_number.to_string();
    }

    fn set_initial_focal_length_pix(&mut self, focal: f64) {
        self.base_mut().initial_focal_length_pix = focal;
    }

    /// Projects a world point to pixel coordinates.
    ///
    /// The point is moved into the camera frame by `pose`, divided by its
    /// depth, optionally distorted and mapped to pixels. A point with zero
    /// depth yields non-finite coordinates.
    fn project(&self, pose: &Pose3, point_3d: &Vector3<f64>, apply_distortion: bool) -> Vector2<f64> {
        let x = pose.apply(point_3d);
        let p = x.xy() / x.z;
        if apply_distortion && self.have_disto() {
            self.cam2ima(&self.add_disto(&p))
        } else {
            self.cam2ima(&p)
        }
    }

    /// `observed - project(pose, point_3d)`.
    fn residual(&self, pose: &Pose3, point_3d: &Vector3<f64>, observed: &Vector2<f64>) -> Vector2<f64> {
        observed - self.project(pose, point_3d, true)
    }

    /// Column-wise [`CameraModel::residual`].
    ///
    /// # Panics
    ///
    /// If `points_3d` and `observations` do not have the same number of
    /// columns.
    fn residuals(
        &self,
        pose: &Pose3,
        points_3d: &Matrix3xX<f64>,
        observations: &Matrix2xX<f64>,
    ) -> Matrix2xX<f64> {
        assert_eq!(
            points_3d.ncols(),
            observations.ncols(),
            "residuals: got {} points for {} observations",
            points_3d.ncols(),
            observations.ncols()
        );
        let mut residuals = Matrix2xX::zeros(observations.ncols());
        for (i, (point, observed)) in points_3d
            .column_iter()
            .zip(observations.column_iter())
            .enumerate()
        {
            let r = self.residual(pose, &point.into_owned(), &observed.into_owned());
            residuals.set_column(i, &r);
        }
        residuals
    }

    /// Hash of type, width, height, serial number and parameters, in that
    /// order. Used to group shots that can share one intrinsic block.
    ///
    /// Stable for a given build of this crate; not meant to be persisted.
    fn hash_value(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        (self.get_type() as i32).hash(&mut hasher);
        self.width().hash(&mut hasher);
        self.height().hash(&mut hasher);
        self.serial_number().hash(&mut hasher);
        for value in self.get_params() {
            canonical_bits(value).hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Equality on width, height, serial number, type and parameters.
    fn same_intrinsic(&self, other: &dyn CameraModel) -> bool {
        self.width() == other.width()
            && self.height() == other.height()
            && self.serial_number() == other.serial_number()
            && self.get_type() == other.get_type()
            && self.get_params() == other.get_params()
    }
}
