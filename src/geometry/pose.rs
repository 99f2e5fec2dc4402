use nalgebra::{Matrix3, Matrix3x4, Rotation3, Vector3};

/// Rigid world-to-camera transform stored as a rotation and the camera
/// center in world coordinates.
///
/// A world point `X` maps to `R * (X - C)` in the camera frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    rotation: Matrix3<f64>,
    center: Vector3<f64>,
}

impl Default for Pose3 {
    fn default() -> Self {
        Pose3::identity()
    }
}

impl Pose3 {
    /// `rotation` is expected to be orthonormal.
    pub fn new(rotation: Matrix3<f64>, center: Vector3<f64>) -> Self {
        Pose3 { rotation, center }
    }

    pub fn identity() -> Self {
        Pose3::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Builds the rotation from an axis-angle vector (radians).
    pub fn from_axis_angle(axis_angle: &Vector3<f64>, center: Vector3<f64>) -> Self {
        Pose3::new(Rotation3::new(*axis_angle).into_inner(), center)
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    /// `t = -R * C`
    pub fn translation(&self) -> Vector3<f64> {
        -(self.rotation * self.center)
    }

    /// Maps a world point into the camera frame.
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * (point - self.center)
    }

    /// `[R | t]`
    pub fn rt_matrix(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        rt.set_column(3, &self.translation());
        rt
    }
}
