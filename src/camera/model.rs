//! The closed set of intrinsic models and their persisted form.
//!
//! [`CameraModelEnum`] lets a container own heterogeneous intrinsics, copy them
//! and rebuild them from an [`IntrinsicRecord`] by dispatching on its `type`
//! field.

use crate::camera::{
    CameraModel, CameraModelError, IntrinsicBase, IntrinsicType, KannalaBrandtModel,
    PinholeModel, RadTanModel, Radial3Model,
};
use crate::geometry::Pose3;
use log::info;
use nalgebra::{Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One intrinsic as stored inside a scene document.
///
/// ```json
/// {
///   "type": "brown",
///   "width": 752,
///   "height": 480,
///   "serialNumber": "euroc-cam0",
///   "initialFocalLengthPix": -1.0,
///   "params": [461.629, 460.152, 362.68, 246.049, -0.283, 0.074, 0.0, 0.0002, 0.00002]
/// }
/// ```
///
/// `serialNumber` and `initialFocalLengthPix` may be missing (older records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicRecord {
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(flatten)]
    pub base: IntrinsicBase,
    pub params: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct IntrinsicList {
    intrinsics: Vec<IntrinsicRecord>,
}

/// Any of the supported intrinsic models.
///
/// Equality follows [`CameraModel::same_intrinsic`]: the initial focal length
/// is not compared.
#[derive(Debug, Clone)]
pub enum CameraModelEnum {
    Pinhole(PinholeModel),
    Radial3(Radial3Model),
    Brown(RadTanModel),
    Fisheye4(KannalaBrandtModel),
}

impl CameraModelEnum {
    /// A model of the given type with unit focal length, zero principal point
    /// and no distortion.
    pub fn with_defaults(model_type: IntrinsicType, base: IntrinsicBase) -> Self {
        match model_type {
            IntrinsicType::Pinhole => CameraModelEnum::Pinhole(PinholeModel {
                base,
                ..Default::default()
            }),
            IntrinsicType::Radial3 => CameraModelEnum::Radial3(Radial3Model {
                base,
                ..Default::default()
            }),
            IntrinsicType::Brown => CameraModelEnum::Brown(RadTanModel {
                base,
                ..Default::default()
            }),
            IntrinsicType::Fisheye4 => CameraModelEnum::Fisheye4(KannalaBrandtModel {
                base,
                ..Default::default()
            }),
        }
    }

    /// Factory keyed by type tag.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::InvalidParams`] if `params` does not have
    /// [`IntrinsicType::param_count`] values.
    pub fn new(
        model_type: IntrinsicType,
        base: IntrinsicBase,
        params: &[f64],
    ) -> Result<Self, CameraModelError> {
        let mut model = Self::with_defaults(model_type, base);
        if !model.update_from_params(params) {
            return Err(CameraModelError::InvalidParams(format!(
                "{} expects {} parameters, got {}",
                model_type,
                model_type.param_count(),
                params.len()
            )));
        }
        Ok(model)
    }

    fn as_model(&self) -> &dyn CameraModel {
        match self {
            CameraModelEnum::Pinhole(m) => m,
            CameraModelEnum::Radial3(m) => m,
            CameraModelEnum::Brown(m) => m,
            CameraModelEnum::Fisheye4(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn CameraModel {
        match self {
            CameraModelEnum::Pinhole(m) => m,
            CameraModelEnum::Radial3(m) => m,
            CameraModelEnum::Brown(m) => m,
            CameraModelEnum::Fisheye4(m) => m,
        }
    }

    /// Copies all state of `other` into `self`.
    ///
    /// # Errors
    ///
    /// [`CameraModelError::IncompatibleModel`] if the two models are different
    /// variants; `self` is left unchanged.
    pub fn assign(&mut self, other: &CameraModelEnum) -> Result<(), CameraModelError> {
        if self.get_type() != other.get_type() {
            return Err(CameraModelError::IncompatibleModel {
                expected: self.get_type(),
                found: other.get_type(),
            });
        }
        self.clone_from(other);
        Ok(())
    }

    pub fn to_record(&self) -> IntrinsicRecord {
        IntrinsicRecord {
            model_type: self.get_type().as_str().to_string(),
            base: self.base().clone(),
            params: self.get_params(),
        }
    }

    /// Rebuilds a model from its record, dispatching on `record.model_type`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::UnknownModel`] for an unsupported type name
    /// * [`CameraModelError::InvalidParams`] for a wrong parameter count
    pub fn from_record(record: &IntrinsicRecord) -> Result<Self, CameraModelError> {
        let model_type: IntrinsicType = record.model_type.parse()?;
        Self::new(model_type, record.base.clone(), &record.params)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CameraModelError> {
        let record: IntrinsicRecord = serde_json::from_str(json)?;
        Self::from_record(&record)
    }

    pub fn to_json_string(&self) -> Result<String, CameraModelError> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    /// Loads a single intrinsic record from a YAML file.
    pub fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, CameraModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let record: IntrinsicRecord = serde_yaml::from_str(&contents)?;
        let model = Self::from_record(&record)?;
        info!("Loaded {} intrinsic from {}", model.get_type(), path.display());
        Ok(model)
    }

    /// Saves the model as a single intrinsic record in a YAML file.
    pub fn save_to_yaml(&self, path: impl AsRef<Path>) -> Result<(), CameraModelError> {
        let path = path.as_ref();
        let yaml_string = serde_yaml::to_string(&self.to_record())?;
        fs::write(path, yaml_string)?;
        info!("Saved {} intrinsic to {}", self.get_type(), path.display());
        Ok(())
    }
}

/// Loads every record of a `{"intrinsics": [...]}` JSON document.
pub fn load_intrinsics_from_json(
    path: impl AsRef<Path>,
) -> Result<Vec<CameraModelEnum>, CameraModelError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let list: IntrinsicList = serde_json::from_str(&contents)?;
    let models = list
        .intrinsics
        .iter()
        .map(CameraModelEnum::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    info!("Loaded {} intrinsics from {}", models.len(), path.display());
    Ok(models)
}

impl PartialEq for CameraModelEnum {
    fn eq(&self, other: &Self) -> bool {
        self.same_intrinsic(other)
    }
}

impl From<PinholeModel> for CameraModelEnum {
    fn from(model: PinholeModel) -> Self {
        CameraModelEnum::Pinhole(model)
    }
}

impl From<Radial3Model> for CameraModelEnum {
    fn from(model: Radial3Model) -> Self {
        CameraModelEnum::Radial3(model)
    }
}

impl From<RadTanModel> for CameraModelEnum {
    fn from(model: RadTanModel) -> Self {
        CameraModelEnum::Brown(model)
    }
}

impl From<KannalaBrandtModel> for CameraModelEnum {
    fn from(model: KannalaBrandtModel) -> Self {
        CameraModelEnum::Fisheye4(model)
    }
}

impl CameraModel for CameraModelEnum {
    fn base(&self) -> &IntrinsicBase {
        self.as_model().base()
    }

    fn base_mut(&mut self) -> &mut IntrinsicBase {
        self.as_model_mut().base_mut()
    }

    fn get_type(&self) -> IntrinsicType {
        self.as_model().get_type()
    }

    fn get_params(&self) -> Vec<f64> {
        self.as_model().get_params()
    }

    fn update_from_params(&mut self, params: &[f64]) -> bool {
        self.as_model_mut().update_from_params(params)
    }

    fn cam2ima(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.as_model().cam2ima(p)
    }

    fn ima2cam(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.as_model().ima2cam(p)
    }

    fn have_disto(&self) -> bool {
        self.as_model().have_disto()
    }

    fn add_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.as_model().add_disto(p)
    }

    fn remove_disto(&self, p: &Vector2<f64>) -> Vector2<f64> {
        self.as_model().remove_disto(p)
    }

    fn image_plane_to_camera_plane_error(&self, value: f64) -> f64 {
        self.as_model().image_plane_to_camera_plane_error(value)
    }

    fn get_projective_equivalent(&self, pose: &Pose3) -> Matrix3x4<f64> {
        self.as_model().get_projective_equivalent(pose)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        self.as_model().validate_params()
    }

    fn bearing(&self, pixel: &Vector2<f64>) -> Vector3<f64> {
        self.as_model().bearing(pixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Intrinsics, UNKNOWN_FOCAL_LENGTH};
    use std::fs;

    fn get_sample_brown() -> CameraModelEnum {
        CameraModelEnum::new(
            IntrinsicType::Brown,
            IntrinsicBase::new(752, 480, "euroc-cam0"),
            &[461.629, 460.152, 362.68, 246.049, -0.2834, 0.0739, 0.0, 0.00019, 1.76e-5],
        )
        .unwrap()
    }

    #[test]
    fn test_factory_dispatch() {
        for t in IntrinsicType::ALL {
            let params = vec![1.0; t.param_count()];
            let model = CameraModelEnum::new(t, IntrinsicBase::new(10, 10, ""), &params).unwrap();
            assert_eq!(model.get_type(), t);
            assert_eq!(model.get_params(), params);
        }
        assert!(matches!(
            CameraModelEnum::new(IntrinsicType::Fisheye4, IntrinsicBase::default(), &[1.0; 4]),
            Err(CameraModelError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_equality_and_hash() {
        let a = get_sample_brown();
        let mut b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());

        // The focal prior takes no part in equality.
        b.set_initial_focal_length_pix(470.0);
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());

        b.set_serial_number("euroc-cam1");
        assert_ne!(a, b);
        assert_ne!(a.hash_value(), b.hash_value());

        let mut c = a.clone();
        let mut params = c.get_params();
        params[5] += 1e-6;
        assert!(c.update_from_params(&params));
        assert_ne!(a, c);
        assert_ne!(a.hash_value(), c.hash_value());

        let mut d = a.clone();
        d.set_height(481);
        assert_ne!(a, d);
        assert_ne!(a.hash_value(), d.hash_value());

        let mut e = a.clone();
        e.set_width(753);
        assert_ne!(a, e);
        assert_ne!(a.hash_value(), e.hash_value());
    }

    /// Same dimensions and parameters but a different model type.
    #[test]
    fn test_type_takes_part_in_equality() {
        let base = IntrinsicBase::new(640, 480, "");
        let params = [500.0, 500.0, 320.0, 240.0, 0.0, 0.0, 0.0];
        let radial = CameraModelEnum::new(IntrinsicType::Radial3, base.clone(), &params).unwrap();
        let mut fisheye_params = params.to_vec();
        fisheye_params.push(0.0);
        let fisheye =
            CameraModelEnum::new(IntrinsicType::Fisheye4, base, &fisheye_params).unwrap();
        assert_ne!(radial, fisheye);
        assert_ne!(radial.hash_value(), fisheye.hash_value());
    }

    #[test]
    fn test_assign() {
        let source = get_sample_brown();
        let mut target = CameraModelEnum::with_defaults(IntrinsicType::Brown, IntrinsicBase::default());
        target.assign(&source).unwrap();
        assert_eq!(target, source);
        assert_eq!(target.serial_number(), "euroc-cam0");

        let mut pinhole: CameraModelEnum = PinholeModel::new(
            IntrinsicBase::new(640, 480, ""),
            Intrinsics::default(),
        )
        .unwrap()
        .into();
        let before = pinhole.clone();
        let err = pinhole.assign(&source).unwrap_err();
        assert!(matches!(
            err,
            CameraModelError::IncompatibleModel {
                expected: IntrinsicType::Pinhole,
                found: IntrinsicType::Brown
            }
        ));
        assert_eq!(pinhole, before);
    }

    #[test]
    fn test_record_round_trip() {
        let mut model = get_sample_brown();
        model.set_initial_focal_length_pix(455.0);
        let json = model.to_json_string().unwrap();
        let loaded = CameraModelEnum::from_json_str(&json).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.initial_focal_length_pix(), 455.0);
    }

    #[test]
    fn test_legacy_record() {
        let json = r#"{"type": "pinhole", "width": 640, "height": 480, "params": [500, 500, 320, 240]}"#;
        let model = CameraModelEnum::from_json_str(json).unwrap();
        assert_eq!(model.serial_number(), "");
        assert_eq!(model.initial_focal_length_pix(), UNKNOWN_FOCAL_LENGTH);
        assert_eq!(model.get_params(), vec![500.0, 500.0, 320.0, 240.0]);
        assert!(model.is_valid());
    }

    #[test]
    fn test_record_unknown_type() {
        let json = r#"{"type": "division", "width": 640, "height": 480, "params": [1.0]}"#;
        assert!(matches!(
            CameraModelEnum::from_json_str(json),
            Err(CameraModelError::UnknownModel(name)) if name == "division"
        ));
    }

    #[test]
    fn test_load_from_yaml() {
        let model = CameraModelEnum::load_from_yaml("samples/brown.yaml").unwrap();
        assert_eq!(model.get_type(), IntrinsicType::Brown);
        assert_eq!(model.width(), 752);
        assert_eq!(model.height(), 480);
        assert_eq!(model.serial_number(), "euroc-cam0");
        assert_eq!(model.initial_focal_length_pix(), 461.0);
        assert_eq!(model.get_params()[0], 461.629);
        assert_eq!(model.get_params()[4], -0.28340811);
    }

    #[test]
    fn test_load_legacy_yaml() {
        let model = CameraModelEnum::load_from_yaml("samples/pinhole_legacy.yaml").unwrap();
        assert_eq!(model.get_type(), IntrinsicType::Pinhole);
        assert_eq!(model.serial_number(), "");
        assert_eq!(model.initial_focal_length_pix(), UNKNOWN_FOCAL_LENGTH);
    }

    #[test]
    fn test_save_to_yaml() {
        fs::create_dir_all("output").expect("Failed to create output directory for test.");
        let output_path = "output/brown_saved.yaml";

        let model = CameraModelEnum::load_from_yaml("samples/brown.yaml").unwrap();
        model.save_to_yaml(output_path).unwrap();
        let saved = CameraModelEnum::load_from_yaml(output_path).unwrap();

        assert_eq!(model, saved);
        assert_eq!(model.hash_value(), saved.hash_value());
        assert_eq!(model.initial_focal_length_pix(), saved.initial_focal_length_pix());

        fs::remove_file(output_path).unwrap();
    }

    #[test]
    fn test_load_intrinsics_from_json() {
        let models = load_intrinsics_from_json("samples/intrinsics.json").unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[0].get_type(), IntrinsicType::Pinhole);
        assert_eq!(models[1].get_type(), IntrinsicType::Fisheye4);
        assert_eq!(models[2].get_type(), IntrinsicType::Pinhole);
        // Shots from the same body share the same parameters.
        assert_eq!(models[0], models[2]);
        assert_eq!(models[0].hash_value(), models[2].hash_value());
        assert_eq!(models[1].serial_number(), "");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CameraModelEnum::load_from_yaml("samples/does_not_exist.yaml"),
            Err(CameraModelError::IOError(_))
        ));
    }
}
