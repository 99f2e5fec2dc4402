//! Laws every intrinsic model must satisfy, checked on each variant.

use approx::assert_relative_eq;
use nalgebra::{Vector2, Vector3};
use sfm_intrinsics::camera::{CameraModel, CameraModelEnum, IntrinsicBase, IntrinsicType};
use sfm_intrinsics::geometry::Pose3;

fn sample_models() -> Vec<CameraModelEnum> {
    let base = IntrinsicBase::new(1280, 960, "contract");
    vec![
        CameraModelEnum::new(IntrinsicType::Pinhole, base.clone(), &[700.0, 705.0, 640.0, 480.0])
            .unwrap(),
        CameraModelEnum::new(
            IntrinsicType::Radial3,
            base.clone(),
            &[700.0, 705.0, 640.0, 480.0, -0.1, 0.02, -0.001],
        )
        .unwrap(),
        CameraModelEnum::new(
            IntrinsicType::Brown,
            base.clone(),
            &[700.0, 705.0, 640.0, 480.0, -0.2, 0.05, 0.0, 0.0005, -0.0003],
        )
        .unwrap(),
        CameraModelEnum::new(
            IntrinsicType::Fisheye4,
            base,
            &[400.0, 400.0, 640.0, 480.0, 0.03, -0.004, 0.001, -0.0002],
        )
        .unwrap(),
    ]
}

fn camera_plane_points() -> Vec<Vector2<f64>> {
    let mut points = Vec::new();
    for i in -3..=3 {
        for j in -3..=3 {
            points.push(Vector2::new(i as f64 * 0.12, j as f64 * 0.1));
        }
    }
    points
}

#[test]
fn test_projection_residual_round_trip() {
    let pose = Pose3::from_axis_angle(&Vector3::new(0.1, -0.05, 0.2), Vector3::new(0.3, -0.2, -5.0));
    let points = [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, -0.5, 2.0),
        Vector3::new(-1.2, 0.8, -1.0),
    ];
    for model in sample_models() {
        for point in &points {
            let projected = model.project(&pose, point, false);
            let residual = model.residual(&pose, point, &projected);
            if model.have_disto() {
                // `residual` always applies distortion.
                let distorted = model.project(&pose, point, true);
                assert_relative_eq!(
                    model.residual(&pose, point, &distorted),
                    Vector2::zeros(),
                    epsilon = 1e-9
                );
            } else {
                assert_relative_eq!(residual, Vector2::zeros(), epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_params_round_trip() {
    for mut model in sample_models() {
        let params = model.get_params();
        assert_eq!(params.len(), model.get_type().param_count());
        assert!(model.update_from_params(&params));
        assert_eq!(model.get_params(), params);

        let mut too_long = params.clone();
        too_long.push(0.0);
        assert!(!model.update_from_params(&too_long));
        assert_eq!(model.get_params(), params);
    }
}

#[test]
fn test_distortion_inverse() {
    for model in sample_models() {
        for p in camera_plane_points() {
            let back = model.remove_disto(&model.add_disto(&p));
            assert_relative_eq!(back, p, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_fisheye_distortion_inverse_wide_angle() {
    let model = sample_models().remove(3);
    assert_eq!(model.get_type(), IntrinsicType::Fisheye4);
    // Incidence angles from 80 to 86 degrees.
    for theta in [1.40_f64, 1.45, 1.50] {
        for direction in [Vector2::new(1.0, 0.0), Vector2::new(0.6, -0.8)] {
            let p = direction * theta.tan();
            let back = model.remove_disto(&model.add_disto(&p));
            assert_relative_eq!(back, p, max_relative = 1e-8);
        }
    }
}

#[test]
fn test_cam2ima_ima2cam_inverse() {
    for model in sample_models() {
        for p in camera_plane_points() {
            assert_relative_eq!(model.ima2cam(&model.cam2ima(&p)), p, epsilon = 1e-12);
        }
        for q in [Vector2::new(0.0, 0.0), Vector2::new(1279.5, 959.5), Vector2::new(321.0, 17.25)] {
            assert_relative_eq!(model.cam2ima(&model.ima2cam(&q)), q, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_pixel_undistortion_wrappers() {
    for model in sample_models() {
        let pixel = Vector2::new(900.0, 300.0);
        let undistorted = model.get_ud_pixel(&pixel);
        assert_relative_eq!(model.get_d_pixel(&undistorted), pixel, epsilon = 1e-6);
    }
}

#[test]
fn test_bearing_points_at_projected_point() {
    let pose = Pose3::from_axis_angle(&Vector3::new(0.0, 0.1, 0.0), Vector3::new(0.0, 0.0, -3.0));
    let point = Vector3::new(0.7, -0.4, 1.0);
    for model in sample_models() {
        let pixel = model.project(&pose, &point, true);
        let world_ray = pose.rotation().transpose() * model.bearing(&pixel);
        assert_relative_eq!(
            world_ray.normalize(),
            (point - pose.center()).normalize(),
            epsilon = 1e-8
        );
    }
}

#[test]
fn test_equal_models_hash_alike() {
    for (a, b) in sample_models().into_iter().zip(sample_models()) {
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
    }
    let models = sample_models();
    for i in 0..models.len() {
        for j in (i + 1)..models.len() {
            assert_ne!(models[i], models[j]);
            assert_ne!(models[i].hash_value(), models[j].hash_value());
        }
    }
}

#[test]
fn test_clone_is_independent() {
    let original = sample_models().remove(2);
    let mut copy = original.clone();
    let mut params = copy.get_params();
    params[0] = 1.0;
    assert!(copy.update_from_params(&params));
    assert_eq!(original.get_params()[0], 700.0);
    assert_ne!(original, copy);
}
