use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use stagecal_board::{BoardCalibConfig, BoardCalibModel};
use stagecal_core::{
    synthetic::{grid_points_2d, offsets_through, UniformOffsetNoise},
    AffineParams, CalibError, Pt2, Vec2,
};
use tempfile::NamedTempFile;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("board_3x3.json")
}

#[test]
fn legacy_fixture_loads() {
    let model = BoardCalibModel::load(fixture_path()).expect("load board_3x3.json");
    let grid = model.grid();
    assert_eq!(grid.cells(), 9);
    assert_eq!(grid.mov_type(), 2);
    assert_eq!(grid.start(), Pt2::new(100.0, 50.0));
    assert_eq!(model.shot_positions()[5], Pt2::new(140.0, 70.0));
    assert_eq!(model.vision_offsets()[8], Vec2::new(-0.014, 0.018));
}

#[test]
fn fixture_lookup_reproduces_shot_offsets() {
    let model = BoardCalibModel::load(fixture_path()).unwrap();
    for (shot, offset) in model.shot_positions().iter().zip(model.vision_offsets()) {
        let got = model.mach_to_board_coord(shot).unwrap();
        assert_relative_eq!(got, *offset, epsilon = 1e-12);
    }
}

#[test]
fn normalization_shrinks_rotation_residuals() {
    let mut model = BoardCalibModel::load(fixture_path()).unwrap();
    let before = model.residual_summary();
    let params = model.angle_normalization(false).unwrap();
    let after = model.residual_summary();

    assert!(after.rms < before.rms, "{after:?} vs {before:?}");
    // the fixture encodes a small rotation: shear terms of opposite sign
    assert!(params.b() * params.d() < 0.0);
}

#[test]
fn synthetic_distortion_is_recovered() {
    let distortion = AffineParams::new(1.0005, 0.0012, 0.05, -0.0012, 0.9995, -0.03);
    let shots = grid_points_2d(4, 3, Pt2::new(-30.0, -20.0), Vec2::new(20.0, 20.0));
    let mut offsets = offsets_through(&distortion, &shots).unwrap();
    UniformOffsetNoise {
        seed: 11,
        max_abs_mm: 1e-4,
    }
    .apply_all(&mut offsets);

    let vision: Vec<_> = offsets
        .iter()
        .enumerate()
        .map(|(i, o)| serde_json::json!([i, o.x, o.y]))
        .collect();
    let shot_list: Vec<_> = shots
        .iter()
        .enumerate()
        .map(|(i, s)| serde_json::json!([i, s.x, s.y]))
        .collect();
    let json = serde_json::json!({
        "start_x": -30.0, "start_y": -20.0,
        "step_x": 20.0, "step_y": 20.0,
        "end_x": 30.0, "end_y": 20.0,
        "total_x_num": 4, "total_y_num": 3,
        "vision_offsets": vision,
        "shot_positions": shot_list,
    });
    let mut model = BoardCalibModel::from_json_str(&json.to_string()).unwrap();
    let params = model.angle_normalization(false).unwrap();

    for (a, b) in params.coeffs().iter().zip(distortion.coeffs()) {
        assert_relative_eq!(*a, b, epsilon = 1e-3);
    }
    assert!(model.residual_summary().max < 5e-4);
}

#[test]
fn lock_scale_config_applies_on_load() {
    let config = BoardCalibConfig {
        lock_scale: true,
        normalize_on_load: true,
    };
    let normalized = BoardCalibModel::load_with_config(fixture_path(), &config).unwrap();
    let raw = BoardCalibModel::load(fixture_path()).unwrap();
    assert_ne!(normalized.vision_offsets(), raw.vision_offsets());

    let untouched = BoardCalibModel::load_with_config(
        fixture_path(),
        &BoardCalibConfig {
            normalize_on_load: false,
            ..config
        },
    )
    .unwrap();
    assert_eq!(untouched, raw);
}

#[test]
fn save_and_reload_roundtrip() {
    let mut model = BoardCalibModel::load(fixture_path()).unwrap();
    model.angle_normalization(true).unwrap();

    let file = NamedTempFile::new().unwrap();
    model.save_json(file.path()).unwrap();

    let mut other = BoardCalibModel::load(fixture_path()).unwrap();
    other.reload(file.path()).unwrap();
    assert_eq!(other, model);
}

#[test]
fn failed_reload_keeps_previous_state() {
    let mut model = BoardCalibModel::load(fixture_path()).unwrap();
    let snapshot = model.clone();

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "{ not json").unwrap();
    let err = model.reload(file.path()).unwrap_err();
    assert!(matches!(err, CalibError::Load(_)));
    assert_eq!(err.status_code().code(), -1);
    assert_eq!(model, snapshot);

    let err = model.reload("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, CalibError::Load(_)));
    assert_eq!(model, snapshot);
}
