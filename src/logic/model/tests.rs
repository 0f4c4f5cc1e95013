//! Cross-detector tests

use ndarray::Array2;
use tempfile::tempdir;

use super::*;
use crate::config::Settings;
use crate::error::PipelineError;

/// 20 ordinary rows around 1.0 and two far-off rows
fn batch() -> Array2<f64> {
    Array2::from_shape_fn((22, 9), |(i, j)| match i {
        20 => 0.05,
        21 => 8.0 + j as f64,
        _ => 1.0 + ((i * 5 + j * 2) % 7) as f64 * 0.05,
    })
}

fn detectors() -> Vec<Box<dyn AnomalyDetector>> {
    let settings = Settings::default();
    vec![
        create_detector(ModelKind::IsolationForest, &settings, None),
        create_detector(ModelKind::Autoencoder, &settings, None),
        Box::new(AutoencoderDetector::new(AutoencoderConfig {
            backend: ReconstructionBackend::Statistical,
            ..Default::default()
        })),
    ]
}

#[test]
fn test_model_kind_parsing() {
    assert_eq!("isolation_forest".parse::<ModelKind>().unwrap(), ModelKind::IsolationForest);
    assert_eq!("Autoencoder".parse::<ModelKind>().unwrap(), ModelKind::Autoencoder);
    assert!(matches!("svm".parse::<ModelKind>(), Err(PipelineError::UnknownModel(_))));
    assert_eq!(ModelKind::Autoencoder.to_string(), "autoencoder");
}

#[test]
fn test_scores_bounded_and_aligned() {
    let data = batch();
    for mut detector in detectors() {
        let prediction = detector.fit_predict(&data).unwrap();
        assert_eq!(prediction.scores.len(), data.nrows(), "{}", detector.kind());
        assert_eq!(prediction.flags.len(), data.nrows());
        assert!(prediction.scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}

#[test]
fn test_far_row_outscores_ordinary_rows() {
    let data = batch();
    let settings = Settings::default();
    let mut forest = create_detector(ModelKind::IsolationForest, &settings, None);
    let mut statistical: Box<dyn AnomalyDetector> = Box::new(AutoencoderDetector::new(AutoencoderConfig {
        backend: ReconstructionBackend::Statistical,
        ..Default::default()
    }));

    for detector in [&mut forest, &mut statistical] {
        let prediction = detector.fit_predict(&data).unwrap();
        let ordinary_max = prediction.scores[..20].iter().copied().fold(0.0, f64::max);
        assert!(prediction.scores[21] > ordinary_max, "{}", detector.kind());
    }
}

#[test]
fn test_explanation_and_risk_level() {
    for mut detector in detectors() {
        detector.fit(&batch()).unwrap();
        let text = detector
            .generate_explanation(&FeatureVector::new(), 0.9, true)
            .unwrap();
        assert!(!text.is_empty());
        assert_eq!(detector.get_risk_level(0.9), RiskLevel::Critical);
        assert_eq!(detector.get_risk_level(0.1), RiskLevel::Low);
    }
}

#[test]
fn test_save_load_reproduces_predictions() {
    let dir = tempdir().unwrap();
    let data = batch();
    let settings = Settings::default();

    for (i, mut detector) in detectors().into_iter().enumerate() {
        let path = dir.path().join(format!("model-{}.json", i));
        let before = detector.fit_predict(&data).unwrap();
        detector.save(&path).unwrap();

        let mut restored = create_detector(detector.kind(), &settings, None);
        assert!(!restored.is_fitted());
        restored.load(&path).unwrap();
        let after = restored.predict(&data).unwrap();

        assert_eq!(before.flags, after.flags);
        for (a, b) in before.scores.iter().zip(&after.scores) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

#[test]
fn test_load_wrong_kind_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("forest.json");
    let settings = Settings::default();

    let mut forest = create_detector(ModelKind::IsolationForest, &settings, None);
    forest.fit(&batch()).unwrap();
    forest.save(&path).unwrap();

    let mut autoencoder = create_detector(ModelKind::Autoencoder, &settings, None);
    let err = autoencoder.load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::ModelKindMismatch { .. }));
    assert!(!autoencoder.is_fitted());
}

#[test]
fn test_save_unfitted_fails() {
    let dir = tempdir().unwrap();
    for detector in detectors() {
        let err = detector.save(&dir.path().join("x.json")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted));
    }
}

#[test]
fn test_dimension_mismatch_on_predict() {
    for mut detector in detectors() {
        detector.fit(&batch()).unwrap();
        let err = detector.predict(&Array2::zeros((2, 4))).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { expected: 9, actual: 4 }));
    }
}

#[test]
fn test_apply_threshold_is_inclusive() {
    let mut prediction = Prediction { scores: vec![0.2, 0.5, 0.9], flags: vec![true, false, false] };
    prediction.apply_threshold(0.5);
    assert_eq!(prediction.flags, vec![false, true, true]);
    assert_eq!(prediction.suspicious_count(), 2);
}

#[test]
fn test_score_threshold_replaces_native_flags() {
    let data = batch();
    let settings = Settings::default();
    for kind in [ModelKind::IsolationForest, ModelKind::Autoencoder] {
        let mut detector = create_detector(kind, &settings, Some(0.5));
        let prediction = detector.fit_predict(&data).unwrap();
        let expected: Vec<bool> = prediction.scores.iter().map(|&s| s >= 0.5).collect();
        assert_eq!(prediction.flags, expected, "{}", kind);
    }
}
