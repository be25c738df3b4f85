use std::path::PathBuf;

use candle_core::{Device, Tensor};
use phylo_clip::{
    cosine_scores, l2_normalize, load_default_classifier, preprocess_image, resolve_model_dir, FakeClassifier,
};
use phylo_core::config::ClassifierSettings;
use phylo_core::traits::ZeroShotClassifier;

#[test]
fn l2_normalize_rows() {
    let dev = Device::Cpu;
    let t = Tensor::from_slice(&[3.0f32, 4.0, 0.0, 2.0], (2, 2), &dev).unwrap();
    let v: Vec<Vec<f32>> = l2_normalize(&t).unwrap().to_vec2().unwrap();
    assert!((v[0][0] - 0.6).abs() < 1e-5 && (v[0][1] - 0.8).abs() < 1e-5);
    assert!(v[1][0].abs() < 1e-6 && (v[1][1] - 1.0).abs() < 1e-5);
}

#[test]
fn cosine_scores_shape_and_values() {
    let dev = Device::Cpu;
    let images = Tensor::from_slice(&[2.0f32, 0.0, 0.0, 5.0, 1.0, 1.0], (3, 2), &dev).unwrap();
    let texts = Tensor::from_slice(&[1.0f32, 0.0, 0.0, 3.0], (2, 2), &dev).unwrap();
    let s: Vec<Vec<f32>> = cosine_scores(&images, &texts).unwrap().to_vec2().unwrap();
    assert_eq!(s.len(), 3);
    assert!(s.iter().all(|row| row.len() == 2));
    assert!((s[0][0] - 1.0).abs() < 1e-5 && s[0][1].abs() < 1e-5);
    assert!(s[1][0].abs() < 1e-5 && (s[1][1] - 1.0).abs() < 1e-5);
    assert!((s[2][0] - s[2][1]).abs() < 1e-5);
}

#[test]
fn fake_classifier_is_deterministic() {
    let images = vec![PathBuf::from("/a/cat.jpg"), PathBuf::from("/b/dog.png")];
    let prompts = vec!["a photo of animal".to_string(), "a photo of map".to_string(), "a photo of food".to_string()];
    let first = FakeClassifier.classify(&images, &prompts).expect("classify");
    let second = FakeClassifier.classify(&images, &prompts).expect("classify");
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|row| row.len() == 3 && row.iter().all(|s| (0.0..=1.0).contains(s))));
}

#[test]
fn fake_classifier_selected_by_env() {
    std::env::set_var("APP_USE_FAKE_CLASSIFIER", "1");
    let classifier = load_default_classifier(&ClassifierSettings::default()).expect("fake classifier");
    assert_eq!(classifier.model_id(), "fake");
}

#[test]
fn configured_model_dir_needs_weights_and_tokenizer() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("model.safetensors"), b"").expect("write");
    std::fs::write(dir.path().join("tokenizer.json"), b"{}").expect("write");
    let settings = ClassifierSettings { model_dir: Some(dir.path().to_string_lossy().into_owned()) };
    assert_eq!(resolve_model_dir(&settings), Some(dir.path().to_path_buf()));
}

#[test]
fn preprocessing_crops_to_square_and_applies_clip_statistics() {
    let white = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(300, 200, image::Rgb([255, 255, 255])));
    let t = preprocess_image(&white, 224).unwrap();
    assert_eq!(t.dims(), &[3, 224, 224]);
    let v: Vec<Vec<Vec<f32>>> = t.to_vec3().unwrap();
    let expected = [(1.0 - 0.481_454_66) / 0.268_629_54, (1.0 - 0.457_827_5) / 0.261_302_58, (1.0 - 0.408_210_73) / 0.275_777_1];
    for (c, want) in expected.iter().enumerate() {
        assert!((v[c][0][0] - want).abs() < 1e-3, "channel {c}: {}", v[c][0][0]);
        assert!((v[c][223][223] - want).abs() < 1e-3);
    }

    let black = image::DynamicImage::ImageRgb8(image::RgbImage::new(100, 400));
    let v: Vec<Vec<Vec<f32>>> = preprocess_image(&black, 224).unwrap().to_vec3().unwrap();
    assert!((v[0][112][112] + 0.481_454_66 / 0.268_629_54).abs() < 1e-3);
}
