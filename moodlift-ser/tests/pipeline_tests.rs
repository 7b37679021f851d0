//! End-to-end inference pipeline tests
//!
//! Real audio front end (symphonia, rubato, hound) with stub or randomly
//! initialized networks.

mod helpers;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use helpers::{energy_model, silent_wav, sine_wav, stereo_sine_wav, stub_pipeline, FailingNetwork};
use moodlift_common::CanonicalMap;
use moodlift_ser::audio::{AudioNormalizer, SignalLoader};
use moodlift_ser::inference::wav2vec2::{Wav2Vec2Config, Wav2Vec2ForSequenceClassification};
use moodlift_ser::inference::{EmotionModel, LabelTable, PreprocessorConfig};
use moodlift_ser::{InferencePipeline, Stage, StageError};
use std::sync::Arc;

#[test]
fn test_two_seconds_of_silence() {
    let wav = silent_wav(2000, 16_000);

    let waveform = SignalLoader::default()
        .load(&AudioNormalizer::default().normalize(&wav, "wav").unwrap())
        .unwrap();
    assert_eq!(waveform.len(), 32_000);

    let predictions = stub_pipeline().run(&wav, "wav").unwrap();
    assert_eq!(predictions.len(), 3);
    // Uniform distribution: first three labels in index order
    let names: Vec<&str> = predictions.iter().map(|p| p.emotion.as_str()).collect();
    assert_eq!(names, vec!["angry", "calm", "disgust"]);
    assert!(predictions.iter().all(|p| p.confidence == 0.125));
}

#[test]
fn test_predictions_sorted_and_bounded() {
    let wav = sine_wav(1500, 22_050, 330.0, 0.4);
    let predictions = stub_pipeline().run(&wav, "wav").unwrap();

    assert_eq!(predictions.len(), 3);
    for p in &predictions {
        assert!((0.0..=1.0).contains(&p.confidence));
    }
    assert!(predictions
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));
}

#[test]
fn test_distribution_sums_to_one() {
    let model = energy_model(&helpers::RAW_LABELS);
    let wav = sine_wav(1000, 16_000, 440.0, 0.3);

    let waveform = SignalLoader::default()
        .load(&AudioNormalizer::default().normalize(&wav, "wav").unwrap())
        .unwrap();
    let features = model.feature_extractor().extract(&waveform).unwrap();
    let dist = model.classify(&features).unwrap();

    assert_eq!(dist.len(), 8);
    assert!((dist.sum() - 1.0).abs() < 1e-9);
    assert!(dist.probabilities().iter().all(|&p| p >= 0.0));
}

#[test]
fn test_stereo_44k_top_emotion_is_stable() {
    let wav = stereo_sine_wav(2000, 44_100, 220.0, 660.0, 0.5);
    let pipeline = stub_pipeline();

    let first = pipeline.run(&wav, "wav").unwrap();
    for _ in 0..3 {
        let again = pipeline.run(&wav, "wav").unwrap();
        assert_eq!(again[0].emotion, first[0].emotion);
        assert_eq!(again, first);
    }
}

#[test]
fn test_normalize_then_load_is_bit_identical() {
    let wav = stereo_sine_wav(750, 48_000, 300.0, 500.0, 0.6);
    let normalizer = AudioNormalizer::default();
    let loader = SignalLoader::default();

    let a = loader.load(&normalizer.normalize(&wav, "wav").unwrap()).unwrap();
    let b = loader.load(&normalizer.normalize(&wav, "wav").unwrap()).unwrap();

    assert_eq!(a.samples().len(), b.samples().len());
    assert!(a
        .samples()
        .iter()
        .zip(b.samples())
        .all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn test_empty_bytes_never_succeed() {
    let err = stub_pipeline().run(&[], "webm").unwrap_err();
    assert_eq!(err.stage, Stage::Decode);
    assert!(matches!(
        err.error,
        StageError::Decode(_) | StageError::EmptySignal
    ));
    assert!(err.is_input_error());
}

#[test]
fn test_malformed_bytes_tagged_decode() {
    let garbage = b"definitely not an audio container ".repeat(64);
    let err = stub_pipeline().run(&garbage, "webm").unwrap_err();
    assert_eq!(err.stage, Stage::Decode);
    assert!(matches!(err.error, StageError::Decode(_)));
}

#[test]
fn test_truncated_wav_tagged_decode() {
    let wav = sine_wav(500, 16_000, 440.0, 0.5);
    let err = stub_pipeline().run(&wav[..30], "wav").unwrap_err();
    assert_eq!(err.stage, Stage::Decode);
}

#[test]
fn test_header_only_wav_is_empty_signal() {
    let wav = silent_wav(0, 16_000);
    let err = stub_pipeline().run(&wav, "wav").unwrap_err();
    assert!(matches!(err.error, StageError::EmptySignal | StageError::Decode(_)));
    assert!(err.is_input_error());
}

#[test]
fn test_unknown_raw_label_returned_lowercased() {
    let labels = ["Bored", "Sleepy", "Hungry"];
    let model = energy_model(&labels);
    let pipeline = InferencePipeline::new(Arc::new(model), CanonicalMap::default());

    let predictions = pipeline.run(&silent_wav(1000, 16_000), "wav").unwrap();
    let names: Vec<&str> = predictions.iter().map(|p| p.emotion.as_str()).collect();
    assert_eq!(names, vec!["bored", "sleepy", "hungry"]);
}

#[test]
fn test_too_few_classes_fails_at_rank() {
    let model = energy_model(&["happy", "sad"]);
    let pipeline = InferencePipeline::new(Arc::new(model), CanonicalMap::default());

    let err = pipeline.run(&sine_wav(500, 16_000, 440.0, 0.5), "wav").unwrap_err();
    assert_eq!(err.stage, Stage::Rank);
    assert!(matches!(err.error, StageError::InvalidArgument(_)));
    assert!(!err.is_input_error());
}

#[test]
fn test_network_failure_tagged_classify() {
    let model = EmotionModel::from_parts(
        "failing",
        Box::new(FailingNetwork),
        LabelTable::new(helpers::RAW_LABELS.iter().map(|s| s.to_string()).collect()),
        PreprocessorConfig::default(),
    )
    .unwrap();
    let pipeline = InferencePipeline::new(Arc::new(model), CanonicalMap::default());

    let err = pipeline.run(&sine_wav(500, 16_000, 440.0, 0.5), "wav").unwrap_err();
    assert_eq!(err.stage, Stage::Classify);
    assert!(matches!(err.error, StageError::Inference(_)));
}

#[test]
fn test_unsupported_recipe_tagged_extract() {
    // Recipe asks for multi-dimensional features, raw waveform models use 1
    let model = EmotionModel::from_parts(
        "mismatched",
        Box::new(FailingNetwork),
        LabelTable::new(helpers::RAW_LABELS.iter().map(|s| s.to_string()).collect()),
        PreprocessorConfig {
            feature_size: 2,
            ..Default::default()
        },
    )
    .unwrap();
    let pipeline = InferencePipeline::new(Arc::new(model), CanonicalMap::default());

    let err = pipeline.run(&sine_wav(500, 16_000, 440.0, 0.5), "wav").unwrap_err();
    assert_eq!(err.stage, Stage::Extract);
    assert!(err.is_input_error());
}

#[test]
fn test_short_clip_padded_to_receptive_field() {
    // 10 ms is 160 samples, below the stub network's 400-sample minimum
    let model = energy_model(&helpers::RAW_LABELS);
    let waveform = SignalLoader::default()
        .load(
            &AudioNormalizer::default()
                .normalize(&sine_wav(10, 16_000, 440.0, 0.5), "wav")
                .unwrap(),
        )
        .unwrap();

    let features = model.feature_extractor().extract(&waveform).unwrap();
    assert_eq!(features.shape(), [1, 400]);
    assert_eq!(features.valid_len(), 160);
}

#[test]
fn test_concurrent_runs_share_one_model() {
    let pipeline = Arc::new(stub_pipeline());
    let wav = Arc::new(sine_wav(800, 16_000, 440.0, 0.5));

    let expected = pipeline.run(&wav, "wav").unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            let wav = wav.clone();
            std::thread::spawn(move || pipeline.run(&wav, "wav").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_random_wav2vec2_end_to_end() {
    let config: Wav2Vec2Config = serde_json::from_value(serde_json::json!({
        "hidden_size": 16,
        "num_hidden_layers": 2,
        "num_attention_heads": 4,
        "intermediate_size": 32,
        "conv_dim": [8, 8, 8],
        "conv_kernel": [10, 3, 3],
        "conv_stride": [5, 2, 2],
        "num_conv_pos_embeddings": 8,
        "num_conv_pos_embedding_groups": 4,
        "feat_extract_norm": "layer",
        "conv_bias": true,
        "do_stable_layer_norm": true,
        "classifier_proj_size": 8
    }))
    .unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let network = Wav2Vec2ForSequenceClassification::load(&config, 8, vb).unwrap();
    let labels = LabelTable::new(helpers::RAW_LABELS.iter().map(|s| s.to_string()).collect());
    let model =
        EmotionModel::from_parts("random", Box::new(network), labels, PreprocessorConfig::default())
            .unwrap();
    let pipeline = InferencePipeline::new(Arc::new(model), CanonicalMap::default());

    let wav = stereo_sine_wav(1000, 44_100, 200.0, 400.0, 0.5);
    let first = pipeline.run(&wav, "wav").unwrap();
    let second = pipeline.run(&wav, "wav").unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].confidence >= w[1].confidence));
}
