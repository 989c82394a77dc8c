//! End-to-end pipeline tests against mocked capabilities.

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::sync::{Arc, Barrier, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use image::GenericImageView;
use leukoscan_core::domain::{
    Capability, Outcome, PipelineError, NO_FACE_WARNING, WRONG_EYE_COUNT_WARNING,
};
use leukoscan_core::geometry::to_inference;
use leukoscan_core::ingress::{handle, ResponseBody};
use leukoscan_core::{
    decode, CancellationToken, Capabilities, EyeSide, Pipeline, PipelineConfig, RetryPolicy,
};
use leukoscan_test_support::{
    mean_brightness, FaceScene, MockClassifier, MockDetector, MockResultStore,
    SyntheticImageBuilder,
};

struct Harness {
    face: Arc<MockDetector>,
    eyes: Arc<MockDetector>,
    iris: Arc<MockDetector>,
    classifier: Arc<MockClassifier>,
    pipeline: Pipeline,
}

impl Harness {
    fn new(
        face: MockDetector,
        eyes: MockDetector,
        iris: MockDetector,
        classifier: MockClassifier,
    ) -> Self {
        let face = Arc::new(face);
        let eyes = Arc::new(eyes);
        let iris = Arc::new(iris);
        let classifier = Arc::new(classifier);

        let config = PipelineConfig {
            retry: RetryPolicy {
                max_retries: 1,
                backoff: Duration::ZERO,
            },
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(
            Capabilities {
                face: face.clone(),
                eyes: eyes.clone(),
                iris: iris.clone(),
                classifier: classifier.clone(),
            },
            config,
        );

        Self {
            face,
            eyes,
            iris,
            classifier,
            pipeline,
        }
    }

    /// Standard setup: one face, both eyes found, iris centered in every crop.
    fn for_scene(
        scene: &FaceScene,
        eye_confidences: (f32, f32),
        classifier: MockClassifier,
    ) -> Self {
        let (w, h) = scene.image.dimensions();
        Self::new(
            MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(w, h)]),
            MockDetector::returning(
                "eyes",
                scene.eyes_with_confidence(eye_confidences.0, eye_confidences.1),
            ),
            centered_iris_detector(),
            classifier,
        )
    }
}

fn centered_iris_detector() -> MockDetector {
    MockDetector::from_fn("iris", |crop| {
        Ok(vec![SyntheticImageBuilder::centered_iris(
            crop.width(),
            crop.height(),
        )])
    })
}

/// Finds an iris only in crops brighter than mid-gray.
fn bright_only_iris_detector() -> MockDetector {
    MockDetector::from_fn("iris", |crop| {
        if mean_brightness(&crop.to_rgb8()) > 0.5 {
            Ok(vec![SyntheticImageBuilder::centered_iris(
                crop.width(),
                crop.height(),
            )])
        } else {
            Ok(Vec::new())
        }
    })
}

fn scene() -> FaceScene {
    SyntheticImageBuilder::face_scene(400, 300, 230, 26)
}

#[test]
fn test_left_flagged_right_clear() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::by_brightness());
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert_eq!(result.flag(EyeSide::Left), Some(true));
    assert_eq!(result.flag(EyeSide::Right), Some(false));
    assert!(result.warnings.is_empty());
    assert!(result.any_leukocoria());
    assert_eq!(h.classifier.calls(), 2);
    assert_eq!(h.iris.calls(), 2);

    let pair = result.eyes().unwrap();
    let left_score = pair.left.classification.unwrap().score;
    assert!((left_score - 230.0 / 255.0).abs() < 0.02);
    assert_eq!(pair.left.enhanced.as_ref().unwrap().width(), 224);
}

#[test]
fn test_eyes_are_processed_concurrently() {
    let scene = scene();
    let (w, h) = scene.image.dimensions();
    // Both iris calls must be in flight at once to pass the barrier.
    let barrier = Arc::new(Barrier::new(2));
    let threads: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));

    let iris = {
        let barrier = Arc::clone(&barrier);
        let threads = Arc::clone(&threads);
        MockDetector::from_fn("iris", move |crop| {
            threads.lock().unwrap().push(thread::current().id());
            barrier.wait();
            Ok(vec![SyntheticImageBuilder::centered_iris(
                crop.width(),
                crop.height(),
            )])
        })
    };
    let harness = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(w, h)]),
        MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.9)),
        iris,
        MockClassifier::by_brightness(),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = harness
        .pipeline
        .run(&decoded, &CancellationToken::new())
        .unwrap();

    assert_eq!(result.flag(EyeSide::Left), Some(true));
    assert_eq!(result.flag(EyeSide::Right), Some(false));
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    assert_ne!(threads[0], threads[1]);
}

#[test]
fn test_side_assignment_ignores_detector_order() {
    let scene = scene();
    let mut eyes = scene.eyes_with_confidence(0.9, 0.8);
    eyes.reverse();
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(400, 300)]),
        MockDetector::returning("eyes", eyes),
        centered_iris_detector(),
        MockClassifier::by_brightness(),
    );

    let decoded = decode(&scene.png_bytes()).unwrap();
    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert_eq!(result.flag(EyeSide::Left), Some(true));
    assert_eq!(result.flag(EyeSide::Right), Some(false));
    let pair = result.eyes().unwrap();
    assert!(pair.left.crop.bounds.x1 < pair.right.crop.bounds.x1);
}

#[test]
fn test_one_eye_below_threshold() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.5, 0.9), MockClassifier::by_brightness());
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert!(matches!(result.outcome, Outcome::WrongEyeCount { detected: 1 }));
    assert_eq!(result.warnings, vec![WRONG_EYE_COUNT_WARNING.to_string()]);
    assert_eq!(result.flag(EyeSide::Left), None);
    assert_eq!(result.flag(EyeSide::Right), None);
    assert_eq!(h.iris.calls(), 0);
    assert_eq!(h.classifier.calls(), 0);
}

#[test]
fn test_three_eyes_is_wrong_count() {
    let scene = scene();
    let mut eyes = scene.eyes_with_confidence(0.9, 0.9);
    eyes.push(scene.left_eye);
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(400, 300)]),
        MockDetector::returning("eyes", eyes),
        centered_iris_detector(),
        MockClassifier::fixed(0.9),
    );

    let decoded = decode(&scene.png_bytes()).unwrap();
    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();
    assert!(matches!(result.outcome, Outcome::WrongEyeCount { detected: 3 }));
}

#[test]
fn test_no_face_stops_early() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::empty("face"),
        MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.9)),
        centered_iris_detector(),
        MockClassifier::fixed(0.9),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert!(matches!(result.outcome, Outcome::NoFace));
    assert_eq!(result.warnings, vec![NO_FACE_WARNING.to_string()]);
    assert_eq!(h.face.calls(), 1);
    assert_eq!(h.eyes.calls(), 0);
}

#[test]
fn test_face_detector_failure_is_not_no_face() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::failing("face", "connection refused"),
        MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.9)),
        centered_iris_detector(),
        MockClassifier::fixed(0.9),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let err = h
        .pipeline
        .run(&decoded, &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UpstreamUnavailable {
            capability: Capability::FaceDetector,
            attempts: 2,
            ..
        }
    ));
    assert_eq!(h.face.calls(), 2);
    assert_eq!(h.eyes.calls(), 0);
}

#[test]
fn test_transient_eye_failure_is_retried() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(400, 300)]),
        MockDetector::flaky("eyes", 1, scene.eyes_with_confidence(0.9, 0.8)),
        centered_iris_detector(),
        MockClassifier::by_brightness(),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert_eq!(h.eyes.calls(), 2);
    assert_eq!(result.flag(EyeSide::Left), Some(true));
}

#[test]
fn test_iris_detector_failure() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(400, 300)]),
        MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.8)),
        MockDetector::failing("iris", "timeout"),
        MockClassifier::fixed(0.9),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let err = h
        .pipeline
        .run(&decoded, &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::UpstreamUnavailable {
            capability: Capability::IrisDetector,
            ..
        }
    ));
    assert_eq!(h.classifier.calls(), 0);
}

#[test]
fn test_classifier_failure_is_distinct() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::failing("model missing"));
    let decoded = decode(&scene.png_bytes()).unwrap();

    let err = h
        .pipeline
        .run(&decoded, &CancellationToken::new())
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::ClassificationUnavailable { attempts: 2, .. }
    ));
    assert_eq!(err.code(), "classification_unavailable");
}

#[test]
fn test_nan_probability_is_a_failure() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::fixed(f32::NAN));
    let decoded = decode(&scene.png_bytes()).unwrap();

    let err = h
        .pipeline
        .run(&decoded, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::ClassificationUnavailable { .. }));
}

#[test]
fn test_out_of_range_probability_is_clamped() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::fixed(1.7));
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();
    let pair = result.eyes().unwrap();
    assert!((pair.left.classification.unwrap().score - 1.0).abs() < f32::EPSILON);
    assert_eq!(result.flag(EyeSide::Right), Some(true));
}

#[test]
fn test_no_iris_on_one_side() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(400, 300)]),
        MockDetector::returning("eyes", scene.eyes_with_confidence(0.9, 0.8)),
        bright_only_iris_detector(),
        MockClassifier::by_brightness(),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert_eq!(result.flag(EyeSide::Left), Some(true));
    assert_eq!(result.flag(EyeSide::Right), None);
    let right = &result.eyes().unwrap().right;
    assert!(right.iris.is_none());
    assert!(right.enhanced.is_none());
    assert_eq!(h.classifier.calls(), 1);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_cancelled_request_makes_no_calls() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::fixed(0.9));
    let decoded = decode(&scene.png_bytes()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = h.pipeline.run(&decoded, &token).unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(h.face.calls(), 0);
    assert_eq!(h.eyes.calls(), 0);
    assert_eq!(h.classifier.calls(), 0);
}

#[test]
fn test_large_image_is_downscaled_for_eye_detection() {
    let scene = SyntheticImageBuilder::face_scene(2048, 1536, 230, 26);
    // The eye detector sees a half-size copy and answers in its coordinates.
    let eyes_on_copy = scene
        .eyes_with_confidence(0.9, 0.8)
        .iter()
        .map(|b| to_inference(b, 0.5))
        .collect();
    let h = Harness::new(
        MockDetector::returning("face", vec![SyntheticImageBuilder::face_box(2048, 1536)]),
        MockDetector::returning("eyes", eyes_on_copy),
        centered_iris_detector(),
        MockClassifier::by_brightness(),
    );
    let decoded = decode(&scene.png_bytes()).unwrap();

    let result = h.pipeline.run(&decoded, &CancellationToken::new()).unwrap();

    assert_eq!(h.face.seen_dimensions(), vec![(2048, 1536)]);
    assert_eq!(h.eyes.seen_dimensions(), vec![(1024, 768)]);
    assert_eq!(result.flag(EyeSide::Left), Some(true));
    assert_eq!(result.flag(EyeSide::Right), Some(false));

    // Crops are cut from the original: 2 * 0.08 * 2048 wide.
    let left = &result.eyes().unwrap().left;
    let expected = (2.0_f32 * 0.08 * 2048.0) as u32;
    assert!(left.crop.bounds.width().abs_diff(expected) <= 1);
}

#[test]
fn test_ingress_success_with_store() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::by_brightness());
    let store = MockResultStore::new();
    let bytes = scene.png_bytes();

    let response = handle(
        &h.pipeline,
        Some(bytes.as_slice()),
        "face.png",
        Some(&store),
        &CancellationToken::new(),
    );

    assert_eq!(response.status, 200);
    let json = serde_json::to_value(&response.body).unwrap();
    assert_eq!(json["leukocoria"]["left"], serde_json::json!(true));
    assert_eq!(json["leukocoria"]["right"], serde_json::json!(false));
    assert_eq!(json["warnings"], serde_json::json!([]));
    assert_eq!(json["id"], serde_json::json!(1));
    assert_eq!(json["original"], serde_json::json!("mock://face.png"));
    assert_eq!(
        json["two_eyes"]["left"]["image"],
        serde_json::json!("mock://two_eyes/left_face.png")
    );

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].bytes, bytes.len());
    assert!(calls[0].analyzed);
}

#[test]
fn test_ingress_store_failure_does_not_fail_response() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::by_brightness());
    let store = MockResultStore::failing();
    let bytes = scene.png_bytes();

    let response = handle(
        &h.pipeline,
        Some(bytes.as_slice()),
        "face.png",
        Some(&store),
        &CancellationToken::new(),
    );

    assert_eq!(response.status, 200);
    let ResponseBody::Screening(body) = response.body else {
        panic!("expected a screening body");
    };
    assert!(body.id.is_none());
    assert!(body.original.is_none());
    assert_eq!(body.leukocoria.map(|l| l.left), Some(Some(true)));
}

#[test]
fn test_ingress_missing_and_invalid_image() {
    let scene = scene();
    let h = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::fixed(0.1));
    let token = CancellationToken::new();

    let missing = handle(&h.pipeline, None, "", None, &token);
    assert_eq!(missing.status, 400);
    let json = serde_json::to_value(&missing.body).unwrap();
    assert_eq!(json["warnings"], serde_json::json!(["No image provided."]));

    let garbage = handle(&h.pipeline, Some(&b"not an image"[..]), "x.jpg", None, &token);
    assert_eq!(garbage.status, 400);
    let json = serde_json::to_value(&garbage.body).unwrap();
    assert_eq!(json["error"], serde_json::json!("invalid_input"));
    assert_eq!(h.face.calls(), 0);
}

#[test]
fn test_ingress_upstream_and_classifier_codes_differ() {
    let scene = scene();
    let bytes = scene.png_bytes();
    let token = CancellationToken::new();

    let upstream = Harness::new(
        MockDetector::failing("face", "down"),
        MockDetector::empty("eyes"),
        MockDetector::empty("iris"),
        MockClassifier::fixed(0.1),
    );
    let classifier = Harness::for_scene(&scene, (0.9, 0.8), MockClassifier::failing("down"));

    let a = handle(&upstream.pipeline, Some(bytes.as_slice()), "a.png", None, &token);
    let b = handle(&classifier.pipeline, Some(bytes.as_slice()), "b.png", None, &token);

    assert_eq!(a.status, 503);
    assert_eq!(b.status, 503);
    let a = serde_json::to_value(&a.body).unwrap();
    let b = serde_json::to_value(&b.body).unwrap();
    assert_eq!(a["error"], serde_json::json!("upstream_unavailable"));
    assert_eq!(b["error"], serde_json::json!("classification_unavailable"));
}

#[test]
fn test_gate_outcome_response_has_null_fields() {
    let scene = scene();
    let h = Harness::new(
        MockDetector::empty("face"),
        MockDetector::empty("eyes"),
        MockDetector::empty("iris"),
        MockClassifier::fixed(0.1),
    );
    let bytes = scene.png_bytes();

    let response = handle(
        &h.pipeline,
        Some(bytes.as_slice()),
        "a.png",
        None,
        &CancellationToken::new(),
    );

    assert_eq!(response.status, 200);
    let json = serde_json::to_value(&response.body).unwrap();
    assert!(json["two_eyes"].is_null());
    assert!(json["leukocoria"].is_null());
    assert_eq!(json["warnings"], serde_json::json!(["No face detected."]));
}
