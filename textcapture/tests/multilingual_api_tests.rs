mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{test_config, write_image};
use textcapture::error::OcrError;
use textcapture::ocr::{
    ManagedBackend, OcrBackend, OcrDispatcher, RecognitionMethod, MULTILINGUAL_LANGUAGES,
};
use textcapture::OcrConfig;

async fn healthy_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> OcrConfig {
    let mut config = test_config();
    config.server_url = Some(server.uri());
    config.timeout_secs = 5;
    config
}

fn ocr_response() -> serde_json::Value {
    json!({
        "boxes": [
            {"box": [[10, 10], [90, 10], [90, 30], [10, 30]], "text": "Xin", "score": 0.9},
            {"box": [[100, 10], [180, 10], [180, 30], [100, 30]], "text": "chào", "score": 0.7}
        ],
        "raw_text": "Xin chào"
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_multilingual_engine_joins_segments_and_averages_scores() {
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .and(body_partial_json(json!({"languages": ["vi"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ocr_response()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "vi.png");

    let result = tokio::task::spawn_blocking(move || {
        let mut backend = ManagedBackend::new(&config, "vi").unwrap();
        assert_eq!(backend.default_method(), RecognitionMethod::Multilingual);
        backend.extract_text_with_confidence(&image)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(result.text, "Xin chào");
    assert_eq!(
        result.text_parts,
        vec!["Xin".to_string(), "chào".to_string()]
    );
    assert!((result.confidence.unwrap() - 0.8).abs() < 1e-6);
    assert_eq!(result.bounding_boxes[1].x, 100);
    assert_eq!(result.bounding_boxes[1].width, 80);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unhealthy_service_without_classical_means_no_engine() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = tokio::task::spawn_blocking(move || ManagedBackend::new(&config, "en").err())
        .await
        .unwrap();

    assert!(matches!(err, Some(OcrError::NoEngineAvailable(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_service_error_surfaces_as_execution_error() {
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "en.png");

    let err = tokio::task::spawn_blocking(move || {
        let mut backend = ManagedBackend::new(&config, "en").unwrap();
        backend.extract_text(&image).unwrap_err()
    })
    .await
    .unwrap();

    match err {
        OcrError::BackendExecution(msg) => assert!(msg.contains("CUDA out of memory")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_classical_method_rejected_when_not_installed() {
    let server = healthy_server().await;
    let config = config_for(&server);
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "en.png");

    let err = tokio::task::spawn_blocking(move || {
        let backend = ManagedBackend::new(&config, "en").unwrap();
        backend
            .extract_text_with(&image, Some(RecognitionMethod::Classical))
            .unwrap_err()
    })
    .await
    .unwrap();

    assert!(matches!(err, OcrError::UnsupportedMethod(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_language_reprobes_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let (language, info) = tokio::task::spawn_blocking(move || {
        let mut backend = ManagedBackend::new(&config, "en").unwrap();
        // Same language: no new probe.
        backend.initialize("en").unwrap();
        backend.set_language("ja").unwrap();
        (backend.language().to_string(), backend.info())
    })
    .await
    .unwrap();

    assert_eq!(language, "ja");
    assert_eq!(info.details["default_method"], "multilingual");
    assert_eq!(info.details["classical_available"], "false");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_supported_languages_include_multilingual_set() {
    let server = healthy_server().await;
    let config = config_for(&server);

    let languages = tokio::task::spawn_blocking(move || {
        ManagedBackend::new(&config, "en").unwrap().supported_languages()
    })
    .await
    .unwrap();

    for code in MULTILINGUAL_LANGUAGES {
        assert!(languages.contains(code), "missing {code}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dispatcher_end_to_end_through_service() {
    let server = healthy_server().await;
    Mock::given(method("POST"))
        .and(path("/ocr"))
        .and(body_partial_json(json!({"languages": ["ja"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "boxes": [{"box": [[0, 0], [40, 0], [40, 20], [0, 20]], "text": "日本語", "score": 0.88}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.use_native = false;
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "jp.png");

    let dispatcher = OcrDispatcher::new(config);
    let outcome = tokio::task::spawn_blocking(move || dispatcher.extract(&image, "Jp"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.text, "日本語");
}
