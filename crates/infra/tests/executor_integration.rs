//! Request executor behavior against a live mock server

mod support;

use std::sync::Arc;
use std::time::Duration;

use cvforge_infra::{ApiError, FileUpload, RequestOptions, UploadProgress};
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{executor, test_config};

#[tokio::test]
async fn transient_failures_make_one_plus_max_retries_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/templates/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/templates/", server.uri());

    let err = executor.execute(Method::GET, &url, None, &RequestOptions::default()).await.unwrap_err();

    assert_eq!(err.attempts, 4);
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.url, url);
    assert!(!err.user_message.is_empty());
    assert_eq!(executor.registry().circuits().circuit(&url).consecutive_failures, 1);
}

#[tokio::test]
async fn fatal_statuses_are_never_retried() {
    for status in [401_u16, 403, 422] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"detail": "nope"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&server);
        let executor = executor(&config);
        let url = format!("{}/api/cv/", server.uri());

        let err = executor
            .execute(Method::POST, &url, Some(&json!({"name": "x"})), &RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1, "status {status} must not be retried");
        assert_eq!(err.status(), Some(status));
        assert_eq!(executor.registry().circuits().circuit(&url).consecutive_failures, 1);
    }
}

#[tokio::test]
async fn recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/profile/", server.uri());

    let response = executor.execute(Method::GET, &url, None, &RequestOptions::default()).await.unwrap();
    assert_eq!(response.body, json!({"ok": true}));
    assert!(!response.from_cache);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn circuit_opens_after_threshold_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/cv/list/", server.uri());
    let options = RequestOptions::default().max_retries(0);

    for _ in 0..5 {
        let err = executor.execute(Method::GET, &url, None, &options).await.unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    let err = executor.execute(Method::GET, &url, None, &options).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.attempts, 0);
    assert!(err.user_message.contains("temporarily unavailable"));
    assert_eq!(server.received_requests().await.unwrap().len(), 5);

    // Other endpoints are unaffected.
    let other = format!("{}/api/other/", server.uri());
    assert!(!executor.registry().is_open(&other));
}

#[tokio::test]
async fn success_after_cooldown_closes_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let registry = cvforge_common::ResilienceRegistry::new(
        cvforge_common::CircuitConfig {
            failure_threshold: 5,
            cooldown: Duration::from_millis(50),
        },
        config.resilience.cache_ttl(),
        16,
    );
    let executor = cvforge_infra::RequestExecutor::from_config(&config, registry, false).unwrap();
    let url = format!("{}/api/cv/list/", server.uri());
    let options = RequestOptions::default().max_retries(0).no_cache();

    for _ in 0..5 {
        executor.execute(Method::GET, &url, None, &options).await.unwrap_err();
    }
    assert!(executor.registry().is_open(&url));
    assert!(executor.execute(Method::GET, &url, None, &options).await.unwrap_err().is_circuit_open());

    tokio::time::sleep(Duration::from_millis(80)).await;

    executor.execute(Method::GET, &url, None, &options).await.unwrap();
    let record = executor.registry().circuits().circuit(&url);
    assert_eq!(record.consecutive_failures, 0);
    assert!(!executor.registry().is_open(&url));
}

#[tokio::test]
async fn identical_reads_hit_network_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/templates/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/templates/", server.uri());

    let first = executor.execute(Method::GET, &url, None, &RequestOptions::default()).await.unwrap();
    let second = executor.execute(Method::GET, &url, None, &RequestOptions::default()).await.unwrap();

    assert_eq!(first.body, second.body);
    assert!(!first.from_cache);
    assert!(second.from_cache);
}

#[tokio::test]
async fn writes_and_disabled_cache_always_hit_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/cv/", server.uri());
    let body = json!({"title": "Engineer"});

    for _ in 0..2 {
        executor.execute(Method::POST, &url, Some(&body), &RequestOptions::default()).await.unwrap();
    }
    for _ in 0..2 {
        executor
            .execute(Method::GET, &url, None, &RequestOptions::default().no_cache())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn extra_headers_are_sent_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-request-source", "editor"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/cv/1/", server.uri());
    let options = RequestOptions::default().header("X-Request-Source", "editor").max_retries(1);

    let err = executor.execute(Method::GET, &url, None, &options).await.unwrap_err();
    assert_eq!(err.attempts, 2);
}

#[tokio::test]
async fn cancelled_call_stops_retrying_and_records_no_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.resilience.backoff_ms = vec![10_000];
    let executor = executor(&config);
    let url = format!("{}/api/cv/1/", server.uri());
    let cancel = CancellationToken::new();
    let options = RequestOptions::default().cancel_token(cancel.clone());

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let err = executor.execute(Method::GET, &url, None, &options).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err.kind(), ApiError::Cancelled));
    assert_eq!(err.attempts, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(executor.registry().circuits().circuit(&url).consecutive_failures, 0);
}

#[tokio::test]
async fn already_cancelled_call_makes_no_attempt() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let executor = executor(&config);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = executor
        .execute(
            Method::GET,
            &format!("{}/api/cv/", server.uri()),
            None,
            &RequestOptions::default().cancel_token(cancel),
        )
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ApiError::Cancelled));
    assert_eq!(err.attempts, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_retries_with_monotone_progress_ending_at_100() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cv/upload/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cv/upload/"))
        .and(body_string_contains("name=\"language\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "cv-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let url = format!("{}/api/cv/upload/", server.uri());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = UploadProgress::new(move |pct| sink.lock().push(pct));
    let upload = FileUpload::new("cv.pdf", vec![7_u8; 2 * 1024 * 1024]).with_mime_type("application/pdf");
    let fields = vec![("language".to_string(), "en".to_string())];

    let response = executor
        .upload_file(&url, &upload, &fields, Some(&progress), &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.body["id"], "cv-1");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let seen = seen.lock().clone();
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "progress must increase: {seen:?}");
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(seen.iter().filter(|pct| **pct == 100).count(), 1);
}

#[tokio::test]
async fn failed_upload_never_reports_100() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "unsupported file"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let executor = executor(&config);
    let progress = UploadProgress::new(|_| {});
    let upload = FileUpload::new("cv.exe", vec![1_u8; 1024]);

    let err = executor
        .upload_file(
            &format!("{}/api/cv/upload/", server.uri()),
            &upload,
            &[],
            Some(&progress),
            &RequestOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ApiError::Validation(msg) if msg == "unsupported file"));
    assert!(progress.last_reported() < 100);
}
