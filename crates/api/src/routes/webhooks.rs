//! Webhook delivery route

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use github::{verify_signature, DeliveryPayload, PING_EVENT};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Verify, parse, then pull the named repository. 200 with no body on success.
pub async fn deliver(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let delivery = header(&headers, "X-GitHub-Delivery")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    process(&state, &headers, &body)
        .instrument(info_span!("delivery", id = %delivery))
        .await
}

async fn process(state: &AppState, headers: &HeaderMap, body: &[u8]) -> ApiResult<StatusCode> {
    let signature = headers.get(&state.signature_header).ok_or_else(|| {
        warn!("Missing {} header", state.signature_header);
        ApiError::MissingSignature
    })?;

    // Non-visible-ASCII header bytes are just another malformed signature
    let verified = signature
        .to_str()
        .map_err(|_| github::AuthError::MalformedHeader)
        .and_then(|value| verify_signature(body, value, state.config.secret.as_bytes()));
    if let Err(reason) = verified {
        warn!(%reason, "Rejected delivery signature");
        return Err(ApiError::Unauthorized);
    }

    let event = header(headers, "X-GitHub-Event").unwrap_or("push");
    if event == PING_EVENT {
        info!("Received ping");
        return Ok(StatusCode::OK);
    }

    let payload = DeliveryPayload::parse(body).map_err(|e| {
        error!("Failed to parse delivery: {}", e);
        ApiError::InvalidPayload(e.to_string())
    })?;

    let target = state
        .controller
        .handle_delivery(payload.repository_name())
        .await?;

    info!(
        "Successfully processed {:?} event for {:?}",
        event,
        target.name()
    );
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use common::{BusyPolicy, Config, Secret};
    use hmac::{Hmac, Mac};
    use processor::Puller;
    use serde_json::Value;
    use sha1::Sha1;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"test-secret";

    #[derive(Default)]
    struct RecordingPuller {
        fail: bool,
        delay: Duration,
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Puller for RecordingPuller {
        async fn pull(&self, path: &Path) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("git failed (status exit status: 1): merge conflict");
            }
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        root: PathBuf,
        puller: Arc<RecordingPuller>,
        state: Arc<AppState>,
    }

    impl Harness {
        fn new(puller: RecordingPuller) -> Self {
            Self::with_config(puller, |_| {})
        }

        fn with_config(puller: RecordingPuller, configure: impl FnOnce(&mut Config)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("repos");
            std::fs::create_dir_all(root.join("myrepo")).unwrap();

            let mut config = Config {
                secret: Secret::new(SECRET),
                repo_root: root.clone(),
                ..Config::default()
            };
            configure(&mut config);
            let puller = Arc::new(puller);
            let state = Arc::new(AppState::new(config, puller.clone()).unwrap());
            Self {
                _dir: dir,
                root,
                puller,
                state,
            }
        }

        fn calls(&self) -> Vec<PathBuf> {
            self.puller.calls.lock().unwrap().clone()
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes.to_vec())
        }
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha1>::new_from_slice(SECRET).unwrap();
        mac.update(body);
        format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn post(body: &'static [u8], signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("Content-Type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Hub-Signature", signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn error_code(body: &[u8]) -> String {
        let v: Value = serde_json::from_slice(body).unwrap();
        v["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_signed_delivery_pulls_repo() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"repository":{"name":"myrepo"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.is_empty());
        assert_eq!(h.calls(), vec![h.root.join("myrepo")]);
    }

    #[tokio::test]
    async fn test_wrong_digest_is_unauthorized() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"repository":{"name":"myrepo"}}"#;

        let (status, response) = h.send(post(body, Some("sha1=deadbeef"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&response), "unauthorized");
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_body_is_unauthorized() {
        let h = Harness::new(RecordingPuller::default());
        let signature = sign(br#"{"repository":{"name":"myrepo"}}"#);

        let (status, _) = h
            .send(post(br#"{"repository":{"name":"other"}}"#, Some(&signature)))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_reasons_look_the_same() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"repository":{"name":"myrepo"}}"#;
        let bad_hex = format!("sha1={}", "zz".repeat(20));

        let (_, mismatch) = h.send(post(body, Some("sha1=deadbeef"))).await;
        let (_, malformed) = h.send(post(body, Some("garbage"))).await;
        let (_, non_hex) = h.send(post(body, Some(&bad_hex))).await;

        assert_eq!(mismatch, malformed);
        assert_eq!(mismatch, non_hex);
    }

    #[tokio::test]
    async fn test_missing_signature_is_bad_request() {
        let h = Harness::new(RecordingPuller::default());

        let (status, response) = h
            .send(post(br#"{"repository":{"name":"myrepo"}}"#, None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response), "missing_signature");
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let h = Harness::new(RecordingPuller::default());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let (status, response) = h.send(request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_signed_garbage_surfaces_parse_error() {
        let h = Harness::new(RecordingPuller::default());
        let body = b"not json";

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "invalid_payload");
        assert!(String::from_utf8_lossy(&response).contains("Invalid delivery payload"));
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_traversal_never_pulls() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"repository":{"name":"../../etc"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "invalid_repository");
        assert!(!String::from_utf8_lossy(&response).contains("etc"));
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_repo_is_server_error() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"repository":{"name":"does-not-exist"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "repository_not_found");
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pull_failure_names_repo() {
        let h = Harness::new(RecordingPuller {
            fail: true,
            ..RecordingPuller::default()
        });
        let body = br#"{"repository":{"name":"myrepo"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "sync_failed");
        assert!(String::from_utf8_lossy(&response).contains("myrepo"));
        assert_eq!(h.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_file_in_root_is_not_a_repo() {
        let h = Harness::new(RecordingPuller::default());
        std::fs::write(h.root.join("notes.txt"), "hi").unwrap();
        let body = br#"{"repository":{"name":"notes.txt"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "repository_not_found");
        assert!(String::from_utf8_lossy(&response).contains("is not a directory"));
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_delivery_is_conflict_when_rejecting() {
        let h = Harness::with_config(
            RecordingPuller {
                delay: Duration::from_millis(300),
                ..RecordingPuller::default()
            },
            |config| config.busy_policy = BusyPolicy::Reject,
        );
        let body = br#"{"repository":{"name":"myrepo"}}"#;

        let first = {
            let app = router(h.state.clone());
            let request = post(body, Some(&sign(body)));
            tokio::spawn(async move { app.oneshot(request).await.unwrap().status() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&response), "busy");
        assert_eq!(first.await.unwrap(), StatusCode::OK);
        assert_eq!(h.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_pull_times_out() {
        let h = Harness::with_config(
            RecordingPuller {
                delay: Duration::from_secs(30),
                ..RecordingPuller::default()
            },
            |config| config.sync_timeout_secs = 1,
        );
        let body = br#"{"repository":{"name":"myrepo"}}"#;

        let (status, response) = h.send(post(body, Some(&sign(body)))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response), "sync_timeout");
        assert!(String::from_utf8_lossy(&response).contains("myrepo"));
    }

    #[tokio::test]
    async fn test_ping_does_not_pull() {
        let h = Harness::new(RecordingPuller::default());
        let body = br#"{"zen":"Keep it logically awesome.","repository":{"name":"myrepo"}}"#;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("X-Hub-Signature", sign(body))
            .header("X-GitHub-Event", "ping")
            .body(Body::from(body.to_vec()))
            .unwrap();

        let (status, _) = h.send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_ping_is_rejected() {
        let h = Harness::new(RecordingPuller::default());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("X-Hub-Signature", "sha1=deadbeef")
            .header("X-GitHub-Event", "ping")
            .body(Body::from("{}"))
            .unwrap();

        let (status, _) = h.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_root() {
        let h = Harness::new(RecordingPuller::default());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, response) = h.send(request).await;

        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["repo_root_present"], true);
    }
}
