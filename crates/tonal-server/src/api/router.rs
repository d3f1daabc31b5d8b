use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api::{analyze, models, rewrite};
use crate::state::AppState;
use tonal_core::ServerConfig;

/// Create the main API router.
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/analyze", post(analyze::analyze))
        .route("/rewrite", post(rewrite::rewrite))
        .route("/models", get(models::list_models))
        .route("/models/:role", get(models::get_model_info))
        .merge(crate::api::internal::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(server))
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origin = if server.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use tonal_core::runtime::{ANALYZER_UNAVAILABLE, REWRITER_UNAVAILABLE};
    use tonal_core::{
        AnalysisEngine, EngineConfig, GenerationConfig, LabelScore, Result, TextClassifier,
        TextRewriter,
    };

    struct FixedClassifier(&'static [(&'static str, f32)]);

    impl TextClassifier for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Vec<LabelScore>> {
            Ok(self
                .0
                .iter()
                .map(|(label, score)| LabelScore {
                    label: label.to_string(),
                    score: *score,
                })
                .collect())
        }
    }

    struct EchoRewriter {
        delay: Duration,
    }

    impl TextRewriter for EchoRewriter {
        fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String> {
            std::thread::sleep(self.delay);
            Ok(format!("[{}]", prompt))
        }
    }

    /// Tracks how many generations run at once.
    #[derive(Default)]
    struct CountingRewriter {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TextRewriter for CountingRewriter {
        fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    const TONES: &[(&str, f32)] = &[
        ("LABEL_2", 0.61),
        ("LABEL_3", 0.2),
        ("LABEL_0", 0.15),
        ("LABEL_1", 0.04),
    ];

    const TRAITS: &[(&str, f32)] = &[
        ("Openness", 0.31),
        ("Conscientiousness", 0.22),
        ("Extraversion", 0.19),
        ("Agreeableness", 0.18),
        ("Neuroticism", 0.1),
    ];

    fn server_config(timeout_secs: u64) -> ServerConfig {
        ServerConfig {
            request_timeout_secs: timeout_secs,
            max_concurrent_requests: 4,
            ..ServerConfig::default()
        }
    }

    fn app_with(engine: AnalysisEngine, server: ServerConfig) -> Router {
        create_router(AppState::new(engine, &server), &server)
    }

    fn full_app() -> Router {
        let engine = AnalysisEngine::from_parts(
            EngineConfig::default(),
            Some(Arc::new(FixedClassifier(TONES))),
            Some(Arc::new(FixedClassifier(TRAITS))),
            Some(Arc::new(EchoRewriter {
                delay: Duration::ZERO,
            })),
        );
        app_with(engine, server_config(30))
    }

    fn empty_app() -> Router {
        let engine = AnalysisEngine::from_parts(EngineConfig::default(), None, None, None);
        app_with(engine, server_config(30))
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn analyze_returns_every_field() {
        let (status, body) = send(
            full_app(),
            "POST",
            "/analyze",
            r#"{"text": "Could you send the numbers?"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tone"], "Inquisitive");
        assert!((body["confidence"].as_f64().unwrap() - 0.61).abs() < 1e-6);
        assert_eq!(body["allTones"].as_array().unwrap().len(), 4);
        assert_eq!(body["allTones"][1]["label"], "Casual");
        assert_eq!(body["oceanTraits"].as_object().unwrap().len(), 5);
        assert!(body["oceanTraits"]["Neuroticism"].is_number());
        assert_eq!(body["sentiment"], "neutral");
    }

    #[tokio::test]
    async fn analyze_without_text_is_bad_request() {
        for payload in [r#"{"message": "hi"}"#, "{}", "[]", "garbage", r#"{"text": null}"#] {
            let (status, body) = send(full_app(), "POST", "/analyze", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert_eq!(body, json!({"error": "No text provided"}));
        }
    }

    #[tokio::test]
    async fn non_string_text_is_bad_request() {
        let (status, body) = send(full_app(), "POST", "/analyze", r#"{"text": 42}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn rewrite_returns_generated_text() {
        let (status, body) = send(
            full_app(),
            "POST",
            "/rewrite",
            r#"{"text": "send it now", "tone": "polite"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"rewrittenText": "[rewrite in a polite tone: send it now]"})
        );
    }

    #[tokio::test]
    async fn rewrite_needs_text_and_tone() {
        for payload in [r#"{"text": "hello"}"#, r#"{"tone": "formal"}"#, "{}", "nope"] {
            let (status, body) = send(full_app(), "POST", "/rewrite", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert_eq!(body, json!({"error": "Missing 'text' or 'tone'"}));
        }
    }

    #[tokio::test]
    async fn missing_models_fail_before_validation() {
        let (status, body) = send(empty_app(), "POST", "/analyze", "{}").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": ANALYZER_UNAVAILABLE}));

        let (status, body) = send(
            empty_app(),
            "POST",
            "/rewrite",
            r#"{"text": "a", "tone": "b"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": REWRITER_UNAVAILABLE}));
    }

    #[tokio::test]
    async fn slow_inference_times_out() {
        let engine = AnalysisEngine::from_parts(
            EngineConfig::default(),
            None,
            None,
            Some(Arc::new(EchoRewriter {
                delay: Duration::from_millis(1500),
            })),
        );
        let app = app_with(engine, server_config(1));

        let (status, body) = send(app, "POST", "/rewrite", r#"{"text": "a", "tone": "b"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Request timed out"}));
    }

    #[tokio::test]
    async fn timed_out_requests_keep_their_permit() {
        let rewriter = Arc::new(CountingRewriter::default());
        let engine = AnalysisEngine::from_parts(
            EngineConfig::default(),
            None,
            None,
            Some(rewriter.clone() as Arc<dyn TextRewriter>),
        );
        let server = ServerConfig {
            request_timeout_secs: 1,
            max_concurrent_requests: 1,
            ..ServerConfig::default()
        };
        let app = app_with(engine, server);

        for _ in 0..3 {
            let (status, body) =
                send(app.clone(), "POST", "/rewrite", r#"{"text": "a", "tone": "b"}"#).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, json!({"error": "Request timed out"}));
        }

        tokio::time::sleep(Duration::from_millis(1700)).await;
        assert_eq!(rewriter.peak.load(Ordering::SeqCst), 1);
        assert_eq!(rewriter.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_reports_model_status() {
        let (status, body) = send(empty_app(), "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "ok",
                "models": {"toneAnalyzer": false, "oceanAnalyzer": false, "rewriter": false}
            })
        );
    }

    #[tokio::test]
    async fn models_route_resolves_roles() {
        let (status, body) = send(full_app(), "GET", "/models", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"].as_array().unwrap().len(), 3);

        let (status, body) = send(full_app(), "GET", "/models/rewriter", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["repoId"], "goks24/Email_rewriter_cum_tone_analyzer");
        assert_eq!(body["task"], "text2text-generation");
        assert_eq!(body["loaded"], true);

        let (status, _) = send(full_app(), "GET", "/models/whisper", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        let request = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("origin", "http://localhost:3000")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text": "hi"}"#))
            .unwrap();
        let response = full_app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }
}
