//! HTTP gateway for Imali.
//!
//! Two routes:
//! - `POST /predict` — answer a financial query from the playbook
//! - `GET /health` — liveness plus the serving model identifier
//!
//! Built on Axum. Request logging via `TraceLayer`, 1 MB body limit,
//! optional CORS for browser clients. A panic while serving a request is
//! answered like any other failure: 500 with `{detail}`.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use imali_agent::{PredictPipeline, PredictResponse, QueryRequest};
use imali_config::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

const BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state: the pipeline built at startup.
pub type SharedState = Arc<PredictPipeline>;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

/// Body of a failed `/predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub detail: String,
}

fn internal_error(detail: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { detail })).into_response()
}

/// Any pipeline failure surfaces as 500 with the error text.
struct PredictError(imali_core::Error);

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        internal_error(self.0.to_string())
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "request handler panicked".to_string()
    };
    error!(detail = %detail, "Request handler panicked");
    internal_error(detail)
}

/// Build the Axum router.
///
/// `cors_origins` lists the browser origins allowed to call the API;
/// `"*"` allows any origin and an empty list adds no CORS layer.
pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CatchPanicLayer::custom(panic_response));

    let router = match cors_layer(cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Start the gateway HTTP server and serve until the process exits.
pub async fn start(
    config: &GatewayConfig,
    pipeline: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(pipeline.clone(), &config.cors_origins);

    info!(
        addr = %addr,
        model = %pipeline.model(),
        strategies = pipeline.knowledge_base().len(),
        "Imali gateway starting"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn predict_handler(
    State(pipeline): State<SharedState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<PredictResponse>, PredictError> {
    match pipeline.handle(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!(error = %e, "Prediction failed");
            Err(PredictError(e))
        }
    }
}

async fn health_handler(State(pipeline): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".into(),
        model: pipeline.model().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use imali_core::error::ProviderError;
    use imali_core::provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse};
    use imali_playbook::{KnowledgeBase, StrategyEntry};
    use tower::ServiceExt;

    /// Echoes the prompt then a fixed answer, or fails if no answer is set.
    struct StubProvider {
        answer: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "Qwen/Qwen2.5-1.5B-Instruct"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            match self.answer {
                Some(answer) => Ok(ProviderResponse {
                    generated_text: format!("{}{answer}", request.prompt),
                    usage: None,
                    model: request.model,
                }),
                None => Err(ProviderError::Inference("model exploded".into())),
            }
        }
    }

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl Provider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        fn model(&self) -> &str {
            "Qwen/Qwen2.5-1.5B-Instruct"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            panic!("tokenizer state corrupted")
        }
    }

    fn state(answer: Option<&'static str>) -> SharedState {
        let kb = KnowledgeBase::from_entries(vec![StrategyEntry::new(
            "Fraud",
            "unusual rapid transfers flagged",
            "Flag transfers >R50k within 1h",
        )]);
        Arc::new(PredictPipeline::new(
            Arc::new(kb),
            Arc::new(StubProvider { answer }),
            GenerationParams::default(),
        ))
    }

    fn predict_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(state(Some("ok")), &[]);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "online", "model": "Qwen/Qwen2.5-1.5B-Instruct"})
        );
    }

    #[tokio::test]
    async fn predict_returns_answer_and_strategies() {
        let app = build_router(state(Some(" Freeze the account.")), &[]);

        let response = app
            .oneshot(predict_request(r#"{"query": "I see fraud in this account"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "response": "Freeze the account.",
                "strategies_used": ["- [Fraud]"]
            })
        );
    }

    #[tokio::test]
    async fn predict_accepts_history() {
        let app = build_router(state(Some("ok")), &[]);
        let response = app
            .oneshot(predict_request(
                r#"{"query": "weather?", "history": [{"role": "user", "content": "hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["strategies_used"], serde_json::json!(["- [General Financial]"]));
    }

    #[tokio::test]
    async fn generation_failure_is_500_with_detail_only() {
        let app = build_router(state(None), &[]);

        let response = app
            .oneshot(predict_request(r#"{"query": "fraud"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj["detail"].as_str().unwrap().contains("model exploded"));
        assert!(obj.get("response").is_none());
        assert!(obj.get("strategies_used").is_none());
    }

    #[tokio::test]
    async fn panicking_backend_is_500_with_detail() {
        let state = Arc::new(PredictPipeline::new(
            Arc::new(KnowledgeBase::from_entries(vec![])),
            Arc::new(PanickingProvider),
            GenerationParams::default(),
        ));
        let app = build_router(state, &[]);

        let response = app
            .oneshot(predict_request(r#"{"query": "fraud"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"detail": "tokenizer state corrupted"}));
    }

    #[tokio::test]
    async fn missing_query_is_rejected() {
        let app = build_router(state(Some("ok")), &[]);
        let response = app
            .oneshot(predict_request(r#"{"history": []}"#))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = build_router(state(Some("ok")), &[]);
        let query = "a".repeat(BODY_LIMIT + 1);
        let response = app
            .oneshot(predict_request(&format!(r#"{{"query": "{query}"}}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn cors_headers_only_when_configured() {
        let preflight = || {
            Request::builder()
                .method("OPTIONS")
                .uri("/predict")
                .header("origin", "http://localhost:3000")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let app = build_router(state(Some("ok")), &["http://localhost:3000".to_string()]);
        let response = app.oneshot(preflight()).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let app = build_router(state(Some("ok")), &[]);
        let response = app.oneshot(preflight()).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn no_cors_layer_for_empty_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["*".to_string()]).is_some());
    }
}
