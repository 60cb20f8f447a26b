//! HTTP boundary
//!
//! `POST /generate-test` answers with `text/plain` test code. When streaming
//! is honored the body is chunked and delivered line by line.

use crate::config::{GenerationSettings, ServerConfig};
use crate::error::{Error, Result, ValidationError};
use crate::generator::{into_lines, TestGenerator};
use crate::llm::{GenerationRequest, GenerationResult};
use crate::registry::{CodeLanguage, ModelId, TestFramework};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub generator: TestGenerator,
    pub settings: GenerationSettings,
}

impl AppState {
    pub fn new(generator: TestGenerator, settings: GenerationSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }
}

/// Request body of `POST /generate-test`
///
/// Identifiers are kept as strings so that unknown values are reported as
/// validation failures instead of generic body rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTestBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "framework")]
    pub test_framework: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub streaming: Option<bool>,
    #[serde(default)]
    pub code_type: Option<String>,
}

impl GenerateTestBody {
    /// Validate the body, filling omitted identifiers from `settings`
    pub fn into_request(
        self,
        settings: &GenerationSettings,
    ) -> std::result::Result<GenerationRequest, ValidationError> {
        let code = match self.code {
            Some(code) if !code.trim().is_empty() => code,
            _ => return Err(ValidationError::EmptyCode),
        };

        let test_framework = match non_blank(self.test_framework) {
            Some(value) => value.parse::<TestFramework>()?,
            None => settings.default_framework,
        };
        let model = match non_blank(self.model) {
            Some(value) => value.parse::<ModelId>()?,
            None => settings.default_model,
        };
        let code_type = non_blank(self.code_type)
            .map(|value| value.parse::<CodeLanguage>())
            .transpose()?;

        Ok(GenerationRequest {
            code,
            test_framework,
            model,
            code_type,
            streaming: self.streaming.unwrap_or(false),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Error rendered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_validation() {
            info!("rejected request: {}", self.0);
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0.to_string() })))
                .into_response();
        }

        error!("test generation failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to generate test: {}", self.0) })),
        )
            .into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-test", post(generate_test))
        .route("/models", get(list_models))
        .route("/frameworks", get(list_frameworks))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind `config` and serve until interrupted
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(url = %format!("http://{}", addr), "testgen server ready");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("testgen server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}

async fn generate_test(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateTestBody>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| ValidationError::InvalidBody {
        message: rejection.body_text(),
    })?;
    let request = body.into_request(&state.settings)?;

    info!(
        model = %request.model,
        framework = %request.test_framework,
        streaming = request.streaming,
        code_len = request.code.len(),
        "generate-test request"
    );

    match state.generator.generate(request).await? {
        GenerationResult::Complete(text) => Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], text).into_response()),
        GenerationResult::Stream(stream) => {
            let lines = into_lines(stream, state.settings.stream_line_delay()).map(|item| {
                item.map_err(|err| {
                    error!("stream aborted: {}", err);
                    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
                })
            });

            let mut response = Body::from_stream(lines).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            Ok(response)
        }
    }
}

async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.generator.registry().models().into_iter().cloned().collect::<Vec<_>>())
}

async fn list_frameworks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.generator.registry().frameworks().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: serde_json::Value) -> GenerateTestBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_identifiers() {
        let settings = GenerationSettings::default();
        let request = body(json!({"code": "f()"})).into_request(&settings).unwrap();

        assert_eq!(request.model, settings.default_model);
        assert_eq!(request.test_framework, settings.default_framework);
        assert!(!request.streaming);
        assert!(request.code_type.is_none());
    }

    #[test]
    fn test_framework_alias_and_code_type() {
        let request = body(json!({
            "code": "f()",
            "framework": "vitest",
            "model": "claude-3-5-sonnet-latest",
            "codeType": "typescript",
            "streaming": true
        }))
        .into_request(&GenerationSettings::default())
        .unwrap();

        assert_eq!(request.test_framework, TestFramework::Vitest);
        assert_eq!(request.model, ModelId::Claude35Sonnet);
        assert_eq!(request.code_type, Some(CodeLanguage::TypeScript));
        assert!(request.streaming);
    }

    #[test]
    fn test_invalid_bodies() {
        let settings = GenerationSettings::default();
        assert_eq!(
            body(json!({})).into_request(&settings).unwrap_err(),
            ValidationError::EmptyCode
        );
        assert_eq!(
            body(json!({"code": "\t"})).into_request(&settings).unwrap_err(),
            ValidationError::EmptyCode
        );
        assert!(matches!(
            body(json!({"code": "f()", "model": "gpt-5"})).into_request(&settings),
            Err(ValidationError::UnknownModel { .. })
        ));
        assert!(matches!(
            body(json!({"code": "f()", "testFramework": "ava"})).into_request(&settings),
            Err(ValidationError::UnknownFramework { .. })
        ));
    }
}
