/// Request extractors whose rejections use the API error shape
///
/// `axum::Json` and `axum::extract::Query` reject malformed input with a
/// plain-text body. These wrappers run the same extraction and turn the
/// rejection into an [`ApiError`], so a bad body renders as
/// `{"success": false, "error": ..., "code": ...}` like every other failure.

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

use crate::error::ApiError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON that does not fit the request type
            JsonRejection::JsonDataError(err) => ApiError::validation("body", &err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::IntoResponse,
        routing::post,
        Router,
    };
    use serde::Deserialize;
    use tower::Service as _;

    #[derive(Debug, Deserialize)]
    struct Move {
        index: usize,
    }

    async fn handler(JsonBody(req): JsonBody<Move>) -> impl IntoResponse {
        req.index.to_string()
    }

    async fn call(body: &str, content_type: &str) -> (StatusCode, serde_json::Value) {
        let mut app = Router::new().route("/move", post(handler));
        let request = Request::builder()
            .method("POST")
            .uri("/move")
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_valid_body_is_extracted() {
        let (status, _) = call(r#"{"index": 2}"#, "application/json").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_negative_index_uses_error_shape() {
        let (status, body) = call(r#"{"index": -1}"#, "application/json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "validation_error");
        assert_eq!(body["details"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (status, body) = call(r#"{"index": "#, "application/json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let (status, body) = call(r#"{"index": 1}"#, "text/plain").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
    }
}
