use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use super::crud::CrudRequest;
use crate::error::ApiError;
use crate::types::RequestSource;
use crate::validation::Schema;

/// Parsed input left on the request by [`validation_middleware`]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub source: RequestSource,
    pub value: Value,
}

/// Route middleware validating one request slice against `schema`.
///
/// On success the parsed value is stored as a [`ValidatedInput`] extension
/// and, for [`RequestSource::Body`], also replaces the request body. Schema
/// failures short-circuit with a 400 `VALIDATION_ERROR`; unreadable or
/// malformed input goes through [`ApiError`] as well.
///
/// ```ignore
/// Router::new()
///     .route("/files/:id", get(read_file))
///     .route_layer(middleware::from_fn(validation_middleware(schema, RequestSource::Params)));
/// ```
pub fn validation_middleware(
    schema: Schema,
    source: RequestSource,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    let schema = Arc::new(schema);
    move |request: Request, next: Next| -> BoxFuture<'static, Response> {
        let schema = schema.clone();
        Box::pin(async move { validate_request(&schema, source, request, next).await })
    }
}

async fn validate_request(schema: &Schema, source: RequestSource, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut input = match CrudRequest::from_parts(&mut parts).await {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    // Only body-reading sources buffer the body; uploads on param or query
    // validated routes stream through untouched
    let body = match source {
        RequestSource::Body | RequestSource::Merged => match CrudRequest::read_json_body(body).await {
            Ok((value, raw)) => {
                input.body = value;
                Body::from(raw)
            }
            Err(e) => return e.into_response(),
        },
        RequestSource::Params | RequestSource::Query => body,
    };

    let value = match schema.parse(&input.slice(source)) {
        Ok(value) => value,
        Err(failure) => {
            tracing::debug!(
                path = %parts.uri.path(),
                ?source,
                issues = failure.issues.len(),
                "Request failed validation"
            );
            return ApiError::from(failure).into_response();
        }
    };

    let body = if source == RequestSource::Body {
        parts.headers.remove(header::CONTENT_LENGTH);
        parts
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Body::from(value.to_string())
    } else {
        body
    };

    parts.extensions.insert(ValidatedInput { source, value });
    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{z_id, z_name};
    use axum::{
        http::StatusCode,
        middleware,
        routing::{get, post},
        Extension, Json, Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    async fn echo_input(Extension(input): Extension<ValidatedInput>) -> Json<Value> {
        Json(input.value)
    }

    async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
        Json(body)
    }

    async fn store_content(Extension(input): Extension<ValidatedInput>, body: axum::body::Bytes) -> Json<Value> {
        Json(json!({ "id": input.value["id"], "bytes": body.len() }))
    }

    fn router() -> Router {
        let id = Schema::object([("id", z_id())]);
        let create = Schema::object([("name", z_name())]);
        let content = Schema::object([("id", z_id())]);

        Router::new()
            .route(
                "/files/:id/content",
                post(store_content)
                    .route_layer(middleware::from_fn(validation_middleware(content, RequestSource::Params))),
            )
            .route(
                "/files/:id",
                get(echo_input).route_layer(middleware::from_fn(validation_middleware(id, RequestSource::Params))),
            )
            .route(
                "/files",
                post(echo_body).route_layer(middleware::from_fn(validation_middleware(create, RequestSource::Body))),
            )
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn valid_params_reach_the_handler_coerced() {
        let response = router()
            .oneshot(Request::get("/files/5").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": 5}));
    }

    #[tokio::test]
    async fn negative_id_is_rejected_with_one_detail() {
        let response = router()
            .oneshot(Request::get("/files/-3").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 1);
        assert_eq!(body["error"]["details"][0]["path"], json!(["id"]));
    }

    #[tokio::test]
    async fn body_is_replaced_with_parsed_value() {
        let request = Request::post("/files")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Acme","owner":"mallory"}"#))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"name": "Acme"}));
    }

    #[tokio::test]
    async fn malformed_json_uses_error_responder() {
        let request = Request::post("/files")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\":"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn binary_upload_on_params_route_reaches_handler() {
        let request = Request::post("/files/9/content")
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0xffu8, 0x00, 0x10]))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": 9, "bytes": 3}));
    }

    #[tokio::test]
    async fn undecodable_path_segment_is_a_bad_request() {
        let response = router()
            .oneshot(Request::get("/files/%FF").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "BAD_REQUEST");
    }
}
