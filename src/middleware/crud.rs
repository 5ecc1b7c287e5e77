//! CRUD request validation.
//!
//! A [`CrudController`] validates one slice of a request (body, path params
//! or query string) against a [`Schema`] and stamps the caller's credential
//! onto the result. Each CRUD entry point picks the slice its operation
//! reads from.

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{rejection::PathRejection, FromRequest, Path, Query, Request},
    http::{header, request::Parts},
    RequestPartsExt,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::types::{CrudOperation, RequestSource};
use crate::validation::{Schema, ValidationFailure};

/// Resource a controller guards and the operation it permits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub securable: String,
    pub permission: CrudOperation,
}

impl SecurityConfig {
    pub fn new(securable: impl Into<String>, permission: CrudOperation) -> Self {
        Self {
            securable: securable.into(),
            permission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub account_id: i64,
    pub user_id: i64,
}

/// Works out who is making a request
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, request: &CrudRequest) -> Credential;
}

impl<F> CredentialResolver for F
where
    F: Fn(&CrudRequest) -> Credential + Send + Sync,
{
    fn resolve(&self, request: &CrudRequest) -> Credential {
        self(request)
    }
}

/// Fixed account 1 / user 1 until authentication is wired in
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderCredentials;

impl CredentialResolver for PlaceholderCredentials {
    fn resolve(&self, _request: &CrudRequest) -> Credential {
        Credential {
            account_id: 1,
            user_id: 1,
        }
    }
}

/// Credential plus the validated payload, keyed by the slice it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedData {
    pub credential: Credential,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
}

impl ValidatedData {
    fn new(credential: Credential, source: RequestSource, payload: Value) -> Self {
        let mut data = Self {
            credential,
            body: None,
            params: None,
            query: None,
        };
        match source {
            RequestSource::Body => data.body = Some(payload),
            RequestSource::Params | RequestSource::Merged => data.params = Some(payload),
            RequestSource::Query => data.query = Some(payload),
        }
        data
    }

    /// The validated payload, whichever slice it came from
    pub fn payload(&self) -> Option<&Value> {
        self.body
            .as_ref()
            .or(self.params.as_ref())
            .or(self.query.as_ref())
    }
}

/// The parts of an HTTP request a schema can be applied to.
///
/// Path params and query values arrive as strings; use coercing schemas
/// such as `z_id` for numeric ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrudRequest {
    pub body: Value,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
}

impl CrudRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Input for `source`; a missing body reads as an empty object
    pub fn slice(&self, source: RequestSource) -> Value {
        match source {
            RequestSource::Body => match &self.body {
                Value::Null => Value::Object(Map::new()),
                body => body.clone(),
            },
            RequestSource::Params => Value::Object(self.params.clone()),
            RequestSource::Query => Value::Object(self.query.clone()),
            RequestSource::Merged => {
                let mut merged = match &self.body {
                    Value::Object(body) => body.clone(),
                    _ => Map::new(),
                };
                merged.extend(self.params.clone());
                merged.extend(self.query.clone());
                Value::Object(merged)
            }
        }
    }

    /// Collect path params and query string; the body is left unread
    pub(crate) async fn from_parts(parts: &mut Parts) -> Result<Self, ApiError> {
        let params = match parts.extract::<Path<HashMap<String, String>>>().await {
            Ok(Path(params)) => params,
            Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
            Err(rejection) => return Err(ApiError::bad_request(rejection.body_text())),
        };

        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        Ok(Self {
            body: Value::Null,
            params: params.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
            query: query.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        })
    }

    /// Buffer and parse a JSON body, returning the raw bytes so the caller
    /// can rebuild the request. An empty body parses as null.
    pub(crate) async fn read_json_body(body: Body) -> Result<(Value, Bytes), ApiError> {
        let limit = crate::config::config().api.max_request_size_bytes;
        let bytes = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;

        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ApiError::invalid_json(e.to_string()))?
        };
        Ok((value, bytes))
    }
}

/// True when the body is declared as JSON or carries no content type
fn has_json_body(parts: &Parts) -> bool {
    match parts.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(content_type) => {
            let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        }
    }
}

/// Extracts params and query, plus the body when it is JSON. Bodies of
/// other content types (uploads) are not read and leave `body` null.
#[async_trait]
impl<S> FromRequest<S> for CrudRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let mut request = CrudRequest::from_parts(&mut parts).await?;
        if has_json_body(&parts) {
            request.body = CrudRequest::read_json_body(body).await?.0;
        }
        Ok(request)
    }
}

/// Validates CRUD requests for one set of secured resources
#[derive(Clone)]
pub struct CrudController {
    security: Vec<SecurityConfig>,
    resolver: Arc<dyn CredentialResolver>,
}

impl CrudController {
    pub fn new(security: Vec<SecurityConfig>) -> Self {
        Self {
            security,
            resolver: Arc::new(PlaceholderCredentials),
        }
    }

    pub fn with_resolver(mut self, resolver: impl CredentialResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn security(&self) -> &[SecurityConfig] {
        &self.security
    }

    pub fn create(&self, request: &CrudRequest, schema: &Schema) -> Result<ValidatedData, ValidationFailure> {
        self.validate_operation(request, schema, CrudOperation::Create)
    }

    pub fn read(&self, request: &CrudRequest, schema: &Schema) -> Result<ValidatedData, ValidationFailure> {
        self.validate_operation(request, schema, CrudOperation::Read)
    }

    pub fn update(&self, request: &CrudRequest, schema: &Schema) -> Result<ValidatedData, ValidationFailure> {
        self.validate_operation(request, schema, CrudOperation::Update)
    }

    pub fn delete(&self, request: &CrudRequest, schema: &Schema) -> Result<ValidatedData, ValidationFailure> {
        self.validate_operation(request, schema, CrudOperation::Delete)
    }

    pub fn list(&self, request: &CrudRequest, schema: &Schema) -> Result<ValidatedData, ValidationFailure> {
        self.validate_operation(request, schema, CrudOperation::List)
    }

    fn validate_operation(
        &self,
        request: &CrudRequest,
        schema: &Schema,
        operation: CrudOperation,
    ) -> Result<ValidatedData, ValidationFailure> {
        self.validate(request, schema, operation, operation.default_source())
    }

    /// Validate an arbitrary slice, including the merged view
    pub fn validate(
        &self,
        request: &CrudRequest,
        schema: &Schema,
        operation: CrudOperation,
        source: RequestSource,
    ) -> Result<ValidatedData, ValidationFailure> {
        let credential = self.resolver.resolve(request);

        match schema.parse(&request.slice(source)) {
            Ok(payload) => {
                debug!(%operation, ?source, account_id = credential.account_id, "Request validated");
                Ok(ValidatedData::new(credential, source, payload))
            }
            Err(failure) => {
                debug!(%operation, ?source, issues = failure.issues.len(), "Request failed validation");
                Err(failure)
            }
        }
    }
}

impl std::fmt::Debug for CrudController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudController")
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_account, mock_user};
    use crate::validation::{z_id, z_name, z_nullable_description};
    use serde_json::json;

    fn controller() -> CrudController {
        CrudController::new(vec![SecurityConfig::new("file", CrudOperation::Read)])
    }

    #[test]
    fn create_validates_body_and_stamps_credential() {
        let schema = Schema::object([("name", z_name())]);
        let request = CrudRequest::new().with_body(json!({"name": "Acme"}));

        let data = controller().create(&request, &schema).unwrap();
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({"credential": {"accountId": 1, "userId": 1}, "body": {"name": "Acme"}})
        );
    }

    #[test]
    fn negative_id_fails_without_data() {
        let schema = Schema::object([("id", z_id())]);
        let request = CrudRequest::new().with_param("id", "-4");

        let failure = controller().read(&request, &schema).unwrap_err();
        assert_eq!(failure.issues.len(), 1);
        assert_eq!(failure.issues[0].field(), "id");
    }

    #[test]
    fn each_operation_reads_its_own_slice() {
        let schema = Schema::object([("id", z_id())]);
        let request = CrudRequest::new()
            .with_body(json!({"id": 1}))
            .with_param("id", "2")
            .with_query("id", "3");
        let c = controller();

        assert_eq!(c.create(&request, &schema).unwrap().body, Some(json!({"id": 1})));
        assert_eq!(c.update(&request, &schema).unwrap().body, Some(json!({"id": 1})));
        assert_eq!(c.read(&request, &schema).unwrap().params, Some(json!({"id": 2})));
        assert_eq!(c.delete(&request, &schema).unwrap().params, Some(json!({"id": 2})));
        assert_eq!(c.list(&request, &schema).unwrap().query, Some(json!({"id": 3})));
    }

    #[test]
    fn merged_source_lets_later_slices_win() {
        let schema = Schema::object([
            ("id", z_id()),
            ("name", z_name()),
            ("description", z_nullable_description()),
        ]);
        let request = CrudRequest::new()
            .with_body(json!({"id": 1, "name": "Body", "description": null}))
            .with_param("id", "2")
            .with_query("name", "Query");

        let data = controller()
            .validate(&request, &schema, CrudOperation::Update, RequestSource::Merged)
            .unwrap();
        assert_eq!(
            data.params,
            Some(json!({"id": 2, "name": "Query", "description": null}))
        );
        assert!(data.body.is_none());
    }

    #[test]
    fn missing_body_reads_as_empty_object() {
        let schema = Schema::object([("name", z_name())]);
        let failure = controller().create(&CrudRequest::new(), &schema).unwrap_err();
        assert_eq!(failure.issues[0].message, "Required");
    }

    #[test]
    fn custom_resolver_supplies_credential() {
        let c = controller().with_resolver(|_: &CrudRequest| Credential {
            account_id: 42,
            user_id: 7,
        });
        let data = c.list(&CrudRequest::new(), &Schema::object(Vec::<(String, Schema)>::new())).unwrap();
        assert_eq!(data.credential, Credential { account_id: 42, user_id: 7 });
        assert_eq!(data.payload(), Some(&json!({})));
    }

    #[test]
    fn placeholder_matches_fixture_account_and_user() {
        let credential = PlaceholderCredentials.resolve(&CrudRequest::new());
        assert_eq!(Some(credential.account_id), mock_account()["idAccount"].as_i64());
        assert_eq!(Some(credential.user_id), mock_user()["idUser"].as_i64());
    }

    #[test]
    fn security_entries_are_kept_in_order() {
        let c = CrudController::new(vec![
            SecurityConfig::new("file", CrudOperation::Read),
            SecurityConfig::new("file", CrudOperation::Delete),
        ]);
        let permissions: Vec<_> = c.security().iter().map(|s| s.permission).collect();
        assert_eq!(permissions, vec![CrudOperation::Read, CrudOperation::Delete]);
    }

    #[tokio::test]
    async fn extractor_reads_body_and_query() {
        let req = Request::builder()
            .method("POST")
            .uri("/files?page=2")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Acme"}"#))
            .unwrap();

        let request = CrudRequest::from_request(req, &()).await.unwrap();
        assert_eq!(request.body, json!({"name": "Acme"}));
        assert_eq!(request.query.get("page"), Some(&json!("2")));
        assert!(request.params.is_empty());
    }

    #[tokio::test]
    async fn extractor_rejects_malformed_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/files")
            .body(Body::from("{not json"))
            .unwrap();

        let err = CrudRequest::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JSON");
    }

    #[tokio::test]
    async fn extractor_leaves_binary_uploads_unread() {
        let req = Request::builder()
            .method("POST")
            .uri("/files?folder=tmp")
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0xffu8, 0x00, 0x10]))
            .unwrap();

        let request = CrudRequest::from_request(req, &()).await.unwrap();
        assert_eq!(request.body, Value::Null);
        assert_eq!(request.query.get("folder"), Some(&json!("tmp")));
    }

    #[test]
    fn json_content_types_are_recognised() {
        let parts = |content_type: &str| {
            let (parts, _) = Request::builder()
                .header("content-type", content_type)
                .body(())
                .unwrap()
                .into_parts();
            parts
        };
        assert!(has_json_body(&parts("application/json; charset=utf-8")));
        assert!(has_json_body(&parts("application/merge-patch+json")));
        assert!(!has_json_body(&parts("multipart/form-data; boundary=x")));
        assert!(!has_json_body(&parts("application/octet-stream")));
    }
}
