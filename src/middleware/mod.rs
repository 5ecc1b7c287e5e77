pub mod crud;
pub mod error_log;
pub mod response;
pub mod validation;

pub use crud::{
    Credential, CredentialResolver, CrudController, CrudRequest, PlaceholderCredentials, SecurityConfig,
    ValidatedData,
};
pub use error_log::error_log_middleware;
pub use response::{error_response, success_response, success_response_with_metadata, ApiResponse, ApiResult};
pub use validation::{validation_middleware, ValidatedInput};
