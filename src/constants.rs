//! Shared error-code and message vocabulary for API envelopes.
//!
//! Message values are translation keys consumed by the web client, not
//! human-facing prose.
//!
//! ```
//! use autoclean_api::constants::error_codes;
//!
//! assert_eq!(error_codes::VALIDATION_ERROR, "VALIDATION_ERROR");
//! ```

pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_JSON: &str = "INVALID_JSON";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

pub mod messages {
    pub const VALIDATION_FAILED: &str = "validationFailed";
    pub const ROUTE_NOT_FOUND: &str = "routeNotFound";
    pub const DATABASE_ERROR: &str = "databaseError";
    pub const DATABASE_UNAVAILABLE: &str = "databaseUnavailable";
    pub const INTERNAL_SERVER_ERROR: &str = "internalServerError";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
}
