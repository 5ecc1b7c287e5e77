//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// CRUD operations a controller can validate for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrudOperation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl CrudOperation {
    /// Request slice each operation validates by default
    pub fn default_source(self) -> RequestSource {
        match self {
            CrudOperation::Create | CrudOperation::Update => RequestSource::Body,
            CrudOperation::Read | CrudOperation::Delete => RequestSource::Params,
            CrudOperation::List => RequestSource::Query,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrudOperation::Create => "CREATE",
            CrudOperation::Read => "READ",
            CrudOperation::Update => "UPDATE",
            CrudOperation::Delete => "DELETE",
            CrudOperation::List => "LIST",
        }
    }
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the request a schema is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    Body,
    Params,
    Query,
    /// Body, then path params, then query; later keys win
    Merged,
}

impl RequestSource {
    /// Key the validated payload is stored under; merged input lands in `params`
    pub fn payload_key(self) -> &'static str {
        match self {
            RequestSource::Body => "body",
            RequestSource::Params | RequestSource::Merged => "params",
            RequestSource::Query => "query",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_map_to_their_sources() {
        assert_eq!(CrudOperation::Create.default_source(), RequestSource::Body);
        assert_eq!(CrudOperation::Read.default_source(), RequestSource::Params);
        assert_eq!(CrudOperation::Update.default_source(), RequestSource::Body);
        assert_eq!(CrudOperation::Delete.default_source(), RequestSource::Params);
        assert_eq!(CrudOperation::List.default_source(), RequestSource::Query);
    }

    #[test]
    fn merged_payload_is_keyed_as_params() {
        assert_eq!(RequestSource::Merged.payload_key(), "params");
        assert_eq!(CrudOperation::List.to_string(), "LIST");
    }
}
