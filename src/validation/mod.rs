pub mod errors;
pub mod primitives;
pub mod schema;

pub use errors::{FieldIssue, IssueCode, PathSegment, ValidationFailure};
pub use primitives::*;
pub use schema::Schema;
