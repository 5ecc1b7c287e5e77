//! Reusable field schemas for request payloads.

use super::schema::Schema;

/// Non-empty string
pub fn z_string() -> Schema {
    Schema::string().min_length(1)
}

/// Nullable string with an optional length cap
pub fn z_nullable_string(max: Option<usize>) -> Schema {
    let schema = Schema::string();
    match max {
        Some(max) => schema.max_length(max).nullable(),
        None => schema.nullable(),
    }
}

/// Display name: 1 to 200 characters
pub fn z_name() -> Schema {
    Schema::string().min_length(1).max_length(200)
}

pub fn z_description() -> Schema {
    Schema::string().max_length(500)
}

pub fn z_nullable_description() -> Schema {
    z_description().nullable()
}

/// Foreign key: positive integer
pub fn z_fk() -> Schema {
    Schema::number().int().positive()
}

pub fn z_nullable_fk() -> Schema {
    z_fk().nullable()
}

/// Integer flag, 0 or 1
pub fn z_bit() -> Schema {
    Schema::number().int().min(0.0).max(1.0)
}

/// ISO-8601 UTC timestamp string
pub fn z_date_string() -> Schema {
    Schema::string().datetime()
}

pub fn z_numeric() -> Schema {
    Schema::number()
}

pub fn z_positive_numeric() -> Schema {
    Schema::number().positive()
}

pub fn z_non_negative_numeric() -> Schema {
    Schema::number().nonnegative()
}

pub fn z_email() -> Schema {
    Schema::string().email().max_length(255)
}

/// Route or query id: coerced from text, positive integer
pub fn z_id() -> Schema {
    Schema::number().coerce().int().positive()
}
