//! Declarative input schemas.
//!
//! A [`Schema`] describes the accepted shape of an untyped JSON value and
//! parses it into a cleaned copy: unknown object keys are dropped, coerced
//! numbers come out as numbers, and every problem is reported as a
//! [`FieldIssue`] with the path to the offending value. Parsing never stops
//! at the first issue.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::errors::{FieldIssue, IssueCode, PathSegment, ValidationFailure};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    nullable: bool,
    optional: bool,
}

#[derive(Debug, Clone)]
enum Kind {
    Any,
    String(StringRules),
    Number(NumberRules),
    Boolean,
    Object(Vec<(String, Schema)>),
    Array {
        element: Box<Schema>,
        min: Option<usize>,
        max: Option<usize>,
    },
}

#[derive(Debug, Clone, Default)]
struct StringRules {
    min: Option<usize>,
    max: Option<usize>,
    format: Option<StringFormat>,
}

#[derive(Debug, Clone, Copy)]
enum StringFormat {
    Email,
    DateTime,
}

#[derive(Debug, Clone, Default)]
struct NumberRules {
    integer: bool,
    coerce: bool,
    min: Option<Bound>,
    max: Option<Bound>,
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    inclusive: bool,
}

impl Schema {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            nullable: false,
            optional: false,
        }
    }

    pub fn any() -> Self {
        Self::of(Kind::Any)
    }

    pub fn string() -> Self {
        Self::of(Kind::String(StringRules::default()))
    }

    pub fn number() -> Self {
        Self::of(Kind::Number(NumberRules::default()))
    }

    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    /// Object with the given fields, in declaration order
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self::of(Kind::Object(
            fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
        ))
    }

    pub fn array(element: Schema) -> Self {
        Self::of(Kind::Array {
            element: Box::new(element),
            min: None,
            max: None,
        })
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// The value may be absent from its parent object
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Minimum length of a string (in characters) or array
    pub fn min_length(mut self, n: usize) -> Self {
        match &mut self.kind {
            Kind::String(rules) => rules.min = Some(n),
            Kind::Array { min, .. } => *min = Some(n),
            _ => {}
        }
        self
    }

    /// Maximum length of a string (in characters) or array
    pub fn max_length(mut self, n: usize) -> Self {
        match &mut self.kind {
            Kind::String(rules) => rules.max = Some(n),
            Kind::Array { max, .. } => *max = Some(n),
            _ => {}
        }
        self
    }

    pub fn email(self) -> Self {
        self.with_format(StringFormat::Email)
    }

    /// ISO-8601 UTC timestamp such as `2024-05-01T10:00:00Z`
    pub fn datetime(self) -> Self {
        self.with_format(StringFormat::DateTime)
    }

    fn with_format(mut self, format: StringFormat) -> Self {
        if let Kind::String(rules) = &mut self.kind {
            rules.format = Some(format);
        }
        self
    }

    pub fn int(self) -> Self {
        self.with_number(|rules| rules.integer = true)
    }

    /// Accept strings, booleans and null and convert them to numbers
    pub fn coerce(self) -> Self {
        self.with_number(|rules| rules.coerce = true)
    }

    /// Inclusive lower bound
    pub fn min(self, value: f64) -> Self {
        self.with_number(|rules| rules.min = Some(Bound { value, inclusive: true }))
    }

    /// Inclusive upper bound
    pub fn max(self, value: f64) -> Self {
        self.with_number(|rules| rules.max = Some(Bound { value, inclusive: true }))
    }

    pub fn positive(self) -> Self {
        self.with_number(|rules| rules.min = Some(Bound { value: 0.0, inclusive: false }))
    }

    pub fn nonnegative(self) -> Self {
        self.min(0.0)
    }

    fn with_number(mut self, apply: impl FnOnce(&mut NumberRules)) -> Self {
        if let Kind::Number(rules) = &mut self.kind {
            apply(rules);
        }
        self
    }

    /// Validate `input` and return the cleaned value
    pub fn parse(&self, input: &Value) -> Result<Value, ValidationFailure> {
        let mut issues = Vec::new();
        let parsed = self.check(Some(input), &mut Vec::new(), &mut issues);

        if issues.is_empty() {
            Ok(parsed.unwrap_or(Value::Null))
        } else {
            Err(ValidationFailure::new(issues))
        }
    }

    fn check(
        &self,
        input: Option<&Value>,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<FieldIssue>,
    ) -> Option<Value> {
        let value = match input {
            Some(value) => value,
            None if self.optional => return None,
            None => {
                issues.push(FieldIssue::new(IssueCode::InvalidType, path, "Required"));
                return None;
            }
        };

        if value.is_null() && self.nullable {
            return Some(Value::Null);
        }

        match &self.kind {
            Kind::Any => Some(value.clone()),
            Kind::String(rules) => check_string(rules, value, path, issues),
            Kind::Number(rules) => check_number(rules, value, path, issues),
            Kind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                other => {
                    issues.push(invalid_type(path, "boolean", other));
                    None
                }
            },
            Kind::Object(fields) => {
                let Value::Object(object) = value else {
                    issues.push(invalid_type(path, "object", value));
                    return None;
                };

                let mut parsed = Map::new();
                for (key, schema) in fields {
                    path.push(PathSegment::Key(key.clone()));
                    if let Some(field) = schema.check(object.get(key), path, issues) {
                        parsed.insert(key.clone(), field);
                    }
                    path.pop();
                }
                Some(Value::Object(parsed))
            }
            Kind::Array { element, min, max } => {
                let Value::Array(items) = value else {
                    issues.push(invalid_type(path, "array", value));
                    return None;
                };

                if let Some(min) = min.filter(|min| items.len() < *min) {
                    issues.push(FieldIssue::new(
                        IssueCode::TooSmall,
                        path,
                        format!("Array must contain at least {} element(s)", min),
                    ));
                }
                if let Some(max) = max.filter(|max| items.len() > *max) {
                    issues.push(FieldIssue::new(
                        IssueCode::TooBig,
                        path,
                        format!("Array must contain at most {} element(s)", max),
                    ));
                }

                let mut parsed = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    parsed.extend(element.check(Some(item), path, issues));
                    path.pop();
                }
                Some(Value::Array(parsed))
            }
        }
    }
}

fn check_string(
    rules: &StringRules,
    value: &Value,
    path: &[PathSegment],
    issues: &mut Vec<FieldIssue>,
) -> Option<Value> {
    let Value::String(text) = value else {
        issues.push(invalid_type(path, "string", value));
        return None;
    };

    let length = text.chars().count();
    if let Some(min) = rules.min.filter(|min| length < *min) {
        issues.push(FieldIssue::new(
            IssueCode::TooSmall,
            path,
            format!("String must contain at least {} character(s)", min),
        ));
    }
    if let Some(max) = rules.max.filter(|max| length > *max) {
        issues.push(FieldIssue::new(
            IssueCode::TooBig,
            path,
            format!("String must contain at most {} character(s)", max),
        ));
    }

    match rules.format {
        Some(StringFormat::Email) if !is_email(text) => {
            issues.push(FieldIssue::new(IssueCode::InvalidString, path, "Invalid email"));
        }
        Some(StringFormat::DateTime) if !is_utc_datetime(text) => {
            issues.push(FieldIssue::new(IssueCode::InvalidString, path, "Invalid datetime"));
        }
        _ => {}
    }

    Some(value.clone())
}

fn check_number(
    rules: &NumberRules,
    value: &Value,
    path: &[PathSegment],
    issues: &mut Vec<FieldIssue>,
) -> Option<Value> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if rules.coerce => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) if rules.coerce => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null if rules.coerce => Some(0.0),
        other => {
            issues.push(invalid_type(path, "number", other));
            return None;
        }
    };

    let Some(number) = number.filter(|n| n.is_finite()) else {
        issues.push(FieldIssue::new(
            IssueCode::InvalidType,
            path,
            "Expected number, received nan",
        ));
        return None;
    };

    if rules.integer && number.fract() != 0.0 {
        issues.push(FieldIssue::new(
            IssueCode::NotInteger,
            path,
            "Expected integer, received float",
        ));
    }

    if let Some(bound) = rules.min {
        let ok = if bound.inclusive { number >= bound.value } else { number > bound.value };
        if !ok {
            let relation = if bound.inclusive { "greater than or equal to" } else { "greater than" };
            issues.push(FieldIssue::new(
                IssueCode::TooSmall,
                path,
                format!("Number must be {} {}", relation, bound.value),
            ));
        }
    }
    if let Some(bound) = rules.max {
        let ok = if bound.inclusive { number <= bound.value } else { number < bound.value };
        if !ok {
            let relation = if bound.inclusive { "less than or equal to" } else { "less than" };
            issues.push(FieldIssue::new(
                IssueCode::TooBig,
                path,
                format!("Number must be {} {}", relation, bound.value),
            ));
        }
    }

    match value {
        Value::Number(_) => Some(value.clone()),
        _ => Some(number_value(number)),
    }
}

/// Whole numbers within the exact-integer range of f64 come out as integers
fn number_value(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn is_email(text: &str) -> bool {
    !text.starts_with('.') && !text.contains("..") && EMAIL.is_match(text)
}

fn is_utc_datetime(text: &str) -> bool {
    text.len() > 10
        && text.as_bytes()[10] == b'T'
        && text.ends_with('Z')
        && chrono::DateTime::parse_from_rfc3339(text).is_ok()
}

fn invalid_type(path: &[PathSegment], expected: &str, received: &Value) -> FieldIssue {
    let received = match received {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    FieldIssue::new(
        IssueCode::InvalidType,
        path,
        format!("Expected {}, received {}", expected, received),
    )
}
