use serde::Serialize;
use serde_json::Value;

/// Structured before/after for a single field that doesn't match desired
/// state. Returned by [`crate::ResourceHandler::diff`]; an empty drift
/// list means the resource is in sync.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDrift {
    /// Machine-readable field name, e.g. "target" or "profiles".
    pub field: String,
    /// What the caller wants.
    pub expected: Value,
    /// What the provider has.
    pub actual: Value,
}

impl FieldDrift {
    pub fn new(field: impl Into<String>, expected: Value, actual: Value) -> Self {
        Self {
            field: field.into(),
            expected,
            actual,
        }
    }
}
