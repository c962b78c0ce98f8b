use super::{json_candidates, OutputSchema, SchemaError};
use serde_json::Value;
use tracing::debug;

/// Validate raw model output against a schema.
///
/// Returns the normalized payload of the first candidate that both parses and
/// satisfies the schema. Otherwise the error names the first parseable
/// candidate's problem, or reports that no structured payload was found.
/// Validating the serialized result again yields the same value.
pub fn validate(raw: &str, schema: &OutputSchema) -> Result<Value, SchemaError> {
    let mut first_error: Option<SchemaError> = None;

    for (index, candidate) in json_candidates(raw).into_iter().enumerate() {
        let value: Value = match serde_json::from_str(candidate) {
            Ok(value) => value,
            Err(e) => {
                debug!(index, error = %e, "Skipping unparseable JSON candidate");
                continue;
            }
        };
        match schema.check(value) {
            Ok(normalized) => return Ok(normalized),
            Err(e) => {
                debug!(index, schema = schema.name(), error = %e, "Candidate rejected");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(SchemaError::no_payload))
}
