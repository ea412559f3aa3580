//! JSON Schema validation for the `JobOrder` a front-end submits through the
//! RPC Bridge, before it is turned into a `Job` and a first plan file.

use crate::error::{Error, Result};
use crate::job::Job;
use jsonschema::{ValidationError, Validator};
use serde_json::{json, Value};

/// Validate a `Job` (typically one freshly deserialized from an RPC request)
/// against the structural JSON Schema below, independent of the semantic
/// invariant checks in `Job::validate_parts`.
pub fn validate_job(job: &Job) -> Result<()> {
    let schema = job_schema();
    let compiled =
        Validator::new(&schema).map_err(|e| Error::validation(format!("bad schema: {}", e)))?;

    let value = serde_json::to_value(job)?;
    if let Err(errors) = compiled.validate(&value) {
        let messages: Vec<String> = errors.map(|e| format_validation_error(&e)).collect();
        return Err(Error::validation(format!(
            "job failed schema validation:\n  - {}",
            messages.join("\n  - ")
        )));
    }

    job.validate_parts()
}

fn format_validation_error(error: &ValidationError) -> String {
    format!("{}: {}", error.instance_path, error)
}

fn job_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["job_id", "from_to", "source", "destination", "policy", "status", "parts"],
        "properties": {
            "source": { "type": "string", "minLength": 1 },
            "destination": { "type": "string", "minLength": 1 },
            "parts": { "type": "array" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FromTo, Policy};

    #[test]
    fn accepts_a_freshly_constructed_job() {
        let job = Job::new(
            FromTo::LocalBlob,
            "/data/source".into(),
            "https://acct.blob.core.windows.net/c/prefix".into(),
            Policy::default(),
        );
        assert!(validate_job(&job).is_ok());
    }

    #[test]
    fn rejects_empty_source() {
        let mut job = Job::new(
            FromTo::LocalBlob,
            "/data/source".into(),
            "https://acct.blob.core.windows.net/c".into(),
            Policy::default(),
        );
        job.source = String::new();
        assert!(validate_job(&job).is_err());
    }
}
