//! Structured parsing of language-model replies

use serde::de::DeserializeOwned;

/// Why a step fell back to its deterministic output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The model call itself failed (transport, timeout, unconfigured)
    ModelUnavailable(String),
    /// The reply was not valid JSON
    InvalidJson(String),
    /// The reply parsed but violated the schema contract
    SchemaViolation(String),
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackCause::ModelUnavailable(detail) => {
                write!(f, "model unavailable: {}", detail)
            }
            FallbackCause::InvalidJson(detail) => write!(f, "invalid JSON: {}", detail),
            FallbackCause::SchemaViolation(detail) => {
                write!(f, "schema violation: {}", detail)
            }
        }
    }
}

/// Result of parsing a model reply into a schema type.
///
/// Distinguishes genuine model output from a substituted fallback so the
/// engine can log and downstream consumers can tell them apart; silently
/// masking model failures would hide systemic issues.
#[derive(Debug, Clone)]
pub enum ParseOutcome<T> {
    /// The model reply parsed cleanly
    Parsed(T),
    /// A deterministic fallback was substituted
    Fallback {
        /// The schema-valid substitute value
        value: T,
        /// Why the fallback was used
        cause: FallbackCause,
    },
}

impl<T> ParseOutcome<T> {
    /// Borrow the carried value regardless of provenance
    pub fn value(&self) -> &T {
        match self {
            ParseOutcome::Parsed(value) => value,
            ParseOutcome::Fallback { value, .. } => value,
        }
    }

    /// Take the carried value regardless of provenance
    pub fn into_value(self) -> T {
        match self {
            ParseOutcome::Parsed(value) => value,
            ParseOutcome::Fallback { value, .. } => value,
        }
    }

    /// The fallback cause, if a fallback was used
    pub fn fallback_cause(&self) -> Option<&FallbackCause> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Fallback { cause, .. } => Some(cause),
        }
    }
}

/// Parse a model reply as strict JSON for the given schema type.
///
/// Models routinely wrap JSON in markdown code fences; those are stripped
/// before parsing.
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fences(raw))
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample = parse_llm_json(r#"{"name": "a"}"#).unwrap();
        assert_eq!(parsed.name, "a");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"name\": \"b\"}\n```";
        let parsed: Sample = parse_llm_json(raw).unwrap();
        assert_eq!(parsed.name, "b");

        let raw = "```\n{\"name\": \"c\"}\n```";
        let parsed: Sample = parse_llm_json(raw).unwrap();
        assert_eq!(parsed.name, "c");
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result: Result<Sample, _> = parse_llm_json("I think the plan is fine.");
        assert!(result.is_err());
    }

    #[test]
    fn test_outcome_accessors() {
        let parsed = ParseOutcome::Parsed(1);
        assert_eq!(*parsed.value(), 1);
        assert!(parsed.fallback_cause().is_none());

        let fallback = ParseOutcome::Fallback {
            value: 2,
            cause: FallbackCause::InvalidJson("expected value".to_string()),
        };
        assert_eq!(*fallback.value(), 2);
        assert!(fallback.fallback_cause().is_some());
        assert_eq!(fallback.into_value(), 2);
    }
}
