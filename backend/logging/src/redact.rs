//! Log Redaction Layer
//!
//! Scrubs API keys, access tokens, passwords and phone numbers prior to logging.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TELEPHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").unwrap()
});
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9_\-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});
static PASSWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(password|passwd|pwd|secret)\s*[=:]\s*\S+").unwrap());
static SENSITIVE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(password|passwd|secret|client_?secret|api_?key|access_?token|token)$").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = TELEPHONE_RE.replace_all(input, "[REDACTED_PHONE]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    PASSWORD_RE
        .replace_all(&redacted, "${1}=[REDACTED]")
        .into_owned()
}

/// Redacts every string leaf of a JSON value. Values under credential-like
/// keys are replaced wholesale.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_sensitive_data(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if SENSITIVE_KEY_RE.is_match(k) && !v.is_null() {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(clean.contains("[REDACTED_TOKEN]"));
    }

    #[test]
    fn test_password_assignments() {
        let clean = redact_sensitive_data("login with password=hunter2 please");
        assert_eq!(clean, "login with password=[REDACTED] please");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(redact_sensitive_data("report.pdf created"), "report.pdf created");
    }

    #[test]
    fn test_redacts_nested_json() {
        let value = json!({
            "headers": {"authorization": "Bearer abc.def.ghi"},
            "keys": ["sk-abcdefghijklmnopqrstuvwxyz012345"],
            "count": 3,
            "apiKey": "abc",
            "password": "hunter2"
        });
        let clean = redact_value(&value);
        assert_eq!(clean["apiKey"], "[REDACTED]");
        assert_eq!(clean["password"], "[REDACTED]");
        assert_eq!(clean["headers"]["authorization"], "[REDACTED_TOKEN]");
        assert_eq!(clean["keys"][0], "[REDACTED_TOKEN]");
        assert_eq!(clean["count"], 3);
    }
}
