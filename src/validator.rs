use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::submission::SubmissionForm;

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 100;
pub const MESSAGE_MIN: usize = 1;
pub const MESSAGE_MAX: usize = 1000;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9\s-]{10,}$").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$"
    )
    .unwrap();
}

/// A single rejected field, reported back to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Name of the offending field as the client sent it (`fullName`, ...)
    pub field: String,
    /// Machine-readable reason: `required`, `invalid_type`, `too_small`,
    /// `too_big` or `invalid_string`
    pub code: &'static str,
    /// Human-readable explanation
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, code: &'static str, message: impl Into<String>) -> Self {
        FieldViolation {
            field: field.to_string(),
            code,
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, "required", "Required")
    }
}

/// Validate a decoded request body
///
/// Checks all five fields and returns every violation found, so the client
/// can fix the whole form in one round trip. Nothing is accepted unless the
/// whole form is valid.
///
/// # Arguments
/// * `body` - The JSON request body
///
/// # Returns
/// * `Result<SubmissionForm, Vec<FieldViolation>>` - The typed form or the list of violations
pub fn validate(body: &Value) -> Result<SubmissionForm, Vec<FieldViolation>> {
    let Some(obj) = body.as_object() else {
        return Err(vec![FieldViolation::new(
            "body",
            "invalid_type",
            "Expected a JSON object",
        )]);
    };

    let mut violations = Vec::new();

    let full_name = string_field(obj, "fullName", &mut violations);
    if let Some(name) = full_name {
        check_length(name, "fullName", NAME_MIN, NAME_MAX, &mut violations);
    }

    let phone = string_field(obj, "phone", &mut violations);
    if let Some(phone) = phone {
        if !PHONE_REGEX.is_match(phone) {
            violations.push(FieldViolation::new(
                "phone",
                "invalid_string",
                "Phone number must have at least 10 digits, spaces or dashes",
            ));
        }
    }

    let email = string_field(obj, "email", &mut violations);
    if let Some(email) = email {
        if !is_valid_email(email) {
            violations.push(FieldViolation::new(
                "email",
                "invalid_string",
                "Invalid email",
            ));
        }
    }

    let interest_type = string_field(obj, "interestType", &mut violations);
    if let Some(interest) = interest_type {
        check_length(interest, "interestType", 1, usize::MAX, &mut violations);
    }

    let message = string_field(obj, "message", &mut violations);
    if let Some(message) = message {
        check_length(message, "message", MESSAGE_MIN, MESSAGE_MAX, &mut violations);
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    match (full_name, phone, email, interest_type, message) {
        (Some(full_name), Some(phone), Some(email), Some(interest_type), Some(message)) => {
            Ok(SubmissionForm {
                full_name: full_name.to_string(),
                phone: phone.to_string(),
                email: email.to_string(),
                interest_type: interest_type.to_string(),
                message: message.to_string(),
            })
        }
        // every missing field already recorded a violation
        _ => Err(violations),
    }
}

/// Email syntax check
///
/// The local part may not start with a dot and no part of the address may
/// contain consecutive dots.
pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_REGEX.is_match(email)
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<&'a str> {
    match obj.get(field) {
        None => {
            violations.push(FieldViolation::required(field));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            violations.push(FieldViolation::new(
                field,
                "invalid_type",
                format!("Expected string, received {}", json_type_name(other)),
            ));
            None
        }
    }
}

fn check_length(
    value: &str,
    field: &str,
    min: usize,
    max: usize,
    violations: &mut Vec<FieldViolation>,
) {
    let len = value.chars().count();
    if len < min {
        violations.push(FieldViolation::new(
            field,
            "too_small",
            format!("Must contain at least {} character(s)", min),
        ));
    } else if len > max {
        violations.push(FieldViolation::new(
            field,
            "too_big",
            format!("Must contain at most {} character(s)", max),
        ));
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "fullName": "Jamie Rivera",
            "phone": "+1 555-123-4567",
            "email": "jamie@example.com",
            "interestType": "Court booking",
            "message": "Can we book two courts on Saturday?"
        })
    }

    fn fields(violations: &[FieldViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.field.as_str()).collect()
    }

    #[test]
    fn test_accepts_valid_form() {
        let form = validate(&valid_body()).unwrap();
        assert_eq!(form.full_name, "Jamie Rivera");
        assert_eq!(form.interest_type, "Court booking");
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let mut body = valid_body();
        body["referrer"] = json!("instagram");
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn test_reports_every_missing_field() {
        let violations = validate(&json!({})).unwrap_err();
        assert_eq!(
            fields(&violations),
            vec!["fullName", "phone", "email", "interestType", "message"]
        );
        assert!(violations.iter().all(|v| v.code == "required"));
    }

    #[test]
    fn test_rejects_non_object_body() {
        let violations = validate(&json!(["not", "a", "form"])).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, "invalid_type");
    }

    #[test]
    fn test_rejects_wrong_types() {
        let mut body = valid_body();
        body["phone"] = json!(5551234567u64);
        let violations = validate(&body).unwrap_err();
        assert_eq!(fields(&violations), vec!["phone"]);
        assert_eq!(violations[0].code, "invalid_type");
        assert!(violations[0].message.contains("number"));
    }

    #[test]
    fn test_null_is_a_type_error() {
        let mut body = valid_body();
        body["email"] = Value::Null;
        let violations = validate(&body).unwrap_err();
        assert_eq!(fields(&violations), vec!["email"]);
        assert_eq!(violations[0].code, "invalid_type");
        assert_eq!(violations[0].message, "Expected string, received null");
    }

    #[test]
    fn test_name_length_bounds() {
        let mut body = valid_body();
        body["fullName"] = json!("J");
        assert_eq!(validate(&body).unwrap_err()[0].code, "too_small");

        body["fullName"] = json!("x".repeat(101));
        assert_eq!(validate(&body).unwrap_err()[0].code, "too_big");

        body["fullName"] = json!("x".repeat(100));
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn test_phone_pattern() {
        let accepted = ["5551234567", "+44 20 7946 0958", "555-123-4567"];
        let rejected = ["555-1234", "(555) 123-4567", "555.123.4567", "++15551234567"];

        for phone in accepted {
            let mut body = valid_body();
            body["phone"] = json!(phone);
            assert!(validate(&body).is_ok(), "{} should be accepted", phone);
        }
        for phone in rejected {
            let mut body = valid_body();
            body["phone"] = json!(phone);
            let violations = validate(&body).unwrap_err();
            assert_eq!(fields(&violations), vec!["phone"], "{} should be rejected", phone);
        }
    }

    #[test]
    fn test_email_syntax() {
        assert!(is_valid_email("a.b+tag@sub.example.co"));
        assert!(is_valid_email("O'Neil@example.ie"));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email(".leading@example.com"));
        assert!(!is_valid_email("double..dot@example.com"));
        assert!(!is_valid_email("trailing.@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn test_message_length_bounds() {
        let mut body = valid_body();
        body["message"] = json!("");
        assert_eq!(validate(&body).unwrap_err()[0].code, "too_small");

        body["message"] = json!("m".repeat(1001));
        let violations = validate(&body).unwrap_err();
        assert_eq!(fields(&violations), vec!["message"]);
        assert_eq!(violations[0].code, "too_big");

        // lengths count characters, not bytes
        body["message"] = json!("é".repeat(1000));
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn test_empty_interest_type() {
        let mut body = valid_body();
        body["interestType"] = json!("");
        let violations = validate(&body).unwrap_err();
        assert_eq!(fields(&violations), vec!["interestType"]);
    }
}
