//! Client-side form validation from field descriptors.

use crate::config::{FieldDescriptor, FieldKind, ModuleSchema, ValidationRule};
use crate::error::FieldErrors;
use crate::form::FormMode;
use regex::Regex;
use serde_json::{Map, Value};

pub struct FormValidator;

impl FormValidator {
    /// Validate every field the form shows in `mode`. Returns one message per invalid field.
    pub fn validate(schema: &ModuleSchema, values: &Map<String, Value>, mode: FormMode) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in &schema.fields {
            if mode == FormMode::Edit && field.create_only {
                continue;
            }
            if field.read_only {
                continue;
            }
            let value = values.get(&field.key).unwrap_or(&Value::Null);
            if let Some(message) = validate_field(field, value) {
                errors.insert(field.key.clone(), message);
            }
        }
        errors
    }
}

/// Null, whitespace-only strings, and empty arrays count as empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Message for the first rule `value` breaks, if any.
pub fn validate_field(field: &FieldDescriptor, value: &Value) -> Option<String> {
    if is_empty_value(value) {
        return if field.required {
            Some(format!("{} is required", field.label))
        } else {
            None
        };
    }
    let kind_error = match &field.kind {
        FieldKind::Email => check_email(&field.label, value),
        FieldKind::Number if !value.is_number() => Some(format!("{} must be a number", field.label)),
        FieldKind::Select { options } => match value.as_str() {
            Some(s) if options.iter().any(|o| o == s) => None,
            _ => Some(format!("{} must be one of the listed options", field.label)),
        },
        FieldKind::Text
        | FieldKind::Password
        | FieldKind::TextArea
        | FieldKind::Switch
        | FieldKind::Date
        | FieldKind::Number
        | FieldKind::Relation { .. } => None,
    };
    kind_error.or_else(|| {
        field
            .validation
            .as_ref()
            .and_then(|rule| check_rule(&field.label, value, rule))
    })
}

fn check_email(label: &str, v: &Value) -> Option<String> {
    match v.as_str() {
        Some(s) if s.contains('@') && s.len() >= 3 => None,
        _ => Some(format!("{} must be a valid email", label)),
    }
}

fn check_rule(label: &str, v: &Value, rule: &ValidationRule) -> Option<String> {
    if let Some(format) = &rule.format {
        if format.eq_ignore_ascii_case("email") {
            if let Some(message) = check_email(label, v) {
                return Some(message);
            }
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Some(format!("{} must be at most {} characters", label, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Some(format!("{} must be at least {} characters", label, min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    return Some(format!("{} does not match required pattern", label));
                }
                Ok(_) => {}
                Err(_) => return Some(format!("invalid pattern for {}", label)),
            }
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Some(format!("{} must be at least {}", label, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Some(format!("{} must be at most {}", label, max));
            }
        }
    }
    None
}
