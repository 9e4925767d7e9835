// Ring 1: Input Validation - field types, enums, bounds, formats, required fields
use std::collections::BTreeMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::database::collections::{FieldFormat, FieldSpec, FieldType};
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,})+$").expect("email pattern compiles")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)$")
        .expect("url pattern compiles")
});

/// Checks every client-supplied field against the collection metadata and
/// copies the normalised values into `ctx.changes`. All problems are
/// reported together.
pub struct FieldValidator;

impl Observer for FieldValidator {
    fn name(&self) -> &'static str {
        "FieldValidator"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }
}

#[async_trait]
impl SyncObserver for FieldValidator {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let mut errors = BTreeMap::new();
        let mut changes = Map::new();

        for (name, value) in &ctx.input {
            match ctx.collection.field(name) {
                None => {
                    errors.insert(name.clone(), format!("Unknown field '{}'", name));
                }
                Some(field) if !field.writable => {
                    errors.insert(name.clone(), format!("Field '{}' cannot be set", name));
                }
                Some(field) => match validate_value(field, value) {
                    Ok(normalised) => {
                        changes.insert(name.clone(), normalised);
                    }
                    Err(message) => {
                        errors.insert(name.clone(), message);
                    }
                },
            }
        }

        if ctx.operation == Operation::Create {
            for field in ctx.collection.fields.iter().filter(|f| f.required) {
                let present = changes
                    .get(field.name)
                    .or_else(|| ctx.assigned.get(field.name))
                    .map_or(false, |v| !v.is_null());
                if !present && !errors.contains_key(field.name) {
                    errors.insert(field.name.to_string(), required_message(field));
                }
            }
        }

        if !errors.is_empty() {
            return Err(ObserverError::FieldErrors(errors));
        }
        ctx.changes = changes;
        Ok(())
    }
}

/// "minimumSkill" -> "minimum skill"
fn label(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push(' ');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn required_message(field: &FieldSpec) -> String {
    format!("Please add a {}", label(field.name))
}

/// Validate one value, returning its normalised form or a message
pub fn validate_value(field: &FieldSpec, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return if field.required { Err(required_message(field)) } else { Ok(Value::Null) };
    }

    match field.field_type {
        FieldType::Text => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("{} must be text", label(field.name)))?
                .trim();
            if text.is_empty() {
                return if field.required { Err(required_message(field)) } else { Ok(Value::Null) };
            }
            check_text(field, text)?;
            Ok(Value::String(text.to_string()))
        }
        FieldType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| format!("{} must be a number", label(field.name)))?;
            if let Some(min) = field.min {
                if n < min {
                    return Err(format!("{} must be at least {}", label(field.name), min));
                }
            }
            if let Some(max) = field.max {
                if n > max {
                    return Err(format!("{} can not be more than {}", label(field.name), max));
                }
            }
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| format!("{} must be a number", label(field.name)))
        }
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(format!("{} must be true or false", label(field.name))),
        },
        FieldType::TextArray => {
            let items: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items
                    .iter()
                    .map(|v| v.as_str().ok_or_else(|| format!("{} must be a list of text", label(field.name))))
                    .collect::<Result<_, _>>()?,
                _ => return Err(format!("{} must be a list of text", label(field.name))),
            };
            let items: Vec<&str> = items.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect();
            if items.is_empty() && field.required {
                return Err(required_message(field));
            }
            for item in &items {
                check_text(field, item)?;
            }
            Ok(Value::Array(items.into_iter().map(|s| Value::String(s.to_string())).collect()))
        }
        FieldType::Uuid | FieldType::Reference(_) => value
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|id| Value::String(id.to_string()))
            .ok_or_else(|| format!("{} must be a valid id", label(field.name))),
        FieldType::Timestamp => value
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| Value::String(ts.to_rfc3339()))
            .ok_or_else(|| format!("{} must be a timestamp", label(field.name))),
    }
}

fn check_text(field: &FieldSpec, text: &str) -> Result<(), String> {
    if !field.enum_values.is_empty() && !field.enum_values.contains(&text) {
        return Err(format!("'{}' is not a valid {}", text, label(field.name)));
    }
    let len = text.chars().count();
    if let Some(min) = field.min_len {
        if len < min {
            return Err(format!("{} must be at least {} characters", label(field.name), min));
        }
    }
    if let Some(max) = field.max_len {
        if len > max {
            return Err(format!("{} can not be more than {} characters", label(field.name), max));
        }
    }
    match field.format {
        Some(FieldFormat::Email) if !EMAIL.is_match(text) => Err("Please add a valid email".to_string()),
        Some(FieldFormat::Url) if !URL.is_match(text) => Err("Please use a valid URL with HTTP or HTTPS".to_string()),
        _ => Ok(()),
    }
}
