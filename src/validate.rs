//! Request-field validation: declarative rules checked against the body,
//! query, then route params.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::sanitize::{self, SanitizeStep};

/// The syntactic type checks a [`FieldRule`] can perform. "Syntactic only"
/// — no network lookups, no RFC 5322 grammar, just the shape a human
/// expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Email,
    Url,
    Number,
}

/// One field's validation rule.
#[derive(Clone, Default)]
pub struct FieldRule {
    pub required: bool,
    pub kind: Option<FieldType>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub custom: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
    pub sanitize: Option<Vec<SanitizeStep>>,
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(mut self, kind: FieldType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn custom(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.custom = Some(Arc::new(f));
        self
    }

    pub fn sanitize(mut self, steps: Vec<SanitizeStep>) -> Self {
        self.sanitize = Some(steps);
        self
    }
}

/// `{isValid, errors, sanitized}`.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: HashMap<String, Vec<String>>,
    pub sanitized: HashMap<String, String>,
}

/// Validates `rules` against `ctx`. Each field's raw value is resolved from
/// the parsed body, then the query string, then route params — first
/// non-empty value wins.
pub fn validate(ctx: &Context, rules: &HashMap<String, FieldRule>) -> ValidationResult {
    let mut result = ValidationResult { is_valid: true, errors: HashMap::new(), sanitized: HashMap::new() };

    for (field, rule) in rules {
        let raw = resolve_field(ctx, field);
        let mut errors = Vec::new();

        match &raw {
            None => {
                if rule.required {
                    errors.push("required".to_string());
                }
            }
            Some(value) => {
                if let Some(min) = rule.min_length {
                    if value.chars().count() < min {
                        errors.push(format!("minLength {min}"));
                    }
                }
                if let Some(max) = rule.max_length {
                    if value.chars().count() > max {
                        errors.push(format!("maxLength {max}"));
                    }
                }
                if let Some(kind) = rule.kind {
                    if !matches_type(value, kind) {
                        errors.push(format!("type {kind:?}"));
                    }
                }
                if let Some(custom) = &rule.custom {
                    if !custom(value) {
                        errors.push("custom".to_string());
                    }
                }
            }
        }

        let sanitized_value = raw.as_deref().map(|v| match &rule.sanitize {
            Some(steps) => sanitize::sanitize(v, steps),
            None => v.to_string(),
        });

        if let Some(value) = sanitized_value {
            result.sanitized.insert(field.clone(), value);
        }
        if !errors.is_empty() {
            result.is_valid = false;
            result.errors.insert(field.clone(), errors);
        }
    }

    result
}

fn resolve_field(ctx: &Context, name: &str) -> Option<String> {
    let from_body = ctx.body().and_then(|body| body.get(name)).and_then(value_to_string).filter(|s| !s.is_empty());
    if from_body.is_some() {
        return from_body;
    }

    let from_query = ctx.query().get(name).cloned().filter(|s| !s.is_empty());
    if from_query.is_some() {
        return from_query;
    }

    ctx.params.get(name).cloned().filter(|s| !s.is_empty())
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn matches_type(value: &str, kind: FieldType) -> bool {
    match kind {
        FieldType::Email => is_email(value),
        FieldType::Url => is_url(value),
        FieldType::Number => value.trim().parse::<f64>().is_ok(),
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else { return false };
    !local.is_empty() && !domain.is_empty() && domain.contains('.') && !value.contains(' ') && value.matches('@').count() == 1
}

fn is_url(value: &str) -> bool {
    let rest = value.strip_prefix("http://").or_else(|| value.strip_prefix("https://"));
    matches!(rest, Some(r) if !r.is_empty())
}
