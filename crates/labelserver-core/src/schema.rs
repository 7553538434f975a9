// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field schemas for label data.
//
// A schema is a plain table of field name -> (kind, required, default).  The
// set of kinds is closed: string, integer, boolean.  Values are checked
// strictly against their kind; a JSON string "3" is not an integer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// The kinds of value a label field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
}

impl FieldKind {
    /// Check a submitted value against this kind.
    pub fn validate(self, raw: &Value) -> Result<FieldValue, String> {
        match (self, raw) {
            (_, Value::Null) => Err("field may not be null".into()),
            (Self::String, Value::String(s)) => Ok(FieldValue::String(s.clone())),
            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| "not a valid integer".into()),
            (Self::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (kind, _) => Err(format!("expected {kind}")),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
        })
    }
}

/// A validated field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl FieldValue {
    /// Accept any JSON scalar without a declared kind.
    ///
    /// Used for label types that have no schema.  Numbers that are not
    /// integers are kept in their JSON spelling.
    pub fn from_scalar(raw: &Value) -> Result<FieldValue, String> {
        match raw {
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
            Value::Number(n) => Ok(n
                .as_i64()
                .map(FieldValue::Integer)
                .unwrap_or_else(|| FieldValue::String(n.to_string()))),
            Value::Null => Err("field may not be null".into()),
            Value::Array(_) | Value::Object(_) => Err("expected a string, number, or boolean".into()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Boolean(true) => f.write_str("True"),
            Self::Boolean(false) => f.write_str("False"),
        }
    }
}

/// Declaration of one schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub required: bool,
    /// Substituted when the field is absent.  Already checked against `kind`.
    pub default: Option<FieldValue>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a default, checking it against the field kind.
    pub fn with_default(mut self, raw: &Value) -> Result<Self, String> {
        self.default = Some(self.kind.validate(raw)?);
        Ok(self)
    }
}

/// Validator table for a label type's data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Validate submitted data, substituting defaults.
    ///
    /// Fields not declared in the schema are ignored and left out of the
    /// result.  Every offending field is reported, not just the first.
    pub fn validate(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, FieldValue>, ValidationError> {
        let mut values = BTreeMap::new();
        let mut errors = ValidationError::default();

        for (name, spec) in &self.fields {
            match raw.get(name) {
                Some(value) => match spec.kind.validate(value) {
                    Ok(v) => {
                        values.insert(name.clone(), v);
                    }
                    Err(message) => errors.add(name, message),
                },
                None => match &spec.default {
                    Some(default) => {
                        values.insert(name.clone(), default.clone());
                    }
                    None if spec.required => errors.add(name, "missing required field"),
                    None => {}
                },
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            Err(errors)
        }
    }
}

/// Accept every submitted scalar as-is (label types without a schema).
pub fn accept_scalars(
    raw: &Map<String, Value>,
) -> Result<BTreeMap<String, FieldValue>, ValidationError> {
    let mut values = BTreeMap::new();
    let mut errors = ValidationError::default();
    for (name, value) in raw {
        match FieldValue::from_scalar(value) {
            Ok(v) => {
                values.insert(name.clone(), v);
            }
            Err(message) => errors.add(name, message),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}
