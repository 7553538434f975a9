// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label types: a named template plus an optional field schema.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{LabelError, Result, ValidationError};
use crate::schema::{self, Schema};
use crate::template::Template;
use crate::types::{Job, LabelTypeInfo};

/// One printable kind of label.
///
/// Immutable once built, so a single instance can serve concurrent
/// submissions.
#[derive(Debug, Clone)]
pub struct LabelType {
    id: String,
    name: String,
    template: Template,
    schema: Option<Schema>,
}

impl LabelType {
    /// Build a label type.  `name` defaults to `id`.
    ///
    /// # Errors
    ///
    /// Returns `LabelError::Configuration` if the template cannot be parsed.
    pub fn new(
        id: impl Into<String>,
        name: Option<String>,
        template: &str,
        schema: Option<Schema>,
    ) -> Result<Self> {
        let id = id.into();
        let template = Template::parse(template)
            .map_err(|e| LabelError::Configuration(format!("label type {id}: template: {e}")))?;
        Ok(Self {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            template,
            schema,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn info(&self) -> LabelTypeInfo {
        LabelTypeInfo {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    /// Validate submitted data and render it into an unqueued job.
    ///
    /// Either the whole payload is rendered or nothing is; the returned job
    /// has status `NONE` and no id until a printer accepts it.
    pub fn prepare(&self, raw: &Map<String, Value>) -> std::result::Result<Job, ValidationError> {
        let values = match &self.schema {
            Some(schema) => schema.validate(raw)?,
            None => schema::accept_scalars(raw)?,
        };
        let payload = self.template.render(&values)?;
        debug!(label_type = %self.id, bytes = payload.len(), "label prepared");
        Ok(Job::new(self.id.clone(), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec};
    use crate::types::JobStatus;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn count_label() -> LabelType {
        LabelType::new(
            "count",
            None,
            "COUNT=%(count)s",
            Some(Schema::new().field("count", FieldSpec::new(FieldKind::Integer).required())),
        )
        .unwrap()
    }

    #[test]
    fn required_integer_scenario() {
        let label = count_label();

        let err = label.prepare(&Map::new()).unwrap_err();
        assert!(err.names("count"));

        let job = label.prepare(&object(json!({"count": 3}))).unwrap();
        assert_eq!(job.data(), "COUNT=3");
        assert_eq!(job.status(), JobStatus::None);
        assert!(job.id().is_none());
        assert_eq!(job.label_type(), "count");
    }

    #[test]
    fn name_defaults_to_id() {
        let label = count_label();
        assert_eq!(label.name(), "count");
        let named = LabelType::new("a", Some("Asset tag".into()), "x", None).unwrap();
        assert_eq!(named.info().name, "Asset tag");
    }

    #[test]
    fn bad_template_is_configuration_error() {
        let err = LabelType::new("bad", None, "50% off", None).unwrap_err();
        assert!(matches!(err, LabelError::Configuration(_)));
    }

    #[test]
    fn without_schema_all_scalars_are_rendered() {
        let label = LabelType::new("free", None, "%(title)s/%(n)s/%(ok)s", None).unwrap();
        let job = label
            .prepare(&object(json!({"title": "Box", "n": 4, "ok": true})))
            .unwrap();
        assert_eq!(job.data(), "Box/4/True");
    }

    #[test]
    fn optional_field_used_in_template_must_be_supplied() {
        let label = LabelType::new(
            "opt",
            None,
            "%(note)s",
            Some(Schema::new().field("note", FieldSpec::new(FieldKind::String))),
        )
        .unwrap();
        assert!(label.prepare(&Map::new()).unwrap_err().names("note"));
        assert_eq!(
            label.prepare(&object(json!({"note": "hi"}))).unwrap().data(),
            "hi"
        );
    }

    #[test]
    fn prepare_is_usable_from_many_threads() {
        let label = std::sync::Arc::new(count_label());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let label = std::sync::Arc::clone(&label);
                std::thread::spawn(move || {
                    label
                        .prepare(&object(json!({"count": i})))
                        .map(|job| job.data().to_string())
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), format!("COUNT={i}"));
        }
    }
}
