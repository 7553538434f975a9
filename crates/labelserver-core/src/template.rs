// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label templates with named placeholders.
//
// Syntax:
//
//   %(name)s   value of field `name`, any kind
//   %(name)d   value of field `name`, integers only
//   %%         a literal percent sign
//
// Templates are parsed once when the label type is built, so a malformed
// template is a configuration error rather than a per-job failure.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::schema::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Any,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, conversion: Conversion },
}

/// A parsed label template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.  The error message names the offending
    /// byte offset.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some((_, '%')) => literal.push('%'),
                Some((_, '(')) => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, ')')) => break,
                            Some((_, ch)) => name.push(ch),
                            None => return Err(format!("unterminated placeholder at offset {pos}")),
                        }
                    }
                    if name.is_empty() {
                        return Err(format!("empty placeholder name at offset {pos}"));
                    }
                    let conversion = match chars.next() {
                        Some((_, 's')) => Conversion::Any,
                        Some((_, 'd')) => Conversion::Integer,
                        Some((_, other)) => {
                            return Err(format!(
                                "unsupported conversion '{other}' for placeholder '{name}'"
                            ));
                        }
                        None => {
                            return Err(format!("missing conversion for placeholder '{name}'"));
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field { name, conversion });
                }
                _ => return Err(format!("stray '%' at offset {pos}, use '%%' for a literal")),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of all placeholders, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field { name, .. } = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute values into the template.
    ///
    /// All placeholders are checked before any output is produced; on
    /// failure every unusable placeholder is named.
    pub fn render(&self, values: &BTreeMap<String, FieldValue>) -> Result<String, ValidationError> {
        let mut errors = ValidationError::default();
        for segment in &self.segments {
            if let Segment::Field { name, conversion } = segment {
                match (values.get(name), conversion) {
                    (None, _) => errors.add(name, "no value for template placeholder"),
                    (Some(FieldValue::Integer(_)), Conversion::Integer) => {}
                    (Some(_), Conversion::Integer) => errors.add(name, "template expects an integer"),
                    (Some(_), Conversion::Any) => {}
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, .. } => {
                    if let Some(value) = values.get(name) {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_named_placeholders() {
        let t = Template::parse("COUNT=%(count)s of %(total)d").unwrap();
        let out = t
            .render(&values(&[
                ("count", FieldValue::Integer(3)),
                ("total", FieldValue::Integer(10)),
            ]))
            .unwrap();
        assert_eq!(out, "COUNT=3 of 10");
    }

    #[test]
    fn percent_escape() {
        let t = Template::parse("100%% %(n)s").unwrap();
        let out = t
            .render(&values(&[("n", FieldValue::String("done".into()))]))
            .unwrap();
        assert_eq!(out, "100% done");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(Template::parse("50% off").is_err());
        assert!(Template::parse("%(open").is_err());
        assert!(Template::parse("%()s").is_err());
        assert!(Template::parse("%(x)f").is_err());
        assert!(Template::parse("%(x)").is_err());
    }

    #[test]
    fn missing_value_names_the_placeholder() {
        let t = Template::parse("%(a)s-%(b)s").unwrap();
        let err = t
            .render(&values(&[("a", FieldValue::Integer(1))]))
            .unwrap_err();
        assert!(err.names("b"));
        assert!(!err.names("a"));
    }

    #[test]
    fn integer_conversion_rejects_strings() {
        let t = Template::parse("%(n)d").unwrap();
        let err = t
            .render(&values(&[("n", FieldValue::String("3".into()))]))
            .unwrap_err();
        assert!(err.names("n"));
    }

    #[test]
    fn placeholders_are_deduplicated() {
        let t = Template::parse("%(a)s %(b)s %(a)s").unwrap();
        assert_eq!(t.placeholders(), vec!["a", "b"]);
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let t = Template::parse("Größe: %(s)s\n").unwrap();
        let out = t
            .render(&values(&[("s", FieldValue::String("XL".into()))]))
            .unwrap();
        assert_eq!(out, "Größe: XL\n");
    }
}
