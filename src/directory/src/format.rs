// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Templates such as `{cn}_ro` or `{member.sAMAccountName}`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// A parsed template.
///
/// A template is a sequence of literal text and `{expression}` fields. An
/// expression is an attribute path: `attribute`, `dn` or
/// `attribute.field`. `{{` and `}}` stand for literal braces.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Format {
    input: String,
    fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Field {
    literal: String,
    expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unterminated expression in {0:?}")]
    Unterminated(String),
    #[error("single '}}' encountered in {0:?}")]
    UnmatchedBrace(String),
    #[error("invalid expression {expression:?} in {input:?}")]
    InvalidExpression { input: String, expression: String },
}

impl Format {
    pub fn parse(input: &str) -> Result<Format, FormatError> {
        let mut fields = vec![];
        let mut literal = String::new();
        let mut chars = input.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.next_if_eq(&'{').is_some() => literal.push('{'),
                '}' if chars.next_if_eq(&'}').is_some() => literal.push('}'),
                '}' => return Err(FormatError::UnmatchedBrace(input.to_string())),
                '{' => {
                    let mut expression = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(FormatError::Unterminated(input.to_string()))
                            }
                            Some(c) => expression.push(c),
                        }
                    }
                    if !is_valid_expression(&expression) {
                        return Err(FormatError::InvalidExpression {
                            input: input.to_string(),
                            expression,
                        });
                    }
                    fields.push(Field {
                        literal: std::mem::take(&mut literal),
                        expression: Some(expression),
                    });
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            fields.push(Field {
                literal,
                expression: None,
            });
        }
        Ok(Format {
            input: input.to_string(),
            fields,
        })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Reports whether the template references no expression at all.
    pub fn is_static(&self) -> bool {
        self.expressions().next().is_none()
    }

    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter_map(|field| field.expression.as_deref())
    }

    /// Renders the template. Expressions missing from `values` render as
    /// the empty string.
    pub fn format(&self, values: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for field in &self.fields {
            out.push_str(&field.literal);
            if let Some(value) = field.expression.as_ref().and_then(|e| values.get(e)) {
                out.push_str(value);
            }
        }
        out
    }
}

fn is_valid_expression(expression: &str) -> bool {
    let valid_part = |part: &str| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    };
    match expression.split_once('.') {
        None => valid_part(expression),
        Some((attribute, field)) => valid_part(attribute) && valid_part(field),
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Format, FormatError> {
        Format::parse(s)
    }
}

impl TryFrom<String> for Format {
    type Error = FormatError;

    fn try_from(s: String) -> Result<Format, FormatError> {
        Format::parse(&s)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.input)
    }
}

/// Lists the distinct expressions of `formats`, in order of first
/// appearance.
pub fn list_expressions<'a, I>(formats: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Format>,
{
    let mut expressions: Vec<String> = vec![];
    for expression in formats.into_iter().flat_map(|f| f.expressions()) {
        if !expressions.iter().any(|e| e == expression) {
            expressions.push(expression.to_string());
        }
    }
    expressions
}

/// Lists the distinct attributes referenced by `expressions`, in order of
/// first appearance. The attribute of `member.cn` is `member`.
pub fn list_variables<S: AsRef<str>>(expressions: &[S]) -> Vec<String> {
    let mut variables: Vec<String> = vec![];
    for expression in expressions {
        let expression = expression.as_ref();
        let variable = expression
            .split_once('.')
            .map_or(expression, |(attribute, _)| attribute);
        if !variables.iter().any(|v| v.eq_ignore_ascii_case(variable)) {
            variables.push(variable.to_string());
        }
    }
    variables
}
