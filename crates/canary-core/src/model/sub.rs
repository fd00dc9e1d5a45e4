//! `Fn::Sub` pattern parsing.
//!
//! A pattern is a string with `${...}` placeholders:
//! - `${Name}` references a resource, parameter or pseudo parameter
//! - `${Name.Attribute}` is the `Fn::GetAtt` shorthand
//! - `${!Literal}` is an escape and renders as the literal text `${Literal}`

use std::str::FromStr;

use crate::errors::{CanaryError, CanaryResult};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubPattern {
    pub parts: Vec<SubPart>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubPart {
    Literal(String),
    Variable {
        name: String,
        attribute: Option<String>,
    },
}

impl SubPart {
    fn variable(inner: &str) -> Self {
        match inner.split_once('.') {
            Some((name, attribute)) => SubPart::Variable {
                name: name.to_string(),
                attribute: Some(attribute.to_string()),
            },
            None => SubPart::Variable {
                name: inner.to_string(),
                attribute: None,
            },
        }
    }
}

impl SubPattern {
    /// Parse a pattern string.
    pub fn parse(input: &str) -> CanaryResult<Self> {
        input.parse()
    }

    /// Visit every variable as `(name, attribute)`, in pattern order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.parts.iter().filter_map(|p| match p {
            SubPart::Variable { name, attribute } => Some((name.as_str(), attribute.as_deref())),
            SubPart::Literal(_) => None,
        })
    }
}

/// Pseudo parameters (`AWS::Region`, `AWS::Partition`, ...) are not logical ids.
pub fn is_pseudo_parameter(name: &str) -> bool {
    name.starts_with("AWS::")
}

fn invalid(pattern: &str, reason: &str) -> CanaryError {
    CanaryError::InvalidSubPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for SubPattern {
    type Err = CanaryError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| invalid(input, "unterminated `${`"))?;
            let inner = &after[..end];
            rest = &after[end + 1..];

            if let Some(escaped) = inner.strip_prefix('!') {
                literal.push_str("${");
                literal.push_str(escaped);
                literal.push('}');
                continue;
            }

            let inner = inner.trim();
            if inner.is_empty() {
                return Err(invalid(input, "empty `${}` placeholder"));
            }
            if !literal.is_empty() {
                parts.push(SubPart::Literal(std::mem::take(&mut literal)));
            }
            parts.push(SubPart::variable(inner));
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(SubPart::Literal(literal));
        }

        Ok(SubPattern { parts })
    }
}
