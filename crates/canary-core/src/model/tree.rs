//! Property trees: resource attributes with CloudFormation reference forms made explicit.
//!
//! JSON is converted into a `PropertyTree` on load and back on save. The
//! conversion is lossless: an object is only lifted into `Ref`, `GetAtt`, `Sub`
//! or `Join` when it has exactly the shape of that intrinsic, everything else
//! stays a plain `Map`/`List` and is written back unchanged.
//!
//! Reference discovery walks the tree structurally instead of searching the
//! serialized text, so `HelloLambdaFunction` never matches inside
//! `HelloLambdaFunctionTwo`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::errors::{CanaryError, CanaryResult};
use crate::model::sub::{is_pseudo_parameter, SubPattern};
use crate::model::LogicalId;

pub const REF: &str = "Ref";
pub const FN_GET_ATT: &str = "Fn::GetAtt";
pub const FN_SUB: &str = "Fn::Sub";
pub const FN_JOIN: &str = "Fn::Join";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum PropertyTree {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<PropertyTree>),
    Map(IndexMap<String, PropertyTree>),
    Ref(LogicalId),
    GetAtt {
        logical_id: LogicalId,
        attribute: String,
        /// Written as `"Id.Attr"` rather than `["Id", "Attr"]`.
        dotted: bool,
    },
    Sub {
        pattern: String,
        variables: Option<IndexMap<String, PropertyTree>>,
    },
    Join {
        delimiter: String,
        parts: Vec<PropertyTree>,
    },
}

/// How a logical id is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Ref,
    GetAtt,
    Sub,
}

/// A reference to a logical id found inside a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub logical_id: LogicalId,
    pub attribute: Option<String>,
    pub kind: ReferenceKind,
}

impl PropertyTree {
    pub fn reference(logical_id: impl Into<LogicalId>) -> Self {
        Self::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<LogicalId>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
            dotted: false,
        }
    }

    pub fn sub(pattern: impl Into<String>) -> Self {
        Self::Sub {
            pattern: pattern.into(),
            variables: None,
        }
    }

    pub fn sub_with(
        pattern: impl Into<String>,
        variables: impl IntoIterator<Item = (String, PropertyTree)>,
    ) -> Self {
        Self::Sub {
            pattern: pattern.into(),
            variables: Some(variables.into_iter().collect()),
        }
    }

    /// Build a map node, preserving the given key order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PropertyTree)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = PropertyTree>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The target of a plain `Ref`.
    pub fn as_ref_target(&self) -> Option<&str> {
        match self {
            Self::Ref(id) => Some(id),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyTree> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn get_path(&self, path: &[&str]) -> Option<&PropertyTree> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Set `value` at `path`, creating intermediate maps as needed.
    ///
    /// Fails when an intermediate node exists but is not a map.
    pub fn set_path(&mut self, path: &[&str], value: PropertyTree) -> CanaryResult<()> {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return Ok(());
        };

        let mut node = self;
        for key in parents {
            let Self::Map(m) = node else {
                return Err(CanaryError::invalid_template(format!(
                    "cannot set {}: `{key}` is not inside an object",
                    path.join(".")
                )));
            };
            node = m
                .entry((*key).to_string())
                .or_insert_with(|| Self::Map(IndexMap::new()));
        }

        match node {
            Self::Map(m) => {
                m.insert((*last).to_string(), value);
                Ok(())
            }
            _ => Err(CanaryError::invalid_template(format!(
                "cannot set {}: parent is not an object",
                path.join(".")
            ))),
        }
    }

    /// All references in the tree, in document order.
    ///
    /// Pseudo parameters and `Fn::Sub` local variables are not references.
    /// `Fn::Sub` patterns that do not parse contribute nothing; use
    /// `try_references` to reject them instead.
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        // Lenient walk never fails.
        let _ = self.walk(false, &mut out);
        out
    }

    /// Like `references`, but an unparsable `Fn::Sub` pattern is an error.
    pub fn try_references(&self) -> CanaryResult<Vec<Reference>> {
        let mut out = Vec::new();
        self.walk(true, &mut out)?;
        Ok(out)
    }

    /// True when any reference form in the tree targets `logical_id` exactly.
    pub fn references_id(&self, logical_id: &str) -> bool {
        self.references().iter().any(|r| r.logical_id == logical_id)
    }

    fn walk(&self, strict: bool, out: &mut Vec<Reference>) -> CanaryResult<()> {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => Ok(()),
            Self::List(items) => items.iter().try_for_each(|i| i.walk(strict, out)),
            Self::Map(m) => m.values().try_for_each(|v| v.walk(strict, out)),
            Self::Ref(id) => {
                if !is_pseudo_parameter(id) {
                    out.push(Reference {
                        logical_id: id.clone(),
                        attribute: None,
                        kind: ReferenceKind::Ref,
                    });
                }
                Ok(())
            }
            Self::GetAtt {
                logical_id,
                attribute,
                ..
            } => {
                out.push(Reference {
                    logical_id: logical_id.clone(),
                    attribute: Some(attribute.clone()),
                    kind: ReferenceKind::GetAtt,
                });
                Ok(())
            }
            Self::Sub { pattern, variables } => {
                match SubPattern::parse(pattern) {
                    Ok(parsed) => {
                        for (name, attribute) in parsed.variables() {
                            let local = variables.as_ref().is_some_and(|v| v.contains_key(name));
                            if local || is_pseudo_parameter(name) {
                                continue;
                            }
                            out.push(Reference {
                                logical_id: name.to_string(),
                                attribute: attribute.map(str::to_string),
                                kind: ReferenceKind::Sub,
                            });
                        }
                    }
                    Err(e) if strict => return Err(e),
                    Err(_) => {}
                }
                if let Some(vars) = variables {
                    vars.values().try_for_each(|v| v.walk(strict, out))?;
                }
                Ok(())
            }
            Self::Join { parts, .. } => parts.iter().try_for_each(|p| p.walk(strict, out)),
        }
    }
}

impl From<&str> for PropertyTree {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyTree {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropertyTree {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Value> for PropertyTree {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => from_object(map),
        }
    }
}

fn from_object(map: Map<String, Value>) -> PropertyTree {
    if map.len() == 1 {
        if let Some(tree) = map.iter().next().and_then(|(k, v)| intrinsic(k, v)) {
            return tree;
        }
    }
    PropertyTree::Map(
        map.into_iter()
            .map(|(k, v)| (k, PropertyTree::from(v)))
            .collect(),
    )
}

/// Lift a single-key object into a reference form when the shape matches exactly.
fn intrinsic(key: &str, value: &Value) -> Option<PropertyTree> {
    match (key, value) {
        (REF, Value::String(id)) => Some(PropertyTree::Ref(id.clone())),
        (FN_GET_ATT, Value::String(dotted)) => {
            let (id, attr) = dotted.split_once('.')?;
            Some(PropertyTree::GetAtt {
                logical_id: id.to_string(),
                attribute: attr.to_string(),
                dotted: true,
            })
        }
        (FN_GET_ATT, Value::Array(items)) => match items.as_slice() {
            [Value::String(id), Value::String(attr)] => Some(PropertyTree::GetAtt {
                logical_id: id.clone(),
                attribute: attr.clone(),
                dotted: false,
            }),
            _ => None,
        },
        (FN_SUB, Value::String(pattern)) => Some(PropertyTree::sub(pattern.clone())),
        (FN_SUB, Value::Array(items)) => match items.as_slice() {
            [Value::String(pattern), Value::Object(vars)] => Some(PropertyTree::Sub {
                pattern: pattern.clone(),
                variables: Some(
                    vars.iter()
                        .map(|(k, v)| (k.clone(), PropertyTree::from(v.clone())))
                        .collect(),
                ),
            }),
            _ => None,
        },
        (FN_JOIN, Value::Array(items)) => match items.as_slice() {
            [Value::String(delimiter), Value::Array(parts)] => Some(PropertyTree::Join {
                delimiter: delimiter.clone(),
                parts: parts.iter().cloned().map(PropertyTree::from).collect(),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value);
    Value::Object(m)
}

fn object(entries: IndexMap<String, PropertyTree>) -> Value {
    Value::Object(entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

impl From<PropertyTree> for Value {
    fn from(t: PropertyTree) -> Self {
        match t {
            PropertyTree::Null => Value::Null,
            PropertyTree::Bool(b) => Value::Bool(b),
            PropertyTree::Number(n) => Value::Number(n),
            PropertyTree::String(s) => Value::String(s),
            PropertyTree::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            PropertyTree::Map(m) => object(m),
            PropertyTree::Ref(id) => single(REF, Value::String(id)),
            PropertyTree::GetAtt {
                logical_id,
                attribute,
                dotted: true,
            } => single(FN_GET_ATT, Value::String(format!("{logical_id}.{attribute}"))),
            PropertyTree::GetAtt {
                logical_id,
                attribute,
                dotted: false,
            } => single(
                FN_GET_ATT,
                Value::Array(vec![Value::String(logical_id), Value::String(attribute)]),
            ),
            PropertyTree::Sub {
                pattern,
                variables: None,
            } => single(FN_SUB, Value::String(pattern)),
            PropertyTree::Sub {
                pattern,
                variables: Some(vars),
            } => single(FN_SUB, Value::Array(vec![Value::String(pattern), object(vars)])),
            PropertyTree::Join { delimiter, parts } => single(
                FN_JOIN,
                Value::Array(vec![
                    Value::String(delimiter),
                    Value::Array(parts.into_iter().map(Value::from).collect()),
                ]),
            ),
        }
    }
}
