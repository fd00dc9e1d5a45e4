//! Resources, the resource map, and the template document that owns it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::{CanaryError, CanaryResult};
use crate::model::tree::PropertyTree;
use crate::model::LogicalId;

pub const PROPERTIES: &str = "Properties";
pub const UPDATE_POLICY: &str = "UpdatePolicy";
pub const PARAMETERS: &str = "Parameters";
pub const RESOURCES: &str = "Resources";

/// Resource types the transform recognizes. Everything else is `Other` and left alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    LambdaFunction,
    LambdaVersion,
    LambdaAlias,
    LambdaPermission,
    ApiGatewayMethod,
    ApiGatewayRestApi,
    CodeDeployApplication,
    CodeDeployDeploymentGroup,
    IamRole,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::LambdaFunction => "AWS::Lambda::Function",
            Self::LambdaVersion => "AWS::Lambda::Version",
            Self::LambdaAlias => "AWS::Lambda::Alias",
            Self::LambdaPermission => "AWS::Lambda::Permission",
            Self::ApiGatewayMethod => "AWS::ApiGateway::Method",
            Self::ApiGatewayRestApi => "AWS::ApiGateway::RestApi",
            Self::CodeDeployApplication => "AWS::CodeDeploy::Application",
            Self::CodeDeployDeploymentGroup => "AWS::CodeDeploy::DeploymentGroup",
            Self::IamRole => "AWS::IAM::Role",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "AWS::Lambda::Function" => Self::LambdaFunction,
            "AWS::Lambda::Version" => Self::LambdaVersion,
            "AWS::Lambda::Alias" => Self::LambdaAlias,
            "AWS::Lambda::Permission" => Self::LambdaPermission,
            "AWS::ApiGateway::Method" => Self::ApiGatewayMethod,
            "AWS::ApiGateway::RestApi" => Self::ApiGatewayRestApi,
            "AWS::CodeDeploy::Application" => Self::CodeDeployApplication,
            "AWS::CodeDeploy::DeploymentGroup" => Self::CodeDeployDeploymentGroup,
            "AWS::IAM::Role" => Self::IamRole,
            _ => Self::Other(s),
        }
    }
}

impl From<ResourceType> for String {
    fn from(t: ResourceType) -> Self {
        match t {
            ResourceType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single template resource.
///
/// `Type` is always written first; the remaining attributes (`Properties`,
/// `UpdatePolicy`, `DependsOn`, ...) keep their document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: ResourceType,

    #[serde(flatten)]
    pub attributes: IndexMap<String, PropertyTree>,
}

impl Resource {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyTree) -> Self {
        self.attributes.insert(PROPERTIES.to_string(), properties);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: PropertyTree) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn is(&self, resource_type: &ResourceType) -> bool {
        &self.resource_type == resource_type
    }

    pub fn properties(&self) -> Option<&PropertyTree> {
        self.attributes.get(PROPERTIES)
    }

    pub fn property(&self, path: &[&str]) -> Option<&PropertyTree> {
        self.properties()?.get_path(path)
    }

    /// Set a value under `Properties`, creating the section if needed.
    pub fn set_property(&mut self, path: &[&str], value: PropertyTree) -> CanaryResult<()> {
        self.attributes
            .entry(PROPERTIES.to_string())
            .or_insert_with(|| PropertyTree::Map(IndexMap::new()))
            .set_path(path, value)
    }

    pub fn update_policy(&self) -> Option<&PropertyTree> {
        self.attributes.get(UPDATE_POLICY)
    }
}

/// Ordered mapping from logical id to resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceMap(IndexMap<LogicalId, Resource>);

impl ResourceMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Insert or overwrite. An overwritten id keeps its position.
    pub fn insert(&mut self, id: impl Into<LogicalId>, resource: Resource) -> Option<Resource> {
        self.0.insert(id.into(), resource)
    }

    /// Overwrite-union: every entry of `other` replaces or appends.
    pub fn merge(&mut self, other: ResourceMap) {
        self.0.extend(other.0);
    }

    /// Iterate in map order.
    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.0.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &LogicalId> {
        self.0.keys()
    }

    /// Resources of one type, in map order.
    pub fn of_type<'a>(
        &'a self,
        resource_type: &'a ResourceType,
    ) -> impl Iterator<Item = (&'a LogicalId, &'a Resource)> + 'a {
        self.0.iter().filter(move |(_, r)| r.is(resource_type))
    }
}

impl FromIterator<(LogicalId, Resource)> for ResourceMap {
    fn from_iter<I: IntoIterator<Item = (LogicalId, Resource)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ResourceMap {
    type Item = (LogicalId, Resource);
    type IntoIter = indexmap::map::IntoIter<LogicalId, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A compiled CloudFormation template.
///
/// Only `Resources` is modelled; every other section is carried verbatim and
/// written back at its original position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Template {
    sections: Map<String, Value>,
    pub resources: ResourceMap,
}

impl Template {
    pub fn from_value(v: Value) -> CanaryResult<Self> {
        let Value::Object(mut sections) = v else {
            return Err(CanaryError::invalid_template("template must be a JSON object"));
        };

        let resources = match sections.get_mut(RESOURCES) {
            Some(slot) => {
                // Leave a placeholder so the section keeps its position.
                let raw = slot.take();
                if !raw.is_object() {
                    return Err(CanaryError::invalid_template("`Resources` must be an object"));
                }
                serde_json::from_value::<ResourceMap>(raw).map_err(|e| {
                    CanaryError::invalid_template(format!("failed to decode resources: {e}"))
                })?
            }
            None => {
                sections.insert(RESOURCES.to_string(), Value::Null);
                ResourceMap::new()
            }
        };

        Ok(Self {
            sections,
            resources,
        })
    }

    pub fn from_json_str(s: &str) -> CanaryResult<Self> {
        let v: Value = serde_json::from_str(s)?;
        Self::from_value(v)
    }

    pub fn to_value(&self) -> CanaryResult<Value> {
        let mut out = Map::new();
        for (key, value) in &self.sections {
            if key == RESOURCES {
                out.insert(key.clone(), serde_json::to_value(&self.resources)?);
            } else {
                out.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Object(out))
    }

    pub fn to_json_pretty(&self) -> CanaryResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_value()?)?)
    }

    /// A non-`Resources` section, untouched.
    pub fn section(&self, name: &str) -> Option<&Value> {
        if name == RESOURCES {
            return None;
        }
        self.sections.get(name)
    }

    /// Logical ids declared under `Parameters`, in document order.
    pub fn parameter_ids(&self) -> impl Iterator<Item = &String> {
        self.sections
            .get(PARAMETERS)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|params| params.keys())
    }
}

impl TryFrom<Value> for Template {
    type Error = CanaryError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        Self::from_value(v)
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
