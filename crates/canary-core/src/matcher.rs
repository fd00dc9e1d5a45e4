//! Queries over a `ResourceMap`. Nothing in this module mutates the map.

use std::collections::BTreeSet;

use crate::errors::{CanaryError, CanaryResult};
use crate::model::{LogicalId, PropertyTree, Resource, ResourceMap, ResourceType};

/// Principal used by API Gateway invoke permissions.
pub const API_GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Result of a version lookup.
///
/// More than one candidate is resolved to the first in map order; the rest
/// are kept so the caller can surface the ambiguity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatch {
    pub logical_id: LogicalId,
    pub other_candidates: Vec<LogicalId>,
}

impl VersionMatch {
    pub fn is_ambiguous(&self) -> bool {
        !self.other_candidates.is_empty()
    }
}

pub fn has_type(resource: &Resource, resource_type: &ResourceType) -> bool {
    resource.is(resource_type)
}

/// Find the `AWS::Lambda::Version` whose `FunctionName` is `Ref(function_id)`.
pub fn find_version_resource_for(
    resources: &ResourceMap,
    function_id: &str,
) -> CanaryResult<VersionMatch> {
    let mut candidates = resources
        .of_type(&ResourceType::LambdaVersion)
        .filter(|(_, r)| {
            r.property(&["FunctionName"])
                .and_then(PropertyTree::as_ref_target)
                == Some(function_id)
        })
        .map(|(id, _)| id.clone());

    let first = candidates
        .next()
        .ok_or_else(|| CanaryError::MissingVersionResource {
            function: function_id.to_string(),
        })?;

    Ok(VersionMatch {
        logical_id: first,
        other_candidates: candidates.collect(),
    })
}

/// API Gateway methods whose `Integration` references `function_id`.
///
/// An empty result is valid: the function is not exposed over HTTP.
pub fn find_method_resources_for(resources: &ResourceMap, function_id: &str) -> Vec<LogicalId> {
    resources
        .of_type(&ResourceType::ApiGatewayMethod)
        .filter(|(_, r)| {
            r.property(&["Integration"])
                .is_some_and(|integration| integration.references_id(function_id))
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Ids a REST API can be reached through: every `AWS::ApiGateway::RestApi`
/// in the map plus whatever the given methods use as `RestApiId`.
///
/// The second set covers APIs declared outside the template, such as a
/// `RestApiId` passed in as a parameter.
pub fn rest_api_ids_for(resources: &ResourceMap, methods: &[LogicalId]) -> BTreeSet<LogicalId> {
    let mut ids: BTreeSet<LogicalId> = resources
        .of_type(&ResourceType::ApiGatewayRestApi)
        .map(|(id, _)| id.clone())
        .collect();
    for method in methods.iter().filter_map(|id| resources.get(id)) {
        if let Some(api) = method.property(&["RestApiId"]) {
            ids.extend(api.references().into_iter().map(|r| r.logical_id));
        }
    }
    ids
}

/// Lambda permissions granting a REST API the right to invoke `function_id`.
///
/// A permission with a `SourceArn` must reference one of `rest_api_ids`, so
/// grants for HTTP or WebSocket APIs (same principal) are left alone. A
/// permission without a resolvable source is not scoped and matches.
pub fn find_invoke_permissions_for(
    resources: &ResourceMap,
    function_id: &str,
    rest_api_ids: &BTreeSet<LogicalId>,
) -> Vec<LogicalId> {
    resources
        .of_type(&ResourceType::LambdaPermission)
        .filter(|(_, r)| {
            r.property(&["Principal"]).and_then(PropertyTree::as_str) == Some(API_GATEWAY_PRINCIPAL)
        })
        .filter(|(_, r)| {
            r.property(&["FunctionName"])
                .is_some_and(|name| name.references_id(function_id))
        })
        .filter(|(_, r)| match r.property(&["SourceArn"]).map(PropertyTree::references) {
            None => true,
            Some(refs) if refs.is_empty() => true,
            Some(refs) => refs.iter().any(|r| rest_api_ids.contains(&r.logical_id)),
        })
        .map(|(id, _)| id.clone())
        .collect()
}
