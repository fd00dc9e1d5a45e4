//! Reference integrity for resources a pass creates or rewrites.

use crate::errors::{CanaryError, CanaryResult};
use crate::model::{PropertyTree, Resource};

/// Every logical id referenced anywhere in `resource` must satisfy `is_known`.
///
/// Pseudo parameters (`AWS::Region`, ...) and `Fn::Sub` local variables are
/// not logical ids. An unparsable `Fn::Sub` pattern is an error.
pub fn check_references(
    resource_id: &str,
    resource: &Resource,
    is_known: impl Fn(&str) -> bool,
) -> CanaryResult<()> {
    for tree in resource.attributes.values() {
        check_tree(resource_id, tree, &is_known)?;
    }
    Ok(())
}

/// Like `check_references`, limited to the property at `path`.
///
/// Used for resources the pass only retargeted: the rest of the resource is
/// the template author's and is not checked. A missing property passes.
pub fn check_property_references(
    resource_id: &str,
    resource: &Resource,
    path: &[&str],
    is_known: impl Fn(&str) -> bool,
) -> CanaryResult<()> {
    match resource.property(path) {
        Some(tree) => check_tree(resource_id, tree, &is_known),
        None => Ok(()),
    }
}

fn check_tree(
    resource_id: &str,
    tree: &PropertyTree,
    is_known: &impl Fn(&str) -> bool,
) -> CanaryResult<()> {
    match tree
        .try_references()?
        .into_iter()
        .find(|r| !is_known(r.logical_id.as_str()))
    {
        Some(missing) => Err(CanaryError::DanglingReference {
            resource: resource_id.to_string(),
            target: missing.logical_id,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceMap, ResourceType};
    use assert_matches::assert_matches;

    fn existing() -> impl Fn(&str) -> bool {
        let map: ResourceMap = [
            ("A".to_string(), Resource::new(ResourceType::LambdaFunction)),
            ("B".to_string(), Resource::new(ResourceType::LambdaVersion)),
        ]
        .into_iter()
        .collect();
        move |id| map.contains(id)
    }

    #[test]
    fn resolved_references_pass() {
        let r = Resource::new(ResourceType::LambdaAlias).with_properties(PropertyTree::map([
            ("FunctionName", PropertyTree::reference("A")),
            ("FunctionVersion", PropertyTree::get_att("B", "Version")),
            ("Region", PropertyTree::reference("AWS::Region")),
        ]));
        check_references("X", &r, existing()).unwrap();
    }

    #[test]
    fn update_policy_is_checked_too() {
        let r = Resource::new(ResourceType::LambdaAlias).with_attribute(
            "UpdatePolicy",
            PropertyTree::map([("Hook", PropertyTree::reference("PreHookLambdaFunction"))]),
        );
        assert_matches!(
            check_references("X", &r, existing()),
            Err(CanaryError::DanglingReference { resource, target })
                if resource == "X" && target == "PreHookLambdaFunction"
        );
    }

    #[test]
    fn sub_variables_are_checked() {
        let r = Resource::new(ResourceType::ApiGatewayMethod)
            .with_properties(PropertyTree::map([("Uri", PropertyTree::sub("${Missing}"))]));
        assert!(check_references("M", &r, existing()).is_err());
    }

    #[test]
    fn property_check_ignores_the_rest_of_the_resource() {
        let r = Resource::new(ResourceType::ApiGatewayMethod).with_properties(PropertyTree::map([
            ("RestApiId", PropertyTree::reference("RestApiIdParam")),
            (
                "Integration",
                PropertyTree::map([("Uri", PropertyTree::sub("${A}/invocations"))]),
            ),
        ]));
        check_property_references("M", &r, &["Integration", "Uri"], existing()).unwrap();
        assert_matches!(
            check_references("M", &r, existing()),
            Err(CanaryError::DanglingReference { target, .. }) if target == "RestApiIdParam"
        );
    }

    #[test]
    fn property_check_still_rejects_dangling_targets() {
        let r = Resource::new(ResourceType::LambdaPermission)
            .with_properties(PropertyTree::map([("FunctionName", PropertyTree::reference("Gone"))]));
        assert!(check_property_references("P", &r, &["FunctionName"], existing()).is_err());
        check_property_references("P", &r, &["Missing"], existing()).unwrap();
    }
}
