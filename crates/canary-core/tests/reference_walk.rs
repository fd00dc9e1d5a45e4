//! Property tests for structural reference matching.

use canary_core::matcher::{find_method_resources_for, find_version_resource_for};
use canary_core::model::{PropertyTree, ResourceMap};
use proptest::prelude::*;
use serde_json::json;

fn method_for(function_id: &str) -> serde_json::Value {
    json!({
        "Type": "AWS::ApiGateway::Method",
        "Properties": {
            "Integration": {
                "Type": "AWS_PROXY",
                "Uri": {"Fn::Join": ["", [
                    "arn:", {"Ref": "AWS::Partition"}, ":apigateway:", {"Ref": "AWS::Region"},
                    ":lambda:path/2015-03-31/functions/", {"Fn::GetAtt": [function_id, "Arn"]}, "/invocations"
                ]]}
            }
        }
    })
}

proptest! {
    #[test]
    fn longer_ids_never_match_their_substrings(
        id in "[A-Z][a-zA-Z0-9]{0,12}",
        prefix in "[a-zA-Z0-9]{0,4}",
        suffix in "[a-zA-Z0-9]{0,4}",
    ) {
        let other = format!("{prefix}{id}{suffix}");
        prop_assume!(other != id);

        let resources: ResourceMap = serde_json::from_value(json!({
            "Mine": method_for(&id),
            "Theirs": method_for(&other),
        })).unwrap();

        prop_assert_eq!(find_method_resources_for(&resources, &id), vec!["Mine".to_string()]);
        prop_assert_eq!(find_method_resources_for(&resources, &other), vec!["Theirs".to_string()]);
    }

    #[test]
    fn version_lookup_requires_exact_ref(
        id in "[A-Z][a-zA-Z0-9]{0,12}",
        suffix in "[a-zA-Z0-9]{1,4}",
    ) {
        let longer = format!("{id}{suffix}");
        let resources: ResourceMap = serde_json::from_value(json!({
            "LongerVersion": {"Type": "AWS::Lambda::Version", "Properties": {"FunctionName": {"Ref": longer}}},
        })).unwrap();

        prop_assert!(find_version_resource_for(&resources, &id).is_err());
        prop_assert!(find_version_resource_for(&resources, &longer).is_ok());
    }

    #[test]
    fn tree_conversion_is_lossless(
        id in "[A-Z][a-zA-Z0-9]{0,12}",
        text in "[ -~]{0,20}",
        n in any::<i64>(),
    ) {
        let v = json!({
            "Plain": text,
            "Count": n,
            "Ref": {"Ref": id},
            "NearMiss": {"Ref": id, "Extra": true},
            "Sub": {"Fn::Sub": ["${X}", {"X": {"Fn::GetAtt": format!("{id}.Arn")}}]},
        });
        let back = serde_json::Value::from(PropertyTree::from(v.clone()));
        prop_assert_eq!(serde_json::to_string(&back).unwrap(), serde_json::to_string(&v).unwrap());
    }
}
