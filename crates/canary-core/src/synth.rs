//! Builders for the resources the transform adds.
//!
//! Builders are pure: they return a `Resource` and never touch the map. The
//! orchestrator decides the logical ids (see `crate::host` for the policy).

use crate::config::CoreConfig;
use crate::model::{DeploymentPreference, PropertyTree, Resource, ResourceType, TrafficShiftingSettings};

pub const CODEDEPLOY_PRINCIPAL: &str = "codedeploy.amazonaws.com";
pub const ALIAS_UPDATE_POLICY: &str = "CodeDeployLambdaAliasUpdate";

/// `AWS::CodeDeploy::Application` for Lambda deployments.
pub fn build_deployment_application() -> Resource {
    Resource::new(ResourceType::CodeDeployApplication)
        .with_properties(PropertyTree::map([("ComputePlatform", "Lambda".into())]))
}

/// `AWS::IAM::Role` assumed by CodeDeploy to shift alias traffic.
pub fn build_service_role(config: &CoreConfig) -> Resource {
    let statement = PropertyTree::map([
        ("Action", PropertyTree::list(["sts:AssumeRole".into()])),
        ("Effect", "Allow".into()),
        (
            "Principal",
            PropertyTree::map([("Service", PropertyTree::list([CODEDEPLOY_PRINCIPAL.into()]))]),
        ),
    ]);

    Resource::new(ResourceType::IamRole).with_properties(PropertyTree::map([
        (
            "ManagedPolicyArns",
            PropertyTree::list([config.service_role_policy_arn.clone().into()]),
        ),
        (
            "AssumeRolePolicyDocument",
            PropertyTree::map([
                ("Version", "2012-10-17".into()),
                ("Statement", PropertyTree::list([statement])),
            ]),
        ),
    ]))
}

/// `AWS::CodeDeploy::DeploymentGroup` for one function.
///
/// `DeploymentConfigName` is only emitted when the preference names a traffic
/// shifting type; `AlarmConfiguration` only when alarms are listed.
pub fn build_deployment_group(
    application_id: &str,
    preference: &DeploymentPreference,
    config: &CoreConfig,
) -> Resource {
    let mut props = vec![("ApplicationName", PropertyTree::reference(application_id))];

    if config.auto_rollback {
        props.push((
            "AutoRollbackConfiguration",
            PropertyTree::map([
                ("Enabled", true.into()),
                (
                    "Events",
                    PropertyTree::list(config.rollback_events.iter().map(|e| e.as_str().into())),
                ),
            ]),
        ));
    }

    if let Some(config_name) = &preference.traffic_shifting {
        props.push((
            "DeploymentConfigName",
            PropertyTree::sub_with(
                "CodeDeployDefault.Lambda${ConfigName}",
                [("ConfigName".to_string(), config_name.as_str().into())],
            ),
        ));
    }

    props.push((
        "DeploymentStyle",
        PropertyTree::map([
            ("DeploymentType", "BLUE_GREEN".into()),
            ("DeploymentOption", "WITH_TRAFFIC_CONTROL".into()),
        ]),
    ));
    props.push((
        "ServiceRoleArn",
        PropertyTree::get_att(config.service_role_logical_id.as_str(), "Arn"),
    ));

    if !preference.alarms.is_empty() {
        let alarms = preference
            .alarms
            .iter()
            .map(|a| PropertyTree::map([("Name", PropertyTree::reference(a.as_str()))]));
        props.push((
            "AlarmConfiguration",
            PropertyTree::map([
                ("Alarms", PropertyTree::list(alarms)),
                ("Enabled", true.into()),
            ]),
        ));
    }

    Resource::new(ResourceType::CodeDeployDeploymentGroup).with_properties(PropertyTree::map(props))
}

/// `AWS::Lambda::Alias` pinned to a published version.
///
/// With settings the alias carries an `UpdatePolicy` that hands traffic
/// shifting to CodeDeploy. Absent hooks are left out of the policy entirely;
/// without settings there is no `UpdatePolicy` at all.
pub fn build_function_alias(
    alias_name: &str,
    function_id: &str,
    version_id: &str,
    settings: Option<&TrafficShiftingSettings>,
) -> Resource {
    let alias = Resource::new(ResourceType::LambdaAlias).with_properties(PropertyTree::map([
        ("FunctionVersion", PropertyTree::get_att(version_id, "Version")),
        ("FunctionName", PropertyTree::reference(function_id)),
        ("Name", alias_name.into()),
    ]));

    match settings {
        Some(s) => alias.with_attribute(crate::model::resource::UPDATE_POLICY, build_update_policy(s)),
        None => alias,
    }
}

fn build_update_policy(settings: &TrafficShiftingSettings) -> PropertyTree {
    let mut fields = vec![(
        "ApplicationName",
        PropertyTree::reference(settings.deployment_application_id.as_str()),
    )];
    if let Some(after) = &settings.after_hook_function_id {
        fields.push(("AfterAllowTrafficHook", PropertyTree::reference(after.as_str())));
    }
    if let Some(before) = &settings.before_hook_function_id {
        fields.push(("BeforeAllowTrafficHook", PropertyTree::reference(before.as_str())));
    }
    fields.push((
        "DeploymentGroupName",
        PropertyTree::reference(settings.deployment_group_id.as_str()),
    ));

    PropertyTree::map([(ALIAS_UPDATE_POLICY, PropertyTree::map(fields))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn to_json(r: &Resource) -> Value {
        serde_json::to_value(r).unwrap()
    }

    fn settings(before: Option<&str>, after: Option<&str>) -> TrafficShiftingSettings {
        TrafficShiftingSettings {
            deployment_application_id: "App".to_string(),
            deployment_group_id: "Grp".to_string(),
            before_hook_function_id: before.map(str::to_string),
            after_hook_function_id: after.map(str::to_string),
        }
    }

    #[test]
    fn plain_alias_has_no_update_policy() {
        let r = build_function_alias("live", "MyFunctionName", "MyFunctionVersion", None);
        assert_eq!(
            to_json(&r),
            json!({
                "Type": "AWS::Lambda::Alias",
                "Properties": {
                    "FunctionVersion": {"Fn::GetAtt": ["MyFunctionVersion", "Version"]},
                    "FunctionName": {"Ref": "MyFunctionName"},
                    "Name": "live"
                }
            })
        );
        assert!(r.update_policy().is_none());
    }

    #[test]
    fn alias_with_settings_references_every_input() {
        let s = settings(Some("Before"), Some("After"));
        let r = build_function_alias("live", "F", "V", Some(&s));
        assert_eq!(
            to_json(&r)["UpdatePolicy"],
            json!({
                "CodeDeployLambdaAliasUpdate": {
                    "ApplicationName": {"Ref": "App"},
                    "AfterAllowTrafficHook": {"Ref": "After"},
                    "BeforeAllowTrafficHook": {"Ref": "Before"},
                    "DeploymentGroupName": {"Ref": "Grp"}
                }
            })
        );
    }

    #[test]
    fn absent_hooks_are_omitted_not_nulled() {
        let s = settings(None, Some("After"));
        let r = build_function_alias("live", "F", "V", Some(&s));
        let policy = &to_json(&r)["UpdatePolicy"]["CodeDeployLambdaAliasUpdate"];
        let keys: Vec<_> = policy.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["ApplicationName", "AfterAllowTrafficHook", "DeploymentGroupName"]
        );
    }

    #[test]
    fn deployment_group_shape() {
        let pref = DeploymentPreference::new("live")
            .with_traffic_shifting("Canary10Percent5Minutes")
            .with_alarm("ErrorsAlarm");
        let r = build_deployment_group("SvcDevDeploymentApplication", &pref, &CoreConfig::default());
        assert_eq!(
            to_json(&r),
            json!({
                "Type": "AWS::CodeDeploy::DeploymentGroup",
                "Properties": {
                    "ApplicationName": {"Ref": "SvcDevDeploymentApplication"},
                    "AutoRollbackConfiguration": {
                        "Enabled": true,
                        "Events": ["DEPLOYMENT_FAILURE", "DEPLOYMENT_STOP_ON_ALARM", "DEPLOYMENT_STOP_ON_REQUEST"]
                    },
                    "DeploymentConfigName": {"Fn::Sub": [
                        "CodeDeployDefault.Lambda${ConfigName}",
                        {"ConfigName": "Canary10Percent5Minutes"}
                    ]},
                    "DeploymentStyle": {"DeploymentType": "BLUE_GREEN", "DeploymentOption": "WITH_TRAFFIC_CONTROL"},
                    "ServiceRoleArn": {"Fn::GetAtt": ["CodeDeployServiceRole", "Arn"]},
                    "AlarmConfiguration": {"Alarms": [{"Name": {"Ref": "ErrorsAlarm"}}], "Enabled": true}
                }
            })
        );
    }

    #[test]
    fn deployment_group_without_type_or_rollback() {
        let cfg = CoreConfig {
            auto_rollback: false,
            ..CoreConfig::default()
        };
        let r = build_deployment_group("App", &DeploymentPreference::new("live"), &cfg);
        let props = r.properties().unwrap();
        assert!(props.get("DeploymentConfigName").is_none());
        assert!(props.get("AutoRollbackConfiguration").is_none());
        assert!(props.get("AlarmConfiguration").is_none());
        assert!(props.references_id("App"));
    }

    #[test]
    fn service_role_trusts_codedeploy() {
        let r = build_service_role(&CoreConfig::default());
        let v = to_json(&r);
        assert_eq!(v["Type"], "AWS::IAM::Role");
        assert_eq!(
            v["Properties"]["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"][0],
            "codedeploy.amazonaws.com"
        );
        assert_eq!(
            v["Properties"]["ManagedPolicyArns"][0],
            "arn:aws:iam::aws:policy/service-role/AWSCodeDeployRoleForLambda"
        );
    }

    #[test]
    fn application_is_lambda_platform() {
        assert_eq!(
            to_json(&build_deployment_application()),
            json!({"Type": "AWS::CodeDeploy::Application", "Properties": {"ComputePlatform": "Lambda"}})
        );
    }
}
