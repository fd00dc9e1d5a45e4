//! Single-pass canary transform over a resource map.
//!
//! A pass works on a staged copy of the caller's map. The copy replaces the
//! caller's map only after every phase succeeded, so a failed pass never
//! leaves a partially transformed template behind.

use std::collections::BTreeSet;

use tracing::{debug, info, info_span, warn};

use crate::config::{validate_config, CoreConfig};
use crate::errors::{CanaryError, CanaryResult};
use crate::host::{alias_logical_id, deployment_group_logical_id, FunctionSource, Naming};
use crate::integrity::{check_property_references, check_references};
use crate::matcher::{
    find_invoke_permissions_for, find_method_resources_for, find_version_resource_for,
    rest_api_ids_for,
};
use crate::model::{
    DeploymentPreference, LogicalId, Resource, ResourceMap, Template, TrafficShiftingSettings,
};
use crate::pipeline::{PassContext, PassReport, Phase, AMBIGUOUS_VERSION_RESOURCE, NO_EXPOSED_METHODS};
use crate::rewrite::{
    retarget_method, retarget_permission, METHOD_TARGET_PATH, PERMISSION_TARGET_PATH,
};
use crate::synth::{
    build_deployment_application, build_deployment_group, build_function_alias, build_service_role,
};

/// A function that passed validation and will be wired to an alias.
#[derive(Debug, Clone)]
struct PlannedFunction {
    name: String,
    function_id: LogicalId,
    alias: String,
    preference: DeploymentPreference,
}

/// Functions that passed validation, plus every function id the host declared.
#[derive(Debug, Clone, Default)]
struct Scan {
    planned: Vec<PlannedFunction>,
    declared: BTreeSet<LogicalId>,
}

/// A function whose alias has been staged.
#[derive(Debug, Clone)]
struct WiredAlias {
    function_id: LogicalId,
    alias_id: LogicalId,
}

/// Staged map plus the bookkeeping of what changed.
///
/// `synthesized` resources are built whole by the pass. `retargeted` ones
/// belong to the template and only the property at the path was replaced.
struct Staging {
    resources: ResourceMap,
    added: Vec<LogicalId>,
    rewritten: Vec<LogicalId>,
    synthesized: Vec<LogicalId>,
    retargeted: Vec<(LogicalId, &'static [&'static str])>,
}

impl Staging {
    fn new(resources: ResourceMap) -> Self {
        Self {
            resources,
            added: Vec::new(),
            rewritten: Vec::new(),
            synthesized: Vec::new(),
            retargeted: Vec::new(),
        }
    }

    fn synthesize(&mut self, id: LogicalId, resource: Resource) {
        if !self.synthesized.contains(&id) {
            self.synthesized.push(id.clone());
        }
        self.put(id, resource);
    }

    fn retarget(&mut self, id: LogicalId, resource: Resource, path: &'static [&'static str]) {
        self.retargeted.push((id.clone(), path));
        self.put(id, resource);
    }

    /// Insert with overwrite semantics; an id is reported once.
    fn put(&mut self, id: LogicalId, resource: Resource) {
        let replaced = self.resources.insert(id.clone(), resource).is_some();
        if self.added.contains(&id) || self.rewritten.contains(&id) {
            return;
        }
        if replaced {
            self.rewritten.push(id);
        } else {
            self.added.push(id);
        }
    }
}

/// Drives one canary pass.
///
/// ```ignore
/// let orchestrator = CanaryOrchestrator::new(ServerlessNaming::new("svc", "dev"), CoreConfig::default())?;
/// let report = orchestrator.run(&functions, &mut template.resources)?;
/// ```
#[derive(Debug, Clone)]
pub struct CanaryOrchestrator<N> {
    naming: N,
    config: CoreConfig,
}

impl<N: Naming> CanaryOrchestrator<N> {
    pub fn new(naming: N, config: CoreConfig) -> CanaryResult<Self> {
        validate_config(&config)?;
        Ok(Self { naming, config })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn naming(&self) -> &N {
        &self.naming
    }

    /// Run a pass over `resources`.
    ///
    /// Without any deployment preference the map is left untouched and the
    /// report is empty. On error the map is left exactly as it was.
    pub fn run<S: FunctionSource + ?Sized>(
        &self,
        source: &S,
        resources: &mut ResourceMap,
    ) -> CanaryResult<PassReport> {
        self.run_with(source, resources, &BTreeSet::new())
    }

    /// Run a pass over a whole template. Its `Parameters` count as existing
    /// ids for the reference check.
    pub fn run_template<S: FunctionSource + ?Sized>(
        &self,
        source: &S,
        template: &mut Template,
    ) -> CanaryResult<PassReport> {
        let parameters: BTreeSet<LogicalId> = template.parameter_ids().cloned().collect();
        self.run_with(source, &mut template.resources, &parameters)
    }

    fn run_with<S: FunctionSource + ?Sized>(
        &self,
        source: &S,
        resources: &mut ResourceMap,
        external: &BTreeSet<LogicalId>,
    ) -> CanaryResult<PassReport> {
        let span = info_span!("canary_pass", functions = tracing::field::Empty);
        let _guard = span.enter();

        let mut ctx = PassContext::default();

        ctx.enter(Phase::Scanning);
        let Scan {
            planned,
            mut declared,
        } = self.scan(source)?;
        declared.extend(external.iter().cloned());
        span.record("functions", planned.len());

        if planned.is_empty() {
            info!("no function declares a deployment preference");
            ctx.enter(Phase::Done);
            return Ok(ctx.finish(Vec::new(), Vec::new()));
        }

        let mut staging = Staging::new(resources.clone());

        ctx.enter(Phase::Synthesizing);
        let wired = self.synthesize(&planned, &mut staging, &mut ctx)?;

        ctx.enter(Phase::Rewriting);
        self.rewrite(&wired, &mut staging, &mut ctx)?;

        if self.config.check_references {
            self.check_integrity(&staging, &declared)?;
        }

        ctx.enter(Phase::Done);
        info!(
            added = staging.added.len(),
            rewritten = staging.rewritten.len(),
            "canary pass complete"
        );

        let Staging {
            resources: staged,
            added,
            rewritten,
            ..
        } = staging;
        *resources = staged;
        Ok(ctx.finish(added, rewritten))
    }

    /// Collect and validate every preference before anything is synthesized.
    fn scan<S: FunctionSource + ?Sized>(&self, source: &S) -> CanaryResult<Scan> {
        let mut scan = Scan::default();
        for descriptor in source.function_descriptors() {
            scan.declared.insert(descriptor.logical_id.clone());
            let Some(preference) = descriptor.deployment_preference else {
                continue;
            };
            let alias = preference.validate(&descriptor.name)?.to_string();
            debug!(function = %descriptor.name, alias = %alias, "planned");
            scan.planned.push(PlannedFunction {
                name: descriptor.name,
                function_id: descriptor.logical_id,
                alias,
                preference,
            });
        }
        Ok(scan)
    }

    fn synthesize(
        &self,
        planned: &[PlannedFunction],
        staging: &mut Staging,
        ctx: &mut PassContext,
    ) -> CanaryResult<Vec<WiredAlias>> {
        let application_id = self.naming.stack_scoped_name(&self.config.application_suffix);
        staging.synthesize(application_id.clone(), build_deployment_application());
        staging.synthesize(
            self.config.service_role_logical_id.clone(),
            build_service_role(&self.config),
        );

        let mut wired = Vec::with_capacity(planned.len());
        for function in planned {
            let version = find_version_resource_for(&staging.resources, &function.function_id)?;
            if version.is_ambiguous() {
                warn!(
                    function = %function.name,
                    chosen = %version.logical_id,
                    others = ?version.other_candidates,
                    "several version resources match, using the first"
                );
                ctx.push_warning(
                    AMBIGUOUS_VERSION_RESOURCE,
                    format!(
                        "function {} has {} version resources, using {}",
                        function.function_id,
                        version.other_candidates.len() + 1,
                        version.logical_id
                    ),
                    [
                        ("function", function.function_id.clone()),
                        ("version", version.logical_id.clone()),
                    ],
                );
            }

            let group_id = deployment_group_logical_id(&function.function_id);
            staging.synthesize(
                group_id.clone(),
                build_deployment_group(&application_id, &function.preference, &self.config),
            );

            let settings = self.settings_for(&function.preference, &application_id, &group_id);
            let alias_id = alias_logical_id(&function.function_id, &function.alias);
            staging.synthesize(
                alias_id.clone(),
                build_function_alias(
                    &function.alias,
                    &function.function_id,
                    &version.logical_id,
                    settings.as_ref(),
                ),
            );

            debug!(
                function = %function.name,
                group = %group_id,
                alias = %alias_id,
                traffic_shifting = settings.is_some(),
                "alias staged"
            );
            wired.push(WiredAlias {
                function_id: function.function_id.clone(),
                alias_id,
            });
        }
        Ok(wired)
    }

    /// Update policy references, only when CodeDeploy is asked to drive the alias.
    fn settings_for(
        &self,
        preference: &DeploymentPreference,
        application_id: &str,
        group_id: &str,
    ) -> Option<TrafficShiftingSettings> {
        if !preference.requests_traffic_shifting() {
            return None;
        }
        Some(TrafficShiftingSettings {
            deployment_application_id: application_id.to_string(),
            deployment_group_id: group_id.to_string(),
            before_hook_function_id: preference
                .pre_traffic_hook
                .as_deref()
                .map(|h| self.naming.logical_id_for(h)),
            after_hook_function_id: preference
                .post_traffic_hook
                .as_deref()
                .map(|h| self.naming.logical_id_for(h)),
        })
    }

    fn rewrite(
        &self,
        wired: &[WiredAlias],
        staging: &mut Staging,
        ctx: &mut PassContext,
    ) -> CanaryResult<()> {
        for alias in wired {
            let methods = find_method_resources_for(&staging.resources, &alias.function_id);
            // Without a REST method nothing invokes the alias; permissions stay put.
            if methods.is_empty() {
                ctx.push_info(
                    NO_EXPOSED_METHODS,
                    format!("function {} has no API Gateway methods", alias.function_id),
                    [("function", alias.function_id.clone())],
                );
                continue;
            }

            let rest_apis = rest_api_ids_for(&staging.resources, &methods);
            let permissions =
                find_invoke_permissions_for(&staging.resources, &alias.function_id, &rest_apis);

            for id in methods {
                let updated = retarget_method(self.lookup(staging, &id)?, &alias.alias_id)?;
                staging.retarget(id, updated, METHOD_TARGET_PATH);
            }
            for id in permissions {
                let updated = retarget_permission(self.lookup(staging, &id)?, &alias.alias_id)?;
                staging.retarget(id, updated, PERMISSION_TARGET_PATH);
            }
        }
        Ok(())
    }

    fn lookup<'s>(&self, staging: &'s Staging, id: &str) -> CanaryResult<&'s Resource> {
        staging
            .resources
            .get(id)
            .ok_or_else(|| CanaryError::invalid_template(format!("resource {id} disappeared during the pass")))
    }

    /// Ids declared by the host, and template parameters, count as existing
    /// even though they are not in this map.
    fn check_integrity(&self, staging: &Staging, declared: &BTreeSet<LogicalId>) -> CanaryResult<()> {
        let is_known = |id: &str| staging.resources.contains(id) || declared.contains(id);
        for id in &staging.synthesized {
            check_references(id, self.lookup(staging, id)?, is_known)?;
        }
        for (id, path) in &staging.retargeted {
            check_property_references(id, self.lookup(staging, id)?, path, is_known)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ServerlessNaming;
    use crate::model::FunctionDescriptor;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn orchestrator() -> CanaryOrchestrator<ServerlessNaming> {
        CanaryOrchestrator::new(ServerlessNaming::new("svc", "dev"), CoreConfig::default()).unwrap()
    }

    fn map(v: serde_json::Value) -> ResourceMap {
        serde_json::from_value(v).unwrap()
    }

    fn base() -> ResourceMap {
        map(json!({
            "HelloLambdaFunction": {"Type": "AWS::Lambda::Function", "Properties": {"Handler": "h.hello"}},
            "HelloLambdaVersionAbc": {"Type": "AWS::Lambda::Version", "Properties": {"FunctionName": {"Ref": "HelloLambdaFunction"}}},
            "PreHookLambdaFunction": {"Type": "AWS::Lambda::Function", "Properties": {"Handler": "h.pre"}}
        }))
    }

    #[test]
    fn no_preferences_is_a_noop() {
        let mut resources = base();
        let before = resources.clone();
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction")];

        let report = orchestrator().run(&functions, &mut resources).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.phase, Phase::Done);
        assert_eq!(resources, before);
    }

    #[test]
    fn wires_alias_group_application_and_role() {
        let mut resources = base();
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction").with_preference(
            DeploymentPreference::new("live")
                .with_traffic_shifting("Linear10PercentEvery1Minute")
                .with_pre_traffic_hook("preHook"),
        )];

        let report = orchestrator().run(&functions, &mut resources).unwrap();

        assert_eq!(
            report.added,
            vec![
                "SvcdevDeploymentApplication",
                "CodeDeployServiceRole",
                "HelloLambdaFunctionDeploymentGroup",
                "HelloLambdaFunctionAliaslive",
            ]
        );
        assert!(report.has_code(NO_EXPOSED_METHODS));

        let alias = resources.get("HelloLambdaFunctionAliaslive").unwrap();
        let policy = serde_json::to_value(alias.update_policy().unwrap()).unwrap();
        assert_eq!(
            policy["CodeDeployLambdaAliasUpdate"]["BeforeAllowTrafficHook"],
            json!({"Ref": "PreHookLambdaFunction"})
        );
        assert!(policy["CodeDeployLambdaAliasUpdate"].get("AfterAllowTrafficHook").is_none());
    }

    #[test]
    fn invalid_preference_fails_before_synthesis() {
        let mut resources = base();
        let before = resources.clone();
        let functions = vec![
            FunctionDescriptor::new("hello", "HelloLambdaFunction")
                .with_preference(DeploymentPreference::new("live")),
            FunctionDescriptor::new("bad", "BadLambdaFunction")
                .with_preference(DeploymentPreference::default()),
        ];

        let err = orchestrator().run(&functions, &mut resources).unwrap_err();

        assert_matches!(err, CanaryError::InvalidDeploymentPreference { ref function, .. } if function == "bad");
        assert_eq!(resources, before);
    }

    #[test]
    fn missing_version_aborts_without_partial_output() {
        let mut resources = map(json!({
            "HelloLambdaFunction": {"Type": "AWS::Lambda::Function"}
        }));
        let before = resources.clone();
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction")
            .with_preference(DeploymentPreference::new("live"))];

        assert_matches!(
            orchestrator().run(&functions, &mut resources),
            Err(CanaryError::MissingVersionResource { .. })
        );
        assert_eq!(resources, before);
    }

    #[test]
    fn dangling_hook_is_rejected() {
        let mut resources = base();
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction").with_preference(
            DeploymentPreference::new("live").with_post_traffic_hook("doesNotExist"),
        )];

        assert_matches!(
            orchestrator().run(&functions, &mut resources),
            Err(CanaryError::DanglingReference { ref target, .. }) if target == "DoesNotExistLambdaFunction"
        );
    }

    #[test]
    fn reference_check_can_be_disabled() {
        let config = CoreConfig {
            check_references: false,
            ..CoreConfig::default()
        };
        let o = CanaryOrchestrator::new(ServerlessNaming::new("svc", "dev"), config).unwrap();
        let mut resources = base();
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction").with_preference(
            DeploymentPreference::new("live").with_post_traffic_hook("doesNotExist"),
        )];
        o.run(&functions, &mut resources).unwrap();
        assert!(resources.contains("HelloLambdaFunctionAliaslive"));
    }

    #[test]
    fn ambiguous_version_is_a_warning() {
        let mut resources = base();
        resources.insert(
            "HelloLambdaVersionDef",
            serde_json::from_value(json!({
                "Type": "AWS::Lambda::Version",
                "Properties": {"FunctionName": {"Ref": "HelloLambdaFunction"}}
            }))
            .unwrap(),
        );
        let functions = vec![FunctionDescriptor::new("hello", "HelloLambdaFunction")
            .with_preference(DeploymentPreference::new("live"))];

        let report = orchestrator().run(&functions, &mut resources).unwrap();

        assert_eq!(report.warnings(), 1);
        assert!(report.has_code(AMBIGUOUS_VERSION_RESOURCE));
        let alias = resources.get("HelloLambdaFunctionAliaslive").unwrap();
        assert_eq!(
            serde_json::to_value(alias.property(&["FunctionVersion"]).unwrap()).unwrap(),
            json!({"Fn::GetAtt": ["HelloLambdaVersionAbc", "Version"]})
        );
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = CoreConfig {
            service_role_logical_id: String::new(),
            ..CoreConfig::default()
        };
        assert!(CanaryOrchestrator::new(ServerlessNaming::new("svc", "dev"), config).is_err());
    }

    fn exposed_f() -> ResourceMap {
        map(json!({
            "FVersion1": {"Type": "AWS::Lambda::Version", "Properties": {"FunctionName": {"Ref": "F"}}},
            "FMethod": {"Type": "AWS::ApiGateway::Method", "Properties": {
                "HttpMethod": "GET",
                "RestApiId": {"Ref": "RestApiIdParam"},
                "ResourceId": {"Fn::GetAtt": ["SharedApi", "RootResourceId"]},
                "Integration": {"Type": "AWS_PROXY", "Uri": {"Fn::GetAtt": ["F", "Arn"]}}
            }}
        }))
    }

    fn live_f() -> Vec<FunctionDescriptor> {
        vec![FunctionDescriptor::new("f", "F").with_preference(DeploymentPreference::new("live"))]
    }

    #[test]
    fn untouched_method_properties_are_not_checked() {
        let mut resources = exposed_f();

        let report = orchestrator().run(&live_f(), &mut resources).unwrap();

        assert_eq!(report.rewritten, vec!["FMethod"]);
        let method = resources.get("FMethod").unwrap();
        assert_eq!(
            serde_json::to_value(method.property(&["RestApiId"]).unwrap()).unwrap(),
            json!({"Ref": "RestApiIdParam"})
        );
    }

    #[test]
    fn template_parameters_count_as_known_ids() {
        let mut template = Template::from_value(json!({
            "Parameters": {"AlarmParam": {"Type": "String"}},
            "Resources": serde_json::to_value(exposed_f()).unwrap()
        }))
        .unwrap();
        let functions = vec![FunctionDescriptor::new("f", "F")
            .with_preference(DeploymentPreference::new("live").with_alarm("AlarmParam"))];

        orchestrator().run_template(&functions, &mut template).unwrap();
        assert!(template.resources.contains("FDeploymentGroup"));

        let mut bare = exposed_f();
        assert_matches!(
            orchestrator().run(&functions, &mut bare),
            Err(CanaryError::DanglingReference { ref target, .. }) if target == "AlarmParam"
        );
    }

    #[test]
    fn permissions_stay_on_function_without_methods() {
        let mut resources = map(json!({
            "FVersion1": {"Type": "AWS::Lambda::Version", "Properties": {"FunctionName": {"Ref": "F"}}},
            "HttpApiIntegrationF": {"Type": "AWS::ApiGatewayV2::Integration", "Properties": {
                "ApiId": {"Ref": "HttpApi"},
                "IntegrationType": "AWS_PROXY",
                "IntegrationUri": {"Fn::GetAtt": ["F", "Arn"]}
            }},
            "FPermissionHttpApi": {"Type": "AWS::Lambda::Permission", "Properties": {
                "FunctionName": {"Fn::GetAtt": ["F", "Arn"]},
                "Action": "lambda:InvokeFunction",
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": {"Fn::Sub": "arn:aws:execute-api:${AWS::Region}:${AWS::AccountId}:${HttpApi}/*"}
            }}
        }));
        let before = resources.get("FPermissionHttpApi").cloned();

        let report = orchestrator().run(&live_f(), &mut resources).unwrap();

        assert!(report.rewritten.is_empty());
        assert!(report.has_code(NO_EXPOSED_METHODS));
        assert_eq!(resources.get("FPermissionHttpApi").cloned(), before);
    }

    #[test]
    fn only_rest_api_permissions_follow_the_alias() {
        let mut resources = exposed_f();
        for (id, api) in [("FPermissionRest", "RestApiIdParam"), ("FPermissionHttpApi", "HttpApi")] {
            resources.insert(
                id,
                serde_json::from_value(json!({
                    "Type": "AWS::Lambda::Permission",
                    "Properties": {
                        "FunctionName": {"Fn::GetAtt": ["F", "Arn"]},
                        "Principal": "apigateway.amazonaws.com",
                        "SourceArn": {"Fn::Sub": format!("arn:aws:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api}}}/*")}
                    }
                }))
                .unwrap(),
            );
        }
        let report = orchestrator().run(&live_f(), &mut resources).unwrap();

        assert_eq!(report.rewritten, vec!["FMethod", "FPermissionRest"]);
        assert_eq!(
            serde_json::to_value(resources.get("FPermissionHttpApi").unwrap().property(&["FunctionName"]).unwrap()).unwrap(),
            json!({"Fn::GetAtt": ["F", "Arn"]})
        );
    }
}
