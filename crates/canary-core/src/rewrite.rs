//! Point API Gateway integrations at a function alias instead of the function.
//!
//! Both operations return a new resource; the input is never modified.

use crate::errors::CanaryResult;
use crate::model::{PropertyTree, Resource};

/// Property a method retarget replaces.
pub const METHOD_TARGET_PATH: &[&str] = &["Integration", "Uri"];

/// Property a permission retarget replaces.
pub const PERMISSION_TARGET_PATH: &[&str] = &["FunctionName"];

/// `Fn::Sub` pattern of a Lambda proxy integration URI targeting `${alias_id}`.
pub fn alias_invocation_uri(alias_id: &str) -> PropertyTree {
    PropertyTree::sub(format!(
        "arn:aws:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{alias_id}}}/invocations"
    ))
}

/// Copy of `method` whose `Integration.Uri` invokes `alias_id`.
///
/// Every other property is carried over unchanged. Fails only when
/// `Integration` exists but is not an object.
pub fn retarget_method(method: &Resource, alias_id: &str) -> CanaryResult<Resource> {
    let mut out = method.clone();
    out.set_property(METHOD_TARGET_PATH, alias_invocation_uri(alias_id))?;
    Ok(out)
}

/// Copy of an invoke permission whose `FunctionName` is `Ref(alias_id)`.
pub fn retarget_permission(permission: &Resource, alias_id: &str) -> CanaryResult<Resource> {
    let mut out = permission.clone();
    out.set_property(PERMISSION_TARGET_PATH, PropertyTree::reference(alias_id))?;
    Ok(out)
}
