use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use canary_core::config::{validate_config, CoreConfig};
use canary_core::model::Template;
use serde::de::DeserializeOwned;

pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<serde_json::Value> {
    let raw = fs::read_to_string(path.as_ref())?;
    let v: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid json: {e}"))?;
    Ok(v)
}

/// Compiled CloudFormation template.
pub fn read_template<P: AsRef<Path>>(path: P) -> Result<Template> {
    let path = path.as_ref();
    let v = read_json_file(path).with_context(|| format!("reading template {}", path.display()))?;
    let t = Template::from_value(v).with_context(|| format!("loading template {}", path.display()))?;
    Ok(t)
}

/// YAML or JSON, chosen by extension (`.json` is JSON, anything else YAML).
pub fn read_structured_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&raw).map_err(|e| anyhow!("invalid json in {}: {e}", path.display()))
    } else {
        serde_yaml::from_str(&raw).map_err(|e| anyhow!("invalid yaml in {}: {e}", path.display()))
    }
}

/// Core configuration; defaults when no file is given.
pub fn read_config(path: Option<&str>) -> Result<CoreConfig> {
    let cfg = match path {
        Some(p) => read_structured_file::<CoreConfig, _>(p)?,
        None => CoreConfig::default(),
    };
    validate_config(&cfg).context("invalid configuration")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("canary.yml");
        fs::write(&p, "autoRollback: false\nserviceRoleLogicalId: DeployRole\n").unwrap();

        let cfg = read_config(p.to_str()).unwrap();
        assert!(!cfg.auto_rollback);
        assert_eq!(cfg.service_role_logical_id, "DeployRole");
        assert_eq!(cfg.application_suffix, "DeploymentApplication");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("canary.json");
        fs::write(&p, r#"{"serviceRoleLogicalId": "not valid"}"#).unwrap();
        assert!(read_config(p.to_str()).is_err());
    }

    #[test]
    fn template_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("t.json");
        fs::write(&p, "[1, 2]").unwrap();
        assert!(read_template(&p).is_err());
    }
}
