//! SQL servers (Microsoft.Sql/servers).
//!
//! A much flatter resource than autoscale: a handful of scalar
//! properties plus tags. The password is write-only — it goes into the
//! payload when supplied but never comes back from the provider, so it
//! is excluded from drift detection.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use stratus_core::{norm, ResourceId, StratusError, ValidationError};

use crate::drift::FieldDrift;
use crate::handler::{Presence, ResourceHandler};

pub const API_VERSION: &str = "2014-04-01";

const NAMESPACE: &str = "Microsoft.Sql";
const RESOURCE_TYPE: &str = "servers";

/// Desired state for one SQL server.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlServerSpec {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
    #[serde(default)]
    pub state: Presence,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub administrator_login: Option<String>,
    #[serde(default)]
    pub administrator_login_password: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

pub struct SqlServerHandler {
    spec: SqlServerSpec,
    id: ResourceId,
}

impl SqlServerHandler {
    pub fn new(spec: SqlServerSpec) -> Self {
        let id = ResourceId::new(
            &spec.subscription_id,
            &spec.resource_group,
            NAMESPACE,
            RESOURCE_TYPE,
            &spec.name,
        );
        Self { spec, id }
    }

    /// Drift check for one scalar property the caller supplied.
    fn scalar_drift(
        drifts: &mut Vec<FieldDrift>,
        field: &str,
        desired: Option<&String>,
        current: &Value,
    ) {
        let Some(desired) = desired else {
            return;
        };
        let actual = current.get(field).and_then(Value::as_str);
        if actual != Some(desired.as_str()) {
            drifts.push(FieldDrift::new(
                field,
                json!(desired),
                current.get(field).cloned().unwrap_or(Value::Null),
            ));
        }
    }
}

impl ResourceHandler for SqlServerHandler {
    fn kind(&self) -> &'static str {
        "sql_server"
    }

    fn identity(&self) -> &ResourceId {
        &self.id
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn presence(&self) -> Presence {
        self.spec.state
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.spec.administrator_login_password.is_some()
            && self.spec.administrator_login.is_none()
        {
            errors.push(ValidationError::new(
                "administrator_login",
                "required when administrator_login_password is set",
            ));
        }
        errors
    }

    fn build_payload(&self, current: Option<&Value>) -> Result<Value, StratusError> {
        let current_tags = current
            .and_then(|c| c.get("tags"))
            .and_then(Value::as_object);
        let (_, tags) = norm::merge_tags(current_tags, self.spec.tags.as_ref());

        // Reuse the remote location when the caller left it out.
        let location = self.spec.location.clone().or_else(|| {
            current
                .and_then(|c| c.get("location"))
                .and_then(Value::as_str)
                .map(String::from)
        });

        // Omitted optional properties stay out of the payload and keep
        // their provider-side defaults.
        let mut properties = serde_json::Map::new();
        if let Some(version) = &self.spec.version {
            properties.insert("version".into(), json!(version));
        }
        if let Some(login) = &self.spec.administrator_login {
            properties.insert("administratorLogin".into(), json!(login));
        }
        if let Some(password) = &self.spec.administrator_login_password {
            properties.insert("administratorLoginPassword".into(), json!(password));
        }

        let mut payload = json!({
            "tags": Value::Object(tags),
            "properties": Value::Object(properties),
        });
        if let Some(location) = location {
            payload["location"] = json!(location);
        }
        Ok(payload)
    }

    fn diff(&self, current: &Value) -> Vec<FieldDrift> {
        let mut drifts = Vec::new();

        let current_tags = current.get("tags").and_then(Value::as_object);
        let (tags_changed, _) = norm::merge_tags(current_tags, self.spec.tags.as_ref());
        if tags_changed {
            drifts.push(FieldDrift::new(
                "tags",
                json!(self.spec.tags),
                current.get("tags").cloned().unwrap_or(Value::Null),
            ));
        }

        Self::scalar_drift(&mut drifts, "version", self.spec.version.as_ref(), current);
        Self::scalar_drift(
            &mut drifts,
            "administrator_login",
            self.spec.administrator_login.as_ref(),
            current,
        );

        drifts
    }

    fn normalize(&self, remote: &Value) -> Value {
        norm::flatten_resource(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(spec: Value) -> SqlServerHandler {
        SqlServerHandler::new(serde_json::from_value(spec).unwrap())
    }

    fn base_spec() -> Value {
        json!({
            "subscription_id": "sub1",
            "resource_group": "rg",
            "name": "srv1",
            "state": "present",
            "location": "westus",
            "version": "12.0",
            "administrator_login": "sqladmin",
            "administrator_login_password": "hunter2"
        })
    }

    fn remote_server() -> Value {
        json!({
            "id": "/subscriptions/sub1/resourceGroups/rg/providers/Microsoft.Sql/servers/srv1",
            "name": "srv1",
            "location": "westus",
            "tags": {},
            "properties": {
                "version": "12.0",
                "administratorLogin": "sqladmin",
                "fullyQualifiedDomainName": "srv1.database.windows.net",
                "state": "Ready"
            }
        })
    }

    #[test]
    fn payload_carries_supplied_properties_only() {
        let h = handler(json!({
            "subscription_id": "sub1",
            "resource_group": "rg",
            "name": "srv1",
            "location": "westus",
            "version": "12.0"
        }));
        let payload = h.build_payload(None).unwrap();
        assert_eq!(payload["location"], "westus");
        assert_eq!(payload["properties"]["version"], "12.0");
        assert!(payload["properties"].get("administratorLogin").is_none());
    }

    #[test]
    fn matching_server_diffs_clean() {
        let h = handler(base_spec());
        let current = h.normalize(&remote_server());
        assert!(h.diff(&current).is_empty());
        // the password never comes back and must not count as drift
        assert!(current.get("administrator_login_password").is_none());
    }

    #[test]
    fn version_drift_is_detected() {
        let mut spec = base_spec();
        spec["version"] = json!("2.0");
        let h = handler(spec);
        let current = h.normalize(&remote_server());
        let drifts = h.diff(&current);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "version");
        assert_eq!(drifts[0].actual, json!("12.0"));
    }

    #[test]
    fn normalize_flattens_the_arm_envelope() {
        let h = handler(base_spec());
        let flat = h.normalize(&remote_server());
        assert_eq!(flat["name"], "srv1");
        assert_eq!(flat["fully_qualified_domain_name"], "srv1.database.windows.net");
        assert_eq!(flat["state"], "Ready");
    }

    #[test]
    fn password_without_login_fails_validation() {
        let h = handler(json!({
            "subscription_id": "sub1",
            "resource_group": "rg",
            "name": "srv1",
            "location": "westus",
            "administrator_login_password": "hunter2"
        }));
        assert!(h.validate().iter().any(|e| e.field == "administrator_login"));
    }
}
