// ABOUTME: Frozen copy of instance settings taken when an appserver is created.
// ABOUTME: Serialized as JSON and passed to the configuration playbook as variables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::InstanceId;

use super::instance::{Instance, InstanceSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    pub instance_id: InstanceId,
    pub instance_name: String,
    pub domains: Vec<String>,
    pub settings: InstanceSettings,
    pub captured_at: DateTime<Utc>,
}

impl ConfigurationSnapshot {
    /// Copy everything an appserver needs from `instance` as it is right now.
    pub fn capture(instance: &Instance, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: instance.id,
            instance_name: instance.name.clone(),
            domains: instance.routed_domains().map(|d| d.to_lowercase()).collect(),
            settings: instance.settings.clone(),
            captured_at: now,
        }
    }

    /// Extra variables for the configuration playbook.
    ///
    /// Overrides are flattened into the top level so they win over the
    /// structured settings with the same name.
    pub fn playbook_vars(&self) -> serde_json::Result<Map<String, Value>> {
        let mut vars = Map::new();
        vars.insert("instance_id".into(), Value::from(self.instance_id.get()));
        vars.insert("instance_name".into(), Value::from(self.instance_name.clone()));
        vars.insert("release".into(), Value::from(self.settings.release.clone()));
        vars.insert(
            "domains".into(),
            Value::Array(self.domains.iter().cloned().map(Value::from).collect()),
        );
        if let Some(db) = &self.settings.database {
            vars.insert("database".into(), serde_json::to_value(db)?);
        }
        if let Some(storage) = &self.settings.storage {
            vars.insert("storage".into(), serde_json::to_value(storage)?);
        }
        if !self.settings.theme.is_empty() {
            let theme = self
                .settings
                .theme
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect();
            vars.insert("theme".into(), Value::Object(theme));
        }
        if let Some(secret_ref) = &self.settings.secret_ref {
            vars.insert("secret_ref".into(), Value::from(secret_ref.clone()));
        }
        for (key, value) in &self.settings.configuration_overrides {
            vars.insert(key.clone(), Value::from(value.clone()));
        }
        Ok(vars)
    }
}
