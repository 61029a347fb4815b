//! Autoscale settings (microsoft.insights/autoscalesettings).
//!
//! The densest translation in the system: desired profiles carry nested
//! rules, fixed-date windows, and recurrence schedules; notifications
//! carry emails and webhooks. Durations are whole minutes on the desired
//! and normalized sides, ISO 8601 on the wire; scale capacities are
//! integers on our side, decimal strings on the wire.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use stratus_core::{norm, ResourceId, StratusError, ValidationError};

use crate::drift::FieldDrift;
use crate::handler::{Presence, ResourceHandler};

pub const API_VERSION: &str = "2015-04-01";

const NAMESPACE: &str = "microsoft.insights";
const RESOURCE_TYPE: &str = "autoscalesettings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MetricStatistic {
    Average,
    Min,
    Max,
    Sum,
}

impl MetricStatistic {
    fn as_str(self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Sum => "Sum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TimeAggregation {
    Average,
    Minimum,
    Maximum,
    Total,
    Count,
}

impl TimeAggregation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Minimum => "Minimum",
            Self::Maximum => "Maximum",
            Self::Total => "Total",
            Self::Count => "Count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl ComparisonOperator {
    fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "Equals",
            Self::NotEquals => "NotEquals",
            Self::GreaterThan => "GreaterThan",
            Self::GreaterThanOrEqual => "GreaterThanOrEqual",
            Self::LessThan => "LessThan",
            Self::LessThanOrEqual => "LessThanOrEqual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ScaleDirection {
    None,
    Increase,
    Decrease,
}

impl ScaleDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Increase => "Increase",
            Self::Decrease => "Decrease",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ScaleType {
    PercentChangeCount,
    ExactCount,
    ChangeCount,
}

impl ScaleType {
    fn as_str(self) -> &'static str {
        match self {
            Self::PercentChangeCount => "PercentChangeCount",
            Self::ExactCount => "ExactCount",
            Self::ChangeCount => "ChangeCount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RecurrenceFrequency {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RecurrenceFrequency {
    fn as_str(self) -> &'static str {
        match self {
            Self::Second => "Second",
            Self::Minute => "Minute",
            Self::Hour => "Hour",
            Self::Day => "Day",
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }
}

/// One metric-driven scale rule. Duration fields are whole minutes;
/// defaults follow the provider's documented rule defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub metric_name: String,
    /// Defaults to the setting's target resource URI.
    #[serde(default)]
    pub metric_resource_uri: Option<String>,
    #[serde(default = "default_time_grain")]
    pub time_grain: i64,
    #[serde(default = "default_statistic")]
    pub statistic: MetricStatistic,
    #[serde(default = "default_time_window")]
    pub time_window: i64,
    #[serde(default = "default_time_aggregation")]
    pub time_aggregation: TimeAggregation,
    #[serde(default = "default_operator")]
    pub operator: ComparisonOperator,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_direction")]
    pub direction: ScaleDirection,
    #[serde(rename = "type", default = "default_scale_type")]
    pub scale_type: ScaleType,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "default_cooldown")]
    pub cooldown: i64,
}

fn default_time_grain() -> i64 {
    1
}
fn default_statistic() -> MetricStatistic {
    MetricStatistic::Average
}
fn default_time_window() -> i64 {
    10
}
fn default_time_aggregation() -> TimeAggregation {
    TimeAggregation::Average
}
fn default_operator() -> ComparisonOperator {
    ComparisonOperator::GreaterThan
}
fn default_threshold() -> f64 {
    70.0
}
fn default_direction() -> ScaleDirection {
    ScaleDirection::None
}
fn default_scale_type() -> ScaleType {
    ScaleType::ChangeCount
}
fn default_cooldown() -> i64 {
    5
}

/// One autoscale profile: a capacity band plus the rules that move
/// within it, optionally pinned to a fixed date window or a recurrence
/// schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSpec {
    pub name: String,
    /// Default instance count; also the min/max fallback when the bounds
    /// are omitted.
    pub count: i64,
    #[serde(default)]
    pub min_count: Option<i64>,
    #[serde(default)]
    pub max_count: Option<i64>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub fixed_date_timezone: Option<String>,
    #[serde(default)]
    pub fixed_date_start: Option<String>,
    #[serde(default)]
    pub fixed_date_end: Option<String>,
    #[serde(default)]
    pub recurrence_frequency: Option<RecurrenceFrequency>,
    #[serde(default)]
    pub recurrence_timezone: Option<String>,
    #[serde(default)]
    pub recurrence_days: Vec<Value>,
    #[serde(default)]
    pub recurrence_hours: Vec<Value>,
    #[serde(default)]
    pub recurrence_mins: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSpec {
    pub service_url: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSpec {
    #[serde(default, alias = "enable_admin")]
    pub send_to_subscription_administrator: bool,
    #[serde(default, alias = "enable_co_admin")]
    pub send_to_subscription_co_administrators: bool,
    #[serde(default)]
    pub custom_emails: Vec<String>,
    #[serde(default)]
    pub webhooks: Vec<WebhookSpec>,
}

/// The scale target: either a full ARM resource URI or the parts to
/// format one from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetRef {
    Uri(String),
    Parts {
        name: String,
        namespace: String,
        types: String,
        #[serde(default)]
        resource_group: Option<String>,
        #[serde(default)]
        subscription_id: Option<String>,
    },
}

impl TargetRef {
    fn resolve(&self, default_subscription: &str, default_group: &str) -> String {
        match self {
            Self::Uri(uri) => uri.clone(),
            Self::Parts {
                name,
                namespace,
                types,
                resource_group,
                subscription_id,
            } => ResourceId::new(
                subscription_id.as_deref().unwrap_or(default_subscription),
                resource_group.as_deref().unwrap_or(default_group),
                namespace,
                types,
                name,
            )
            .path(),
        }
    }
}

/// Desired state for one autoscale setting.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoscaleSpec {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
    #[serde(default)]
    pub state: Presence,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub target: Option<TargetRef>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub profiles: Vec<ProfileSpec>,
    /// `None` means the caller did not supply notifications and they are
    /// left out of drift detection entirely.
    #[serde(default)]
    pub notifications: Option<Vec<NotificationSpec>>,
}

pub struct AutoscaleHandler {
    spec: AutoscaleSpec,
    id: ResourceId,
    target_uri: Option<String>,
}

impl AutoscaleHandler {
    pub fn new(spec: AutoscaleSpec) -> Self {
        let id = ResourceId::new(
            &spec.subscription_id,
            &spec.resource_group,
            NAMESPACE,
            RESOURCE_TYPE,
            &spec.name,
        );
        let target_uri = spec
            .target
            .as_ref()
            .map(|t| t.resolve(&spec.subscription_id, &spec.resource_group));
        Self {
            spec,
            id,
            target_uri,
        }
    }

    fn rule_resource_uri(&self, rule: &RuleSpec) -> String {
        rule.metric_resource_uri
            .clone()
            .or_else(|| self.target_uri.clone())
            .unwrap_or_default()
    }

    // ── desired → wire ──────────────────────────────────────────────

    fn rule_payload(&self, rule: &RuleSpec) -> Value {
        json!({
            "metricTrigger": {
                "metricName": rule.metric_name,
                "metricResourceUri": self.rule_resource_uri(rule),
                "timeGrain": norm::minutes_to_iso(rule.time_grain),
                "statistic": rule.statistic.as_str(),
                "timeWindow": norm::minutes_to_iso(rule.time_window),
                "timeAggregation": rule.time_aggregation.as_str(),
                "operator": rule.operator.as_str(),
                "threshold": rule.threshold,
            },
            "scaleAction": {
                "direction": rule.direction.as_str(),
                "type": rule.scale_type.as_str(),
                "value": rule.value,
                "cooldown": norm::minutes_to_iso(rule.cooldown),
            },
        })
    }

    fn profile_payload(&self, profile: &ProfileSpec) -> Value {
        let mut body = json!({
            "name": profile.name,
            "capacity": {
                "minimum": profile.min_count.unwrap_or(profile.count).to_string(),
                "maximum": profile.max_count.unwrap_or(profile.count).to_string(),
                "default": profile.count.to_string(),
            },
            "rules": profile.rules.iter().map(|r| self.rule_payload(r)).collect::<Vec<_>>(),
        });
        if profile.fixed_date_timezone.is_some() {
            body["fixedDate"] = json!({
                "timeZone": profile.fixed_date_timezone,
                "start": profile.fixed_date_start,
                "end": profile.fixed_date_end,
            });
        }
        if let Some(frequency) = profile.recurrence_frequency {
            body["recurrence"] = json!({
                "frequency": frequency.as_str(),
                "schedule": {
                    "timeZone": profile.recurrence_timezone,
                    "days": profile.recurrence_days,
                    "hours": profile.recurrence_hours,
                    "minutes": profile.recurrence_mins,
                },
            });
        }
        body
    }

    fn notification_payload(notification: &NotificationSpec) -> Value {
        json!({
            "operation": "Scale",
            "email": {
                "sendToSubscriptionAdministrator": notification.send_to_subscription_administrator,
                "sendToSubscriptionCoAdministrators": notification.send_to_subscription_co_administrators,
                "customEmails": notification.custom_emails,
            },
            "webhooks": notification.webhooks.iter().map(|w| json!({
                "serviceUri": w.service_url,
                "properties": w.properties,
            })).collect::<Vec<_>>(),
        })
    }

    // ── desired → normalized (for diffing against the remote) ───────

    fn rule_dict(&self, rule: &RuleSpec) -> Value {
        json!({
            "metric_name": rule.metric_name,
            "metric_resource_uri": self.rule_resource_uri(rule),
            "time_grain": rule.time_grain,
            "statistic": rule.statistic.as_str(),
            "time_window": rule.time_window,
            "time_aggregation": rule.time_aggregation.as_str(),
            "operator": rule.operator.as_str(),
            "threshold": rule.threshold,
            "direction": rule.direction.as_str(),
            "type": rule.scale_type.as_str(),
            "value": rule.value,
            "cooldown": rule.cooldown,
        })
    }

    fn profile_dict(&self, profile: &ProfileSpec) -> Value {
        let mut rules: Vec<Value> = profile.rules.iter().map(|r| self.rule_dict(r)).collect();
        norm::sort_by_canonical(&mut rules);
        json!({
            "name": profile.name,
            "count": profile.count,
            "min_count": profile.min_count.unwrap_or(profile.count),
            "max_count": profile.max_count.unwrap_or(profile.count),
            "rules": rules,
            "fixed_date_timezone": profile.fixed_date_timezone,
            "fixed_date_start": profile.fixed_date_start,
            "fixed_date_end": profile.fixed_date_end,
            "recurrence_frequency": profile.recurrence_frequency.map(RecurrenceFrequency::as_str),
            "recurrence_timezone": profile.recurrence_timezone,
            "recurrence_days": profile.recurrence_days,
            "recurrence_hours": profile.recurrence_hours,
            "recurrence_mins": profile.recurrence_mins,
        })
    }

    fn notification_dict(notification: &NotificationSpec) -> Value {
        let mut emails: Vec<Value> = notification
            .custom_emails
            .iter()
            .map(|e| json!(e))
            .collect();
        norm::sort_by_canonical(&mut emails);
        let mut webhooks: Vec<Value> = notification
            .webhooks
            .iter()
            .map(|w| json!({"service_url": w.service_url, "properties": w.properties}))
            .collect();
        norm::sort_by_canonical(&mut webhooks);
        json!({
            "send_to_subscription_administrator": notification.send_to_subscription_administrator,
            "send_to_subscription_co_administrators": notification.send_to_subscription_co_administrators,
            "custom_emails": emails,
            "webhooks": webhooks,
        })
    }
}

// ── wire → normalized ───────────────────────────────────────────────

fn normalize_rule(rule: &Value, default_uri: &str) -> Value {
    let trigger = rule.get("metricTrigger").cloned().unwrap_or_else(|| json!({}));
    let action = rule.get("scaleAction").cloned().unwrap_or_else(|| json!({}));
    json!({
        "metric_name": trigger.get("metricName").cloned().unwrap_or(Value::Null),
        "metric_resource_uri": trigger.get("metricResourceUri").cloned()
            .unwrap_or_else(|| json!(default_uri)),
        "time_grain": norm::minutes_norm(trigger.get("timeGrain").unwrap_or(&Value::Null)),
        "statistic": trigger.get("statistic").cloned().unwrap_or(Value::Null),
        "time_window": norm::minutes_norm(trigger.get("timeWindow").unwrap_or(&Value::Null)),
        "time_aggregation": trigger.get("timeAggregation").cloned().unwrap_or(Value::Null),
        "operator": trigger.get("operator").cloned().unwrap_or(Value::Null),
        "threshold": norm::float_value(trigger.get("threshold").unwrap_or(&Value::Null)),
        "direction": action.get("direction").cloned().unwrap_or(Value::Null),
        "type": action.get("type").cloned().unwrap_or(Value::Null),
        "value": action.get("value").cloned().unwrap_or(Value::Null),
        "cooldown": norm::minutes_norm(action.get("cooldown").unwrap_or(&Value::Null)),
    })
}

fn normalize_profile(profile: &Value, default_uri: &str) -> Value {
    let capacity = profile.get("capacity").cloned().unwrap_or_else(|| json!({}));
    let mut rules: Vec<Value> = profile
        .get("rules")
        .and_then(Value::as_array)
        .map(|rs| rs.iter().map(|r| normalize_rule(r, default_uri)).collect())
        .unwrap_or_default();
    norm::sort_by_canonical(&mut rules);

    let fixed = profile.get("fixedDate");
    let recurrence = profile.get("recurrence");
    let schedule = recurrence.and_then(|r| r.get("schedule"));
    let schedule_list = |key: &str| -> Value {
        schedule
            .and_then(|s| s.get(key))
            .cloned()
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| json!([]))
    };

    json!({
        "name": profile.get("name").cloned().unwrap_or(Value::Null),
        "count": norm::int_value(capacity.get("default").unwrap_or(&Value::Null)),
        "min_count": norm::int_value(capacity.get("minimum").unwrap_or(&Value::Null)),
        "max_count": norm::int_value(capacity.get("maximum").unwrap_or(&Value::Null)),
        "rules": rules,
        "fixed_date_timezone": fixed.and_then(|f| f.get("timeZone")).cloned().unwrap_or(Value::Null),
        "fixed_date_start": fixed.and_then(|f| f.get("start")).cloned().unwrap_or(Value::Null),
        "fixed_date_end": fixed.and_then(|f| f.get("end")).cloned().unwrap_or(Value::Null),
        "recurrence_frequency": recurrence.and_then(|r| r.get("frequency")).cloned().unwrap_or(Value::Null),
        "recurrence_timezone": schedule.and_then(|s| s.get("timeZone")).cloned().unwrap_or(Value::Null),
        "recurrence_days": schedule_list("days"),
        "recurrence_hours": schedule_list("hours"),
        "recurrence_mins": schedule_list("minutes"),
    })
}

fn normalize_notification(notification: &Value) -> Value {
    let email = notification.get("email").cloned().unwrap_or_else(|| json!({}));
    let mut emails: Vec<Value> = email
        .get("customEmails")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    norm::sort_by_canonical(&mut emails);
    let mut webhooks: Vec<Value> = notification
        .get("webhooks")
        .and_then(Value::as_array)
        .map(|ws| {
            ws.iter()
                .map(|w| {
                    json!({
                        "service_url": w.get("serviceUri").cloned().unwrap_or(Value::Null),
                        "properties": w.get("properties").cloned()
                            .filter(|v| !v.is_null())
                            .unwrap_or_else(|| json!({})),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    norm::sort_by_canonical(&mut webhooks);

    json!({
        "send_to_subscription_administrator": email
            .get("sendToSubscriptionAdministrator").cloned().unwrap_or(json!(false)),
        "send_to_subscription_co_administrators": email
            .get("sendToSubscriptionCoAdministrators").cloned().unwrap_or(json!(false)),
        "custom_emails": emails,
        "webhooks": webhooks,
    })
}

/// Flatten an autoscale setting (ARM body or PUT payload) into the
/// normalized shape returned to callers and used for diffing.
pub fn normalize_setting(remote: &Value) -> Value {
    let props = remote.get("properties").cloned().unwrap_or_else(|| json!({}));
    let target = props
        .get("targetResourceUri")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let profiles: Vec<Value> = props
        .get("profiles")
        .and_then(Value::as_array)
        .map(|ps| ps.iter().map(|p| normalize_profile(p, &target)).collect())
        .unwrap_or_default();
    let notifications: Vec<Value> = props
        .get("notifications")
        .and_then(Value::as_array)
        .map(|ns| ns.iter().map(normalize_notification).collect())
        .unwrap_or_default();

    json!({
        "id": remote.get("id").cloned().unwrap_or(Value::Null),
        "name": remote.get("name").cloned()
            .or_else(|| props.get("name").cloned())
            .unwrap_or(Value::Null),
        "location": remote.get("location").cloned().unwrap_or(Value::Null),
        "tags": remote.get("tags").cloned().filter(|v| !v.is_null()).unwrap_or_else(|| json!({})),
        "target": target,
        "enabled": props.get("enabled").cloned().unwrap_or(Value::Null),
        "profiles": profiles,
        "notifications": notifications,
    })
}

impl ResourceHandler for AutoscaleHandler {
    fn kind(&self) -> &'static str {
        "autoscale_setting"
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
        if self.spec.state == Presence::Present {
            if self.target_uri.is_none() {
                errors.push(ValidationError::new("target", "required when state is present"));
            }
            if self.spec.profiles.is_empty() {
                errors.push(ValidationError::new(
                    "profiles",
                    "must not be empty when state is present",
                ));
            }
        }
        for (i, profile) in self.spec.profiles.iter().enumerate() {
            if let Some(min) = profile.min_count {
                if min > profile.count {
                    errors.push(ValidationError::new(
                        format!("profiles[{i}].min_count"),
                        "must not exceed count",
                    ));
                }
            }
            if let Some(max) = profile.max_count {
                if max < profile.count {
                    errors.push(ValidationError::new(
                        format!("profiles[{i}].max_count"),
                        "must not be below count",
                    ));
                }
            }
        }
        for notification in self.spec.notifications.iter().flatten() {
            for (i, webhook) in notification.webhooks.iter().enumerate() {
                if webhook.service_url.is_empty() {
                    errors.push(ValidationError::new(
                        format!("notifications.webhooks[{i}].service_url"),
                        "must not be empty",
                    ));
                }
            }
        }
        errors
    }

    fn build_payload(&self, current: Option<&Value>) -> Result<Value, StratusError> {
        let current_tags = current
            .and_then(|c| c.get("tags"))
            .and_then(Value::as_object);
        let (_, tags) = norm::merge_tags(current_tags, self.spec.tags.as_ref());

        // Reuse the remote location when the caller left it out; on a
        // first create with no location the key stays absent and the
        // provider decides.
        let location = self.spec.location.clone().or_else(|| {
            current
                .and_then(|c| c.get("location"))
                .and_then(Value::as_str)
                .map(String::from)
        });

        let profiles: Vec<Value> = self
            .spec
            .profiles
            .iter()
            .map(|p| self.profile_payload(p))
            .collect();
        let notifications: Vec<Value> = self
            .spec
            .notifications
            .iter()
            .flatten()
            .map(Self::notification_payload)
            .collect();

        let mut payload = json!({
            "tags": Value::Object(tags),
            "properties": {
                "name": self.spec.name,
                "targetResourceUri": self.target_uri,
                "enabled": self.spec.enabled.unwrap_or(true),
                "profiles": profiles,
                "notifications": notifications,
            },
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

        if let Some(target) = &self.target_uri {
            let actual = current.get("target").and_then(Value::as_str);
            if actual != Some(target.as_str()) {
                drifts.push(FieldDrift::new(
                    "target",
                    json!(target),
                    current.get("target").cloned().unwrap_or(Value::Null),
                ));
            }
        }

        // Compared unconditionally: an omitted `enabled` means the same
        // `true` the update payload would write.
        let enabled = self.spec.enabled.unwrap_or(true);
        let actual = current.get("enabled").and_then(Value::as_bool);
        if actual != Some(enabled) {
            drifts.push(FieldDrift::new(
                "enabled",
                json!(enabled),
                current.get("enabled").cloned().unwrap_or(Value::Null),
            ));
        }

        if !self.spec.profiles.is_empty() {
            let desired: Vec<Value> = self
                .spec
                .profiles
                .iter()
                .map(|p| self.profile_dict(p))
                .collect();
            // A remote shape we can't read as a list counts as drift.
            let in_sync = current
                .get("profiles")
                .and_then(Value::as_array)
                .is_some_and(|actual| norm::unordered_eq(&desired, actual));
            if !in_sync {
                drifts.push(FieldDrift::new(
                    "profiles",
                    json!(desired),
                    current.get("profiles").cloned().unwrap_or(Value::Null),
                ));
            }
        }

        if let Some(notifications) = &self.spec.notifications {
            let desired: Vec<Value> = notifications.iter().map(Self::notification_dict).collect();
            let in_sync = current
                .get("notifications")
                .and_then(Value::as_array)
                .is_some_and(|actual| norm::unordered_eq(&desired, actual));
            if !in_sync {
                drifts.push(FieldDrift::new(
                    "notifications",
                    json!(desired),
                    current.get("notifications").cloned().unwrap_or(Value::Null),
                ));
            }
        }

        drifts
    }

    fn normalize(&self, remote: &Value) -> Value {
        normalize_setting(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(spec: Value) -> AutoscaleHandler {
        AutoscaleHandler::new(serde_json::from_value(spec).unwrap())
    }

    fn base_spec() -> Value {
        json!({
            "subscription_id": "sub1",
            "resource_group": "Testing",
            "name": "foobar",
            "state": "present",
            "location": "eastus",
            "target": "/subscriptions/sub1/resourceGroups/Testing/providers/Microsoft.Compute/virtualMachineScaleSets/vm001",
            "profiles": [
                {"name": "p1", "count": 2, "min_count": 1, "max_count": 4, "rules": []}
            ]
        })
    }

    #[test]
    fn payload_maps_capacity_to_decimal_strings() {
        let h = handler(base_spec());
        let payload = h.build_payload(None).unwrap();
        let profile = &payload["properties"]["profiles"][0];
        assert_eq!(profile["name"], "p1");
        assert_eq!(profile["capacity"]["default"], "2");
        assert_eq!(profile["capacity"]["minimum"], "1");
        assert_eq!(profile["capacity"]["maximum"], "4");
        assert!(payload["properties"]["targetResourceUri"]
            .as_str()
            .unwrap()
            .ends_with("vm001"));
    }

    #[test]
    fn omitted_rule_fields_get_documented_defaults() {
        let mut spec = base_spec();
        spec["profiles"][0]["rules"] = json!([{"metric_name": "Percentage CPU"}]);
        let h = handler(spec);
        let payload = h.build_payload(None).unwrap();
        let rule = &payload["properties"]["profiles"][0]["rules"][0];
        let trigger = &rule["metricTrigger"];
        assert_eq!(trigger["timeGrain"], "PT1M");
        assert_eq!(trigger["statistic"], "Average");
        assert_eq!(trigger["timeWindow"], "PT10M");
        assert_eq!(trigger["timeAggregation"], "Average");
        assert_eq!(trigger["operator"], "GreaterThan");
        assert_eq!(trigger["threshold"], 70.0);
        // trigger uri falls back to the setting's target
        assert!(trigger["metricResourceUri"].as_str().unwrap().ends_with("vm001"));
        let action = &rule["scaleAction"];
        assert_eq!(action["direction"], "None");
        assert_eq!(action["type"], "ChangeCount");
        assert_eq!(action["cooldown"], "PT5M");
    }

    #[test]
    fn payload_normalizes_back_to_in_sync_state() {
        let mut spec = base_spec();
        spec["profiles"][0]["rules"] = json!([
            {"metric_name": "Percentage CPU", "direction": "Increase", "value": "1"}
        ]);
        spec["tags"] = json!({"env": "test"});
        spec["enabled"] = json!(true);
        let h = handler(spec);

        // A remote that equals normalize(build_payload(D)) must diff clean.
        let payload = h.build_payload(None).unwrap();
        let current = h.normalize(&payload);
        assert!(h.diff(&current).is_empty());
    }

    #[test]
    fn normalize_is_idempotent_on_durations() {
        let h = handler(base_spec());
        let remote = json!({
            "id": "/subscriptions/sub1/x",
            "name": "foobar",
            "location": "eastus",
            "properties": {
                "targetResourceUri": "/t",
                "enabled": true,
                "profiles": [{
                    "name": "p1",
                    "capacity": {"minimum": "1", "maximum": "4", "default": "2"},
                    "rules": [{
                        "metricTrigger": {
                            "metricName": "Percentage CPU",
                            "metricResourceUri": "/t",
                            "timeGrain": "PT1M",
                            "statistic": "Average",
                            "timeWindow": "PT10M",
                            "timeAggregation": "Average",
                            "operator": "GreaterThan",
                            "threshold": 70
                        },
                        "scaleAction": {
                            "direction": "Increase",
                            "type": "ChangeCount",
                            "value": "1",
                            "cooldown": "PT5M"
                        }
                    }]
                }]
            }
        });
        let flat = h.normalize(&remote);
        let rule = &flat["profiles"][0]["rules"][0];
        assert_eq!(rule["time_grain"], 1);
        assert_eq!(rule["time_window"], 10);
        assert_eq!(rule["cooldown"], 5);
        assert_eq!(flat["profiles"][0]["count"], 2);
        assert_eq!(flat["profiles"][0]["min_count"], 1);
    }

    #[test]
    fn rule_order_does_not_drift() {
        let rule_a = json!({"metric_name": "Percentage CPU", "direction": "Increase", "value": "1"});
        let rule_b = json!({"metric_name": "Disk Read Bytes", "operator": "LessThan",
                            "direction": "Decrease", "value": "1"});

        let mut spec = base_spec();
        spec["profiles"][0]["rules"] = json!([rule_a, rule_b]);
        let forward = handler(spec.clone());
        let current = forward.normalize(&forward.build_payload(None).unwrap());

        spec["profiles"][0]["rules"] = json!([rule_b, rule_a]);
        let reversed = handler(spec);
        assert!(reversed.diff(&current).is_empty());
    }

    #[test]
    fn disabled_remote_drifts_even_when_enabled_is_omitted() {
        // base_spec leaves `enabled` out, which means the default `true`.
        let h = handler(base_spec());
        let mut current = h.normalize(&h.build_payload(None).unwrap());
        current["enabled"] = json!(false);

        let drifts = h.diff(&current);
        assert!(drifts.iter().any(|d| d.field == "enabled"));
        // the replacement payload writes the same value diff compared
        let payload = h.build_payload(Some(&current)).unwrap();
        assert_eq!(payload["properties"]["enabled"], true);
    }

    #[test]
    fn tag_drift_is_detected_and_merged_into_payload() {
        let mut spec = base_spec();
        spec["tags"] = json!({"env": "staging"});
        let h = handler(spec);

        let current = json!({
            "location": "eastus",
            "tags": {"env": "prod", "owner": "ops"},
            "target": "/subscriptions/sub1/resourceGroups/Testing/providers/Microsoft.Compute/virtualMachineScaleSets/vm001",
            "profiles": [],
        });
        let drifts = h.diff(&current);
        assert!(drifts.iter().any(|d| d.field == "tags"));

        let payload = h.build_payload(Some(&current)).unwrap();
        // desired key overlaid, remote-only key preserved
        assert_eq!(payload["tags"]["env"], "staging");
        assert_eq!(payload["tags"]["owner"], "ops");
    }

    #[test]
    fn unreadable_remote_profiles_fail_open_to_changed() {
        let h = handler(base_spec());
        let current = json!({
            "target": "/subscriptions/sub1/resourceGroups/Testing/providers/Microsoft.Compute/virtualMachineScaleSets/vm001",
            "profiles": "not-a-list",
        });
        assert!(h.diff(&current).iter().any(|d| d.field == "profiles"));
    }

    #[test]
    fn present_without_target_or_profiles_fails_validation() {
        let h = handler(json!({
            "subscription_id": "sub1",
            "resource_group": "Testing",
            "name": "foobar",
            "state": "present"
        }));
        let errors = h.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"target"));
        assert!(fields.contains(&"profiles"));
    }

    #[test]
    fn absent_state_needs_no_target() {
        let h = handler(json!({
            "subscription_id": "sub1",
            "resource_group": "Testing",
            "name": "foobar",
            "state": "absent"
        }));
        assert!(h.validate().is_empty());
    }

    #[test]
    fn capacity_bounds_are_validated() {
        let mut spec = base_spec();
        spec["profiles"][0]["min_count"] = json!(3);
        let h = handler(spec);
        assert!(h.validate().iter().any(|e| e.field == "profiles[0].min_count"));
    }

    #[test]
    fn structured_target_is_formatted_into_a_resource_uri() {
        let mut spec = base_spec();
        spec["target"] = json!({
            "name": "vm001",
            "namespace": "Microsoft.Compute",
            "types": "virtualMachineScaleSets"
        });
        let h = handler(spec);
        let payload = h.build_payload(None).unwrap();
        assert_eq!(
            payload["properties"]["targetResourceUri"],
            "/subscriptions/sub1/resourceGroups/Testing/providers/Microsoft.Compute/virtualMachineScaleSets/vm001"
        );
    }

    #[test]
    fn notification_aliases_are_accepted() {
        let mut spec = base_spec();
        spec["notifications"] = json!([{"enable_admin": true, "custom_emails": ["a@b.c"]}]);
        let h = handler(spec);
        let payload = h.build_payload(None).unwrap();
        let email = &payload["properties"]["notifications"][0]["email"];
        assert_eq!(email["sendToSubscriptionAdministrator"], true);
        assert_eq!(email["customEmails"][0], "a@b.c");
    }
}
