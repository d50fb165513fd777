//! Status conditions
//!
//! Standard Kubernetes-style conditions: a list keyed by `type`, each entry
//! recording the latest observation for that type.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single observation about the state of a resource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, unique within a condition list
    #[serde(rename = "type")]
    pub type_: String,

    /// Condition status
    pub status: ConditionStatus,

    /// Machine-readable reason for the last transition
    #[serde(default)]
    pub reason: String,

    /// Human-readable details
    #[serde(default)]
    pub message: String,

    /// Last time `status` changed
    pub last_transition_time: DateTime<Utc>,
}

/// Condition status
///
/// Serializes as "True", "False" or "Unknown".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the condition of the given type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Whether the condition is present and `True`.
pub fn is_condition_true(condition: Option<&Condition>) -> bool {
    condition.is_some_and(|c| c.status == ConditionStatus::True)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: &str, status: ConditionStatus) -> Condition {
        Condition {
            type_: type_.to_string(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: Utc::now(),
        }
    }

    #[test]
    fn test_find_condition_by_type() {
        let conditions = vec![
            condition("ManagedClusterJoined", ConditionStatus::True),
            condition("HubAccepted", ConditionStatus::False),
        ];
        let found = find_condition(&conditions, "HubAccepted").unwrap();
        assert_eq!(found.status, ConditionStatus::False);
        assert!(find_condition(&conditions, "Available").is_none());
    }

    #[test]
    fn test_is_condition_true() {
        assert!(is_condition_true(Some(&condition("HubAccepted", ConditionStatus::True))));
        assert!(!is_condition_true(Some(&condition("HubAccepted", ConditionStatus::False))));
        assert!(!is_condition_true(Some(&condition("HubAccepted", ConditionStatus::Unknown))));
        assert!(!is_condition_true(None));
    }

    #[test]
    fn test_status_serializes_pascal_case() {
        let json = serde_json::to_value(condition("HubAccepted", ConditionStatus::True)).unwrap();
        assert_eq!(json["type"], "HubAccepted");
        assert_eq!(json["status"], "True");
        assert!(json.get("lastTransitionTime").is_some());
    }
}
