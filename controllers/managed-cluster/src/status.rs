//! Status condition updates.
//!
//! `set_condition` is the pure merge of one desired condition into a list;
//! `update_condition` wraps it in a read-modify-write against the hub.

use chrono::{DateTime, Utc};
use crds::{Condition, ConditionStatus, HUB_ACCEPTED_CONDITION};
use hub_client::{HubClientTrait, HubError};
use tracing::debug;

pub const REASON_ACCEPTED: &str = "HubClusterAdminAccepted";
pub const REASON_DENIED: &str = "HubClusterAdminDenied";
pub const REASON_ERROR: &str = "Error";

pub const MESSAGE_ACCEPTED: &str = "Accepted by hub cluster admin";
pub const MESSAGE_DENIED: &str = "Denied by hub cluster admin";

/// Desired state of one condition; the transition time is managed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredCondition {
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
}

impl DesiredCondition {
    /// `HubAccepted=True`, carrying provisioning errors in the message when there are any.
    pub fn hub_accepted(provision_errors: Option<String>) -> Self {
        let (reason, message) = match provision_errors {
            Some(errors) => (REASON_ERROR.to_string(), errors),
            None => (REASON_ACCEPTED.to_string(), MESSAGE_ACCEPTED.to_string()),
        };
        Self {
            type_: HUB_ACCEPTED_CONDITION.to_string(),
            status: ConditionStatus::True,
            reason,
            message,
        }
    }

    /// `HubAccepted=False` after the admin revoked acceptance.
    pub fn hub_denied() -> Self {
        Self {
            type_: HUB_ACCEPTED_CONDITION.to_string(),
            status: ConditionStatus::False,
            reason: REASON_DENIED.to_string(),
            message: MESSAGE_DENIED.to_string(),
        }
    }
}

/// Merge `desired` into `conditions`. Returns false when nothing changed.
///
/// `lastTransitionTime` moves only when the status flips.
pub fn set_condition(conditions: &mut Vec<Condition>, desired: &DesiredCondition, now: DateTime<Utc>) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.type_ == desired.type_) else {
        conditions.push(Condition {
            type_: desired.type_.clone(),
            status: desired.status,
            reason: desired.reason.clone(),
            message: desired.message.clone(),
            last_transition_time: now,
        });
        return true;
    };

    if existing.status == desired.status && existing.reason == desired.reason && existing.message == desired.message {
        return false;
    }

    if existing.status != desired.status {
        existing.status = desired.status;
        existing.last_transition_time = now;
    }
    existing.reason = desired.reason.clone();
    existing.message = desired.message.clone();
    true
}

/// Re-read the cluster, merge `desired` and write the status back if it changed.
///
/// Returns whether a write happened. A stale read surfaces as `HubError::Conflict`.
pub async fn update_condition(
    hub: &dyn HubClientTrait,
    cluster_name: &str,
    desired: &DesiredCondition,
) -> Result<bool, HubError> {
    let mut cluster = hub.get_managed_cluster(cluster_name).await?;
    let status = cluster.status.get_or_insert_with(Default::default);
    if !set_condition(&mut status.conditions, desired, Utc::now()) {
        debug!("Condition {} on ManagedCluster {} already up to date", desired.type_, cluster_name);
        return Ok(false);
    }

    hub.update_managed_cluster_status(&cluster).await?;
    debug!(
        "Set {}={} ({}) on ManagedCluster {}",
        desired.type_, desired.status, desired.reason, cluster_name
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::managed_cluster;
    use chrono::TimeZone;
    use crds::find_condition;
    use hub_client::MockHubClient;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_inserts_missing_condition() {
        let mut conditions = Vec::new();
        assert!(set_condition(&mut conditions, &DesiredCondition::hub_accepted(None), at(10)));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, REASON_ACCEPTED);
        assert_eq!(conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_identical_condition_is_noop() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, &DesiredCondition::hub_denied(), at(10));
        let before = conditions.clone();

        assert!(!set_condition(&mut conditions, &DesiredCondition::hub_denied(), at(20)));
        assert_eq!(conditions, before);
    }

    #[test]
    fn test_reason_change_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, &DesiredCondition::hub_accepted(None), at(10));

        let failing = DesiredCondition::hub_accepted(Some("\"namespace.yaml\" (Namespace): boom".into()));
        assert!(set_condition(&mut conditions, &failing, at(20)));
        assert_eq!(conditions[0].reason, REASON_ERROR);
        assert_eq!(conditions[0].message, "\"namespace.yaml\" (Namespace): boom");
        assert_eq!(conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_status_flip_moves_transition_time() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, &DesiredCondition::hub_accepted(None), at(10));
        assert!(set_condition(&mut conditions, &DesiredCondition::hub_denied(), at(20)));
        assert_eq!(conditions[0].status, ConditionStatus::False);
        assert_eq!(conditions[0].last_transition_time, at(20));
    }

    #[test]
    fn test_other_condition_types_untouched() {
        let mut conditions = vec![Condition {
            type_: "ManagedClusterConditionAvailable".to_string(),
            status: ConditionStatus::Unknown,
            reason: "LeaseUnknown".to_string(),
            message: String::new(),
            last_transition_time: at(1),
        }];
        set_condition(&mut conditions, &DesiredCondition::hub_accepted(None), at(10));
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].status, ConditionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_update_condition_writes_once() {
        let hub = MockHubClient::new();
        hub.add_managed_cluster(managed_cluster("east-1", true));

        assert!(update_condition(&hub, "east-1", &DesiredCondition::hub_accepted(None)).await.unwrap());
        assert!(!update_condition(&hub, "east-1", &DesiredCondition::hub_accepted(None)).await.unwrap());
        assert_eq!(hub.cluster_writes(), 1);

        let stored = hub.managed_cluster("east-1").unwrap();
        let condition = find_condition(stored.conditions(), HUB_ACCEPTED_CONDITION).unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.message, MESSAGE_ACCEPTED);
    }

    #[tokio::test]
    async fn test_update_condition_surfaces_conflict() {
        let hub = MockHubClient::new();
        hub.add_managed_cluster(managed_cluster("east-1", true));
        hub.conflict_next_write();

        let err = update_condition(&hub, "east-1", &DesiredCondition::hub_denied()).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
