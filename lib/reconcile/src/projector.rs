//! Read path and pre-mutation validation.

use crate::error::ReconcileError;
use crate::state::{DesiredState, MembershipRecord, ObservedState, Protection};
use membersync_core::{GroupId, Result, UserId};
use membersync_directory::{MembershipClient, MembershipOperation};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Projects directory listings into membership state and checks desired
/// state against the directory before anything is changed.
pub struct StateProjector<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: MembershipClient + ?Sized> StateProjector<'a, C> {
    /// Creates a projector over a client.
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Fails on the first user id the directory cannot return.
    ///
    /// Nothing is mutated here, so a single bad id aborts the whole
    /// operation before any membership changes.
    #[instrument(skip_all, fields(count = user_ids.len()))]
    pub async fn validate_users_exist(
        &self,
        user_ids: &BTreeSet<UserId>,
    ) -> Result<(), ReconcileError> {
        for user_id in user_ids {
            if let Err(report) = self.client.get_user(user_id).await {
                let context = if report.current_context().is_not_found() {
                    ReconcileError::UserNotFound {
                        user_id: user_id.clone(),
                    }
                } else {
                    ReconcileError::UserLookupFailed {
                        user_id: user_id.clone(),
                    }
                };
                return Err(report.context(context));
            }
        }

        debug!("all desired users exist");
        Ok(())
    }

    /// Validates a desired state: structural checks, then user existence.
    pub async fn validate_desired(&self, desired: &DesiredState) -> Result<(), ReconcileError> {
        check_structure(desired)?;
        self.validate_users_exist(&desired.user_ids).await
    }

    /// Lists the current user members of a group.
    pub async fn list_users(&self, group_id: &GroupId) -> Result<BTreeSet<UserId>, ReconcileError> {
        self.client.list_group_users(group_id).await.map_err(|report| {
            report.context(ReconcileError::RemoteOperation {
                operation: MembershipOperation::ListGroupUsers,
                group_id: group_id.clone(),
            })
        })
    }

    /// Lists the current group members of a group.
    pub async fn list_groups(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<GroupId>, ReconcileError> {
        self.client.list_group_groups(group_id).await.map_err(|report| {
            report.context(ReconcileError::RemoteOperation {
                operation: MembershipOperation::ListGroupGroups,
                group_id: group_id.clone(),
            })
        })
    }

    /// Lists both member kinds of a group.
    #[instrument(skip_all, fields(group_id = %group_id))]
    pub async fn project_observed(&self, group_id: &GroupId) -> Result<ObservedState, ReconcileError> {
        let user_ids = self.list_users(group_id).await?;
        let group_ids = self.list_groups(group_id).await?;

        debug!(
            users = user_ids.len(),
            groups = group_ids.len(),
            "observed membership"
        );
        Ok(ObservedState {
            user_ids,
            group_ids,
        })
    }

    /// Reads a group into its external representation.
    pub async fn project_record(
        &self,
        group_id: &GroupId,
        protection: Protection,
    ) -> Result<MembershipRecord, ReconcileError> {
        let observed = self.project_observed(group_id).await?;
        Ok(MembershipRecord::from_observed(
            group_id.clone(),
            observed,
            protection,
        ))
    }
}

/// Checks that need no directory access.
pub(crate) fn check_structure(desired: &DesiredState) -> Result<(), ReconcileError> {
    if desired.group_ids.contains(&desired.target_group_id) {
        return Err(ReconcileError::InvalidDesiredState {
            reason: format!(
                "group '{}' cannot be a member of itself",
                desired.target_group_id
            ),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use membersync_directory::{DirectoryCall, InMemoryDirectory, MembershipEdge};

    fn gid(s: &str) -> GroupId {
        GroupId::new(s).unwrap()
    }

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn validation_stops_at_first_missing_user() {
        let directory = InMemoryDirectory::new().with_users(["u1", "u3"]);
        let projector = StateProjector::new(&directory);

        let ids = BTreeSet::from([uid("u1"), uid("u2"), uid("u3")]);
        let err = projector.validate_users_exist(&ids).await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ReconcileError::UserNotFound { user_id: uid("u2") }
        );
        assert_eq!(
            directory.calls(),
            vec![
                DirectoryCall::GetUser(uid("u1")),
                DirectoryCall::GetUser(uid("u2")),
            ]
        );
    }

    #[tokio::test]
    async fn lookup_failure_is_distinguished_from_absence() {
        let directory = InMemoryDirectory::new().with_users(["u1"]);
        directory.fail_on(DirectoryCall::GetUser(uid("u1")));
        let projector = StateProjector::new(&directory);

        let err = projector
            .validate_users_exist(&BTreeSet::from([uid("u1")]))
            .await
            .unwrap_err();

        assert_eq!(
            err.current_context(),
            &ReconcileError::UserLookupFailed { user_id: uid("u1") }
        );
    }

    #[tokio::test]
    async fn self_membership_is_rejected_without_remote_calls() {
        let directory = InMemoryDirectory::new();
        let projector = StateProjector::new(&directory);
        let desired = DesiredState::new(gid("g")).with_groups([gid("g")]);

        let err = projector.validate_desired(&desired).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            ReconcileError::InvalidDesiredState { .. }
        ));
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn record_reflects_listings_and_protection() {
        let directory = InMemoryDirectory::new()
            .with_edge(MembershipEdge::user(gid("g"), uid("u1")))
            .with_edge(MembershipEdge::group(gid("g"), gid("child")));
        let projector = StateProjector::new(&directory);

        let protection = Protection::users(BTreeSet::from([uid("keep")]));
        let record = projector
            .project_record(&gid("g"), protection)
            .await
            .unwrap();

        assert_eq!(record.user_ids, BTreeSet::from([uid("u1")]));
        assert_eq!(record.group_ids, BTreeSet::from([gid("child")]));
        assert_eq!(record.delete_protected_user_ids, BTreeSet::from([uid("keep")]));
        assert!(directory.mutations().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_carries_group_context() {
        let directory = InMemoryDirectory::new();
        directory.fail_on(DirectoryCall::ListGroupGroups(gid("g")));
        let projector = StateProjector::new(&directory);

        let err = projector.project_observed(&gid("g")).await.unwrap_err();

        assert_eq!(
            err.current_context(),
            &ReconcileError::RemoteOperation {
                operation: MembershipOperation::ListGroupGroups,
                group_id: gid("g"),
            }
        );
    }
}
