//! Create, read, update and delete cycles for one managed group.
//!
//! Every operation issues its directory calls one at a time and stops at the
//! first failure. Nothing is rolled back: a failed update can leave the group
//! partially changed, and running the same operation again is the recovery
//! path. Removals are only ever issued for members a listing in the same
//! operation has just reported.

use crate::diff::{SetDiff, SyncStrategy, diff, memberships_differ};
use crate::error::ReconcileError;
use crate::projector::{StateProjector, check_structure};
use crate::state::{Applied, ChangeSummary, DesiredState, MembershipRecord, Phase, Protection};
use membersync_core::{GroupId, Result, UserId};
use membersync_directory::{DirectoryError, MembershipClient, MembershipOperation};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Reconciler behavior that can be loaded from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerOptions {
    /// How user (and changed group) membership is converged.
    #[serde(default)]
    pub strategy: SyncStrategy,
}

/// Whether a plan would create or update the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// No applied state exists; members would be added.
    Create,
    /// Applied state exists; membership would be reconciled.
    Update,
}

/// A side-effect-free preview of the calls `create` or `update` would issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipPlan {
    /// The group the plan is for.
    pub target_group_id: GroupId,
    /// Create or update.
    pub action: PlanAction,
    /// User calls.
    pub users: SetDiff<UserId>,
    /// Group calls. Empty when the group set already matches.
    pub groups: SetDiff<GroupId>,
    /// True when the group set already matches and groups would not be touched.
    pub groups_unchanged: bool,
    /// True when desired users were checked against the directory.
    pub validated: bool,
}

impl MembershipPlan {
    /// Returns true if applying the plan would issue any membership call.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.users.is_empty() || !self.groups.is_empty()
    }
}

/// Reconciles group membership through a directory client.
pub struct MembershipReconciler<C> {
    client: C,
    options: ReconcilerOptions,
}

impl<C: MembershipClient> MembershipReconciler<C> {
    /// Creates a reconciler with default options.
    pub fn new(client: C) -> Self {
        Self::with_options(client, ReconcilerOptions::default())
    }

    /// Creates a reconciler with explicit options.
    pub fn with_options(client: C, options: ReconcilerOptions) -> Self {
        Self { client, options }
    }

    fn projector(&self) -> StateProjector<'_, C> {
        StateProjector::new(&self.client)
    }

    /// Starts managing a group by adding every desired member.
    ///
    /// The group is assumed to have no prior managed membership, so members
    /// are added without consulting a listing first.
    ///
    /// # Errors
    ///
    /// Fails before any change if a desired user does not exist or the group
    /// lists itself as a member.
    #[instrument(skip_all, fields(group_id = %desired.target_group_id))]
    pub async fn create(&self, desired: &DesiredState) -> Result<Applied, ReconcileError> {
        self.projector().validate_desired(desired).await?;

        let group_id = &desired.target_group_id;
        let summary = ChangeSummary {
            users_added: self.add_users(group_id, &desired.user_ids).await?,
            groups_added: self.add_groups(group_id, &desired.group_ids).await?,
            ..ChangeSummary::default()
        };

        let record = self
            .projector()
            .project_record(group_id, desired.protection())
            .await?;
        info!(
            users_added = summary.users_added,
            groups_added = summary.groups_added,
            "group membership created"
        );
        Ok(Applied {
            phase: Phase::Created,
            record,
            summary,
        })
    }

    /// Reads the current membership of a group.
    pub async fn read(
        &self,
        group_id: &GroupId,
        protection: &Protection,
    ) -> Result<Applied, ReconcileError> {
        let record = self
            .projector()
            .project_record(group_id, protection.clone())
            .await?;
        Ok(Applied {
            phase: Phase::Read,
            record,
            summary: ChangeSummary::default(),
        })
    }

    /// Brings an existing group under management by id alone.
    pub async fn import(&self, group_id: &GroupId) -> Result<MembershipRecord, ReconcileError> {
        let applied = self.read(group_id, &Protection::default()).await?;
        info!(%group_id, "group imported");
        Ok(applied.record)
    }

    /// Converges a managed group onto a new desired state.
    ///
    /// Users are removed first, then the group set is compared and only
    /// swept when it differs, then desired users and (if swept) desired
    /// groups are added.
    ///
    /// # Errors
    ///
    /// Fails with [`ReconcileError::IdentityChanged`] if `desired` names a
    /// different group, and before any change if validation fails. A failing
    /// directory call aborts the remaining calls.
    #[instrument(skip_all, fields(group_id = %group_id, strategy = self.options.strategy.as_str()))]
    pub async fn update(
        &self,
        group_id: &GroupId,
        desired: &DesiredState,
    ) -> Result<Applied, ReconcileError> {
        ensure_same_identity(group_id, &desired.target_group_id)?;
        self.projector().validate_desired(desired).await?;

        let strategy = self.options.strategy;
        let mut summary = ChangeSummary::default();

        let actual_users = self.projector().list_users(group_id).await?;
        let user_changes = strategy.changes(
            &desired.user_ids,
            &actual_users,
            &desired.delete_protected_user_ids,
        );
        summary.users_removed = self.remove_users(group_id, &user_changes.to_remove).await?;

        let actual_groups = self.projector().list_groups(group_id).await?;
        let group_changes = if memberships_differ(&desired.group_ids, &actual_groups) {
            strategy.changes(
                &desired.group_ids,
                &actual_groups,
                &desired.delete_protected_group_ids,
            )
        } else {
            debug!("group members unchanged");
            SetDiff::empty()
        };
        summary.groups_removed = self
            .remove_groups(group_id, &group_changes.to_remove)
            .await?;

        summary.users_added = self.add_users(group_id, &user_changes.to_add).await?;
        summary.groups_added = self.add_groups(group_id, &group_changes.to_add).await?;

        let record = self
            .projector()
            .project_record(group_id, desired.protection())
            .await?;
        info!(
            users_added = summary.users_added,
            users_removed = summary.users_removed,
            groups_added = summary.groups_added,
            groups_removed = summary.groups_removed,
            "group membership updated"
        );
        Ok(Applied {
            phase: Phase::Updated,
            record,
            summary,
        })
    }

    /// Removes every unprotected member and stops managing the group.
    ///
    /// Protected users (and protected groups, if any) remain members.
    #[instrument(skip_all, fields(group_id = %group_id))]
    pub async fn delete(
        &self,
        group_id: &GroupId,
        protection: &Protection,
    ) -> Result<Applied, ReconcileError> {
        let actual_users = self.projector().list_users(group_id).await?;
        let users = diff(&BTreeSet::new(), &actual_users, &protection.user_ids);
        let users_removed = self.remove_users(group_id, &users.to_remove).await?;

        let actual_groups = self.projector().list_groups(group_id).await?;
        let groups = diff(&BTreeSet::new(), &actual_groups, &protection.group_ids);
        let groups_removed = self.remove_groups(group_id, &groups.to_remove).await?;

        let record = self
            .projector()
            .project_record(group_id, protection.clone())
            .await?;
        let summary = ChangeSummary {
            users_removed,
            groups_removed,
            ..ChangeSummary::default()
        };
        info!(users_removed, groups_removed, "group membership deleted");
        Ok(Applied {
            phase: Phase::Deleted,
            record,
            summary,
        })
    }

    /// Previews `create` (no prior record) or `update` (prior record given).
    ///
    /// Desired users are checked against the directory only when they differ
    /// from the prior record's users. Listings may be read; nothing is changed.
    #[instrument(skip_all, fields(group_id = %desired.target_group_id))]
    pub async fn plan(
        &self,
        desired: &DesiredState,
        prior: Option<&MembershipRecord>,
    ) -> Result<MembershipPlan, ReconcileError> {
        if let Some(prior) = prior {
            ensure_same_identity(&prior.target_group_id, &desired.target_group_id)?;
        }
        check_structure(desired)?;

        let validated = prior.is_none_or(|prior| prior.user_ids != desired.user_ids);
        if validated {
            self.projector()
                .validate_users_exist(&desired.user_ids)
                .await?;
        }

        let group_id = &desired.target_group_id;
        let plan = match prior {
            None => MembershipPlan {
                target_group_id: group_id.clone(),
                action: PlanAction::Create,
                users: SetDiff {
                    to_add: desired.user_ids.clone(),
                    to_remove: BTreeSet::new(),
                },
                groups: SetDiff {
                    to_add: desired.group_ids.clone(),
                    to_remove: BTreeSet::new(),
                },
                groups_unchanged: desired.group_ids.is_empty(),
                validated,
            },
            Some(_) => {
                let strategy = self.options.strategy;
                let observed = self.projector().project_observed(group_id).await?;
                let users = strategy.changes(
                    &desired.user_ids,
                    &observed.user_ids,
                    &desired.delete_protected_user_ids,
                );
                let groups_unchanged = !memberships_differ(&desired.group_ids, &observed.group_ids);
                let groups = if groups_unchanged {
                    SetDiff::empty()
                } else {
                    strategy.changes(
                        &desired.group_ids,
                        &observed.group_ids,
                        &desired.delete_protected_group_ids,
                    )
                };
                MembershipPlan {
                    target_group_id: group_id.clone(),
                    action: PlanAction::Update,
                    users,
                    groups,
                    groups_unchanged,
                    validated,
                }
            }
        };

        debug!(
            action = ?plan.action,
            has_changes = plan.has_changes(),
            validated,
            "membership planned"
        );
        Ok(plan)
    }

    async fn add_users(
        &self,
        group_id: &GroupId,
        user_ids: &BTreeSet<UserId>,
    ) -> Result<u32, ReconcileError> {
        for user_id in user_ids {
            debug!(%user_id, "adding user");
            self.client
                .add_user_to_group(group_id, user_id)
                .await
                .map_err(|report| remote(report, MembershipOperation::AddUserToGroup, group_id))?;
        }
        Ok(count(user_ids))
    }

    async fn remove_users(
        &self,
        group_id: &GroupId,
        user_ids: &BTreeSet<UserId>,
    ) -> Result<u32, ReconcileError> {
        for user_id in user_ids {
            debug!(%user_id, "removing user");
            self.client
                .remove_user_from_group(group_id, user_id)
                .await
                .map_err(|report| {
                    remote(report, MembershipOperation::RemoveUserFromGroup, group_id)
                })?;
        }
        Ok(count(user_ids))
    }

    async fn add_groups(
        &self,
        group_id: &GroupId,
        member_group_ids: &BTreeSet<GroupId>,
    ) -> Result<u32, ReconcileError> {
        for member_group_id in member_group_ids {
            debug!(%member_group_id, "adding group");
            self.client
                .add_group_to_group(group_id, member_group_id)
                .await
                .map_err(|report| remote(report, MembershipOperation::AddGroupToGroup, group_id))?;
        }
        Ok(count(member_group_ids))
    }

    async fn remove_groups(
        &self,
        group_id: &GroupId,
        member_group_ids: &BTreeSet<GroupId>,
    ) -> Result<u32, ReconcileError> {
        for member_group_id in member_group_ids {
            debug!(%member_group_id, "removing group");
            self.client
                .remove_group_from_group(group_id, member_group_id)
                .await
                .map_err(|report| {
                    remote(report, MembershipOperation::RemoveGroupFromGroup, group_id)
                })?;
        }
        Ok(count(member_group_ids))
    }
}

fn ensure_same_identity(current: &GroupId, requested: &GroupId) -> Result<(), ReconcileError> {
    if current != requested {
        return Err(ReconcileError::IdentityChanged {
            current: current.clone(),
            requested: requested.clone(),
        }
        .into());
    }
    Ok(())
}

fn remote(
    report: Report<DirectoryError>,
    operation: MembershipOperation,
    group_id: &GroupId,
) -> Report<ReconcileError> {
    report.context(ReconcileError::RemoteOperation {
        operation,
        group_id: group_id.clone(),
    })
}

fn count<T>(ids: &BTreeSet<T>) -> u32 {
    u32::try_from(ids.len()).unwrap_or(u32::MAX)
}
