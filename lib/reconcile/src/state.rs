//! Desired and observed membership state.

use membersync_core::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Members that must never be removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection {
    /// Users excluded from every removal.
    #[serde(default)]
    pub user_ids: BTreeSet<UserId>,
    /// Nested groups excluded from every removal.
    ///
    /// Empty unless group protection is configured, in which case group
    /// removals are swept the same way as user removals.
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
}

impl Protection {
    /// Protects the given users only.
    #[must_use]
    pub fn users(user_ids: BTreeSet<UserId>) -> Self {
        Self {
            user_ids,
            group_ids: BTreeSet::new(),
        }
    }
}

/// Membership declared for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    /// The group being reconciled. Immutable once created.
    pub target_group_id: GroupId,
    /// Users that should be members.
    #[serde(default)]
    pub user_ids: BTreeSet<UserId>,
    /// Users that are never removed, whether or not they are desired.
    #[serde(default)]
    pub delete_protected_user_ids: BTreeSet<UserId>,
    /// Groups that should be members.
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
    /// Groups that are never removed.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub delete_protected_group_ids: BTreeSet<GroupId>,
}

impl DesiredState {
    /// Creates an empty desired state for a group.
    #[must_use]
    pub fn new(target_group_id: GroupId) -> Self {
        Self {
            target_group_id,
            user_ids: BTreeSet::new(),
            delete_protected_user_ids: BTreeSet::new(),
            group_ids: BTreeSet::new(),
            delete_protected_group_ids: BTreeSet::new(),
        }
    }

    /// Sets the desired users.
    #[must_use]
    pub fn with_users(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.user_ids = user_ids.into_iter().collect();
        self
    }

    /// Sets the desired groups.
    #[must_use]
    pub fn with_groups(mut self, group_ids: impl IntoIterator<Item = GroupId>) -> Self {
        self.group_ids = group_ids.into_iter().collect();
        self
    }

    /// Sets the protected users.
    #[must_use]
    pub fn with_protected_users(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.delete_protected_user_ids = user_ids.into_iter().collect();
        self
    }

    /// Sets the protected groups.
    #[must_use]
    pub fn with_protected_groups(mut self, group_ids: impl IntoIterator<Item = GroupId>) -> Self {
        self.delete_protected_group_ids = group_ids.into_iter().collect();
        self
    }

    /// Returns the removal protection carried by this state.
    #[must_use]
    pub fn protection(&self) -> Protection {
        Protection {
            user_ids: self.delete_protected_user_ids.clone(),
            group_ids: self.delete_protected_group_ids.clone(),
        }
    }
}

/// Membership as just listed from the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedState {
    /// Current user members.
    pub user_ids: BTreeSet<UserId>,
    /// Current group members.
    pub group_ids: BTreeSet<GroupId>,
}

/// The externally visible representation of a reconciled group.
///
/// Member sets come from the directory; the protected sets are passed
/// through from the caller and never derived from observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Identity of the reconciled group.
    pub target_group_id: GroupId,
    /// Observed user members.
    #[serde(default)]
    pub user_ids: BTreeSet<UserId>,
    /// Protected users, as supplied.
    #[serde(default)]
    pub delete_protected_user_ids: BTreeSet<UserId>,
    /// Observed group members.
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
    /// Protected groups, as supplied.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub delete_protected_group_ids: BTreeSet<GroupId>,
}

impl MembershipRecord {
    /// Builds a record from an observation plus pass-through protection.
    #[must_use]
    pub fn from_observed(
        target_group_id: GroupId,
        observed: ObservedState,
        protection: Protection,
    ) -> Self {
        Self {
            target_group_id,
            user_ids: observed.user_ids,
            delete_protected_user_ids: protection.user_ids,
            group_ids: observed.group_ids,
            delete_protected_group_ids: protection.group_ids,
        }
    }

    /// Returns the record's identity.
    #[must_use]
    pub fn id(&self) -> &GroupId {
        &self.target_group_id
    }

    /// Returns the protection carried by this record.
    #[must_use]
    pub fn protection(&self) -> Protection {
        Protection {
            user_ids: self.delete_protected_user_ids.clone(),
            group_ids: self.delete_protected_group_ids.clone(),
        }
    }
}

/// Lifecycle phase reached by a reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Members were added to a newly managed group.
    Created,
    /// Membership was read without changes.
    Read,
    /// Membership was reconciled against a new desired state.
    Updated,
    /// Unprotected members were removed; the group is no longer managed.
    Deleted,
}

impl Phase {
    /// Returns the phase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Read => "read",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counts of membership calls issued by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Users added (including re-adds of existing members).
    pub users_added: u32,
    /// Users removed.
    pub users_removed: u32,
    /// Groups added.
    pub groups_added: u32,
    /// Groups removed.
    pub groups_removed: u32,
}

impl ChangeSummary {
    /// Returns whether any membership call was issued.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.users_added > 0
            || self.users_removed > 0
            || self.groups_added > 0
            || self.groups_removed > 0
    }
}

/// Outcome of a mutating reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Phase the group reached.
    pub phase: Phase,
    /// Membership observed after the call.
    pub record: MembershipRecord,
    /// Calls issued.
    pub summary: ChangeSummary,
}
