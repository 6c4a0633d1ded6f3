//! Directory records and membership vocabulary.

use membersync_core::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity a membership edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// A user account.
    User,
    /// A nested group.
    Group,
}

impl MemberKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A member of a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Member {
    /// A user member.
    User(UserId),
    /// A group member.
    Group(GroupId),
}

impl Member {
    /// Returns the kind of this member.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        match self {
            Self::User(_) => MemberKind::User,
            Self::Group(_) => MemberKind::Group,
        }
    }

    /// Returns the raw member id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Group(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// A directed membership relation: `member` belongs to `group_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipEdge {
    /// The parent group.
    pub group_id: GroupId,
    /// The member.
    pub member: Member,
}

impl MembershipEdge {
    /// Creates a user membership edge.
    #[must_use]
    pub fn user(group_id: GroupId, user_id: UserId) -> Self {
        Self {
            group_id,
            member: Member::User(user_id),
        }
    }

    /// Creates a nested group membership edge.
    #[must_use]
    pub fn group(group_id: GroupId, member_group_id: GroupId) -> Self {
        Self {
            group_id,
            member: Member::Group(member_group_id),
        }
    }
}

impl fmt::Display for MembershipEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}#member@{}", self.group_id, self.member)
    }
}

/// A user record as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user id.
    pub id: UserId,
    /// Primary email address, if the directory exposes one.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name, if the directory exposes one.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl User {
    /// Creates a user record with only an id.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            display_name: None,
        }
    }
}

/// A group record as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// The group id.
    pub id: GroupId,
    /// Group name, if present.
    #[serde(default)]
    pub name: Option<String>,
}

/// The remote calls a membership client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipOperation {
    /// List the user members of a group.
    ListGroupUsers,
    /// List the group members of a group.
    ListGroupGroups,
    /// Fetch a user by id.
    GetUser,
    /// Add a user to a group.
    AddUserToGroup,
    /// Add a group to a group.
    AddGroupToGroup,
    /// Remove a user from a group.
    RemoveUserFromGroup,
    /// Remove a group from a group.
    RemoveGroupFromGroup,
}

impl MembershipOperation {
    /// Returns the operation name used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListGroupUsers => "list_group_users",
            Self::ListGroupGroups => "list_group_groups",
            Self::GetUser => "get_user",
            Self::AddUserToGroup => "add_user_to_group",
            Self::AddGroupToGroup => "add_group_to_group",
            Self::RemoveUserFromGroup => "remove_user_from_group",
            Self::RemoveGroupFromGroup => "remove_group_from_group",
        }
    }

    /// Returns true if the operation changes remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddUserToGroup
                | Self::AddGroupToGroup
                | Self::RemoveUserFromGroup
                | Self::RemoveGroupFromGroup
        )
    }
}

impl fmt::Display for MembershipOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
