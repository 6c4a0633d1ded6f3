//! In-memory directory.
//!
//! Holds users and membership edges in process memory and records every
//! call made against it. Used by the reconciler tests and for dry runs
//! against a snapshot of a group.

use crate::client::MembershipClient;
use crate::error::DirectoryError;
use crate::types::{Member, MemberKind, MembershipEdge, MembershipOperation, User};
use async_trait::async_trait;
use membersync_core::{GroupId, Result, UserId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call issued against an [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirectoryCall {
    /// `list_group_users(group)`.
    ListGroupUsers(GroupId),
    /// `list_group_groups(group)`.
    ListGroupGroups(GroupId),
    /// `get_user(user)`.
    GetUser(UserId),
    /// `add_user_to_group(group, user)`.
    AddUser(GroupId, UserId),
    /// `add_group_to_group(group, member)`.
    AddGroup(GroupId, GroupId),
    /// `remove_user_from_group(group, user)`.
    RemoveUser(GroupId, UserId),
    /// `remove_group_from_group(group, member)`.
    RemoveGroup(GroupId, GroupId),
}

impl DirectoryCall {
    /// Returns the operation this call performs.
    #[must_use]
    pub fn operation(&self) -> MembershipOperation {
        match self {
            Self::ListGroupUsers(_) => MembershipOperation::ListGroupUsers,
            Self::ListGroupGroups(_) => MembershipOperation::ListGroupGroups,
            Self::GetUser(_) => MembershipOperation::GetUser,
            Self::AddUser(..) => MembershipOperation::AddUserToGroup,
            Self::AddGroup(..) => MembershipOperation::AddGroupToGroup,
            Self::RemoveUser(..) => MembershipOperation::RemoveUserFromGroup,
            Self::RemoveGroup(..) => MembershipOperation::RemoveGroupFromGroup,
        }
    }

    /// Returns true if the call changes membership.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.operation().is_mutation()
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<UserId, User>,
    edges: BTreeSet<MembershipEdge>,
    calls: Vec<DirectoryCall>,
    failures: HashSet<DirectoryCall>,
}

impl DirectoryState {
    fn members(&self, group_id: &GroupId) -> impl Iterator<Item = &Member> {
        self.edges
            .iter()
            .filter(move |edge| &edge.group_id == group_id)
            .map(|edge| &edge.member)
    }
}

/// An in-memory [`MembershipClient`].
///
/// Clones share state, so a test can hand one clone to the reconciler and
/// inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers users so that `get_user` finds them.
    #[must_use]
    pub fn with_users<I, S>(self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut state = self.state();
            for id in user_ids {
                if let Ok(user_id) = UserId::new(id.as_ref()) {
                    state.users.insert(user_id.clone(), User::new(user_id));
                }
            }
        }
        self
    }

    /// Seeds a membership edge without recording a call.
    #[must_use]
    pub fn with_edge(self, edge: MembershipEdge) -> Self {
        self.state().edges.insert(edge);
        self
    }

    /// Makes every future occurrence of `call` fail with a request error.
    pub fn fail_on(&self, call: DirectoryCall) {
        self.state().failures.insert(call);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state().calls.clone()
    }

    /// Returns only the calls that changed membership.
    #[must_use]
    pub fn mutations(&self) -> Vec<DirectoryCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Returns the user members of a group without recording a call.
    #[must_use]
    pub fn user_members(&self, group_id: &GroupId) -> BTreeSet<UserId> {
        self.state()
            .members(group_id)
            .filter_map(|member| match member {
                Member::User(id) => Some(id.clone()),
                Member::Group(_) => None,
            })
            .collect()
    }

    /// Returns the group members of a group without recording a call.
    #[must_use]
    pub fn group_members(&self, group_id: &GroupId) -> BTreeSet<GroupId> {
        self.state()
            .members(group_id)
            .filter_map(|member| match member {
                Member::Group(id) => Some(id.clone()),
                Member::User(_) => None,
            })
            .collect()
    }

    /// Records the call and returns the locked state, or the injected failure.
    fn begin(&self, call: DirectoryCall) -> Result<MutexGuard<'_, DirectoryState>, DirectoryError> {
        let mut state = self.state();
        state.calls.push(call.clone());
        if state.failures.contains(&call) {
            return Err(DirectoryError::RequestFailed {
                operation: call.operation(),
                details: "injected failure".to_string(),
            }
            .into());
        }
        Ok(state)
    }

    fn remove_edge(
        state: &mut DirectoryState,
        operation: MembershipOperation,
        edge: &MembershipEdge,
    ) -> Result<(), DirectoryError> {
        if state.edges.remove(edge) {
            Ok(())
        } else {
            Err(DirectoryError::RequestFailed {
                operation,
                details: format!("{} is not a member of group {}", edge.member, edge.group_id),
            }
            .into())
        }
    }
}

#[async_trait]
impl MembershipClient for InMemoryDirectory {
    async fn list_group_users(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<UserId>, DirectoryError> {
        drop(self.begin(DirectoryCall::ListGroupUsers(group_id.clone()))?);
        Ok(self.user_members(group_id))
    }

    async fn list_group_groups(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<GroupId>, DirectoryError> {
        drop(self.begin(DirectoryCall::ListGroupGroups(group_id.clone()))?);
        Ok(self.group_members(group_id))
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, DirectoryError> {
        let state = self.begin(DirectoryCall::GetUser(user_id.clone()))?;
        state.users.get(user_id).cloned().ok_or_else(|| {
            DirectoryError::NotFound {
                kind: MemberKind::User,
                id: user_id.to_string(),
            }
            .into()
        })
    }

    async fn add_user_to_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.begin(DirectoryCall::AddUser(group_id.clone(), user_id.clone()))?;
        state
            .edges
            .insert(MembershipEdge::user(group_id.clone(), user_id.clone()));
        Ok(())
    }

    async fn add_group_to_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.begin(DirectoryCall::AddGroup(
            group_id.clone(),
            member_group_id.clone(),
        ))?;
        state
            .edges
            .insert(MembershipEdge::group(group_id.clone(), member_group_id.clone()));
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.begin(DirectoryCall::RemoveUser(
            group_id.clone(),
            user_id.clone(),
        ))?;
        let edge = MembershipEdge::user(group_id.clone(), user_id.clone());
        Self::remove_edge(&mut state, MembershipOperation::RemoveUserFromGroup, &edge)
    }

    async fn remove_group_from_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.begin(DirectoryCall::RemoveGroup(
            group_id.clone(),
            member_group_id.clone(),
        ))?;
        let edge = MembershipEdge::group(group_id.clone(), member_group_id.clone());
        Self::remove_edge(&mut state, MembershipOperation::RemoveGroupFromGroup, &edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid(s: &str) -> GroupId {
        GroupId::new(s).unwrap()
    }

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn lists_reflect_seeded_edges() {
        let directory = InMemoryDirectory::new()
            .with_edge(MembershipEdge::user(gid("g"), uid("u1")))
            .with_edge(MembershipEdge::group(gid("g"), gid("child")))
            .with_edge(MembershipEdge::user(gid("other"), uid("u2")));

        let users = directory.list_group_users(&gid("g")).await.unwrap();
        let groups = directory.list_group_groups(&gid("g")).await.unwrap();

        assert_eq!(users, BTreeSet::from([uid("u1")]));
        assert_eq!(groups, BTreeSet::from([gid("child")]));
        assert_eq!(
            directory.calls(),
            vec![
                DirectoryCall::ListGroupUsers(gid("g")),
                DirectoryCall::ListGroupGroups(gid("g")),
            ]
        );
    }

    #[tokio::test]
    async fn get_user_reports_missing() {
        let directory = InMemoryDirectory::new().with_users(["u1"]);

        assert!(directory.get_user(&uid("u1")).await.is_ok());

        let err = directory.get_user(&uid("ghost")).await.unwrap_err();
        assert!(err.current_context().is_not_found());
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let directory = InMemoryDirectory::new();
        directory.add_user_to_group(&gid("g"), &uid("u1")).await.unwrap();
        directory.add_user_to_group(&gid("g"), &uid("u1")).await.unwrap();

        assert_eq!(directory.user_members(&gid("g")).len(), 1);
        assert_eq!(directory.mutations().len(), 2);
    }

    #[tokio::test]
    async fn removing_non_member_fails() {
        let directory = InMemoryDirectory::new();
        let err = directory
            .remove_user_from_group(&gid("g"), &uid("u1"))
            .await
            .unwrap_err();

        match err.current_context() {
            DirectoryError::RequestFailed { operation, .. } => {
                assert_eq!(*operation, MembershipOperation::RemoveUserFromGroup);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_leaves_state() {
        let directory = InMemoryDirectory::new();
        let call = DirectoryCall::AddGroup(gid("g"), gid("child"));
        directory.fail_on(call.clone());

        assert!(directory.add_group_to_group(&gid("g"), &gid("child")).await.is_err());
        assert!(directory.group_members(&gid("g")).is_empty());
        assert_eq!(directory.calls(), vec![call]);

        directory.clear_failures();
        directory.add_group_to_group(&gid("g"), &gid("child")).await.unwrap();
        assert_eq!(directory.group_members(&gid("g")).len(), 1);
    }
}
