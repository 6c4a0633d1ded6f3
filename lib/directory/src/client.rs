//! The membership capability the reconciler is written against.

use crate::error::DirectoryError;
use crate::types::User;
use async_trait::async_trait;
use membersync_core::{GroupId, Result, UserId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Membership operations on a remote directory.
///
/// Listings are complete and deduplicated. An implementation that cannot
/// return every member must fail with [`DirectoryError::ListingTruncated`]
/// rather than hand back a partial set. Removals are not idempotent: callers
/// must only remove members that a listing has just reported.
#[async_trait]
pub trait MembershipClient: Send + Sync {
    /// Lists the user members of a group.
    async fn list_group_users(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<UserId>, DirectoryError>;

    /// Lists the group members of a group.
    async fn list_group_groups(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<GroupId>, DirectoryError>;

    /// Fetches a user by id.
    ///
    /// # Errors
    ///
    /// Fails with [`DirectoryError::NotFound`] if the user does not exist.
    async fn get_user(&self, user_id: &UserId) -> Result<User, DirectoryError>;

    /// Adds a user to a group.
    async fn add_user_to_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError>;

    /// Adds a group to a group.
    async fn add_group_to_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError>;

    /// Removes a user from a group.
    async fn remove_user_from_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError>;

    /// Removes a group from a group.
    async fn remove_group_from_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<T: MembershipClient + ?Sized> MembershipClient for Arc<T> {
    async fn list_group_users(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<UserId>, DirectoryError> {
        (**self).list_group_users(group_id).await
    }

    async fn list_group_groups(
        &self,
        group_id: &GroupId,
    ) -> Result<BTreeSet<GroupId>, DirectoryError> {
        (**self).list_group_groups(group_id).await
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, DirectoryError> {
        (**self).get_user(user_id).await
    }

    async fn add_user_to_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        (**self).add_user_to_group(group_id, user_id).await
    }

    async fn add_group_to_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        (**self).add_group_to_group(group_id, member_group_id).await
    }

    async fn remove_user_from_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), DirectoryError> {
        (**self).remove_user_from_group(group_id, user_id).await
    }

    async fn remove_group_from_group(
        &self,
        group_id: &GroupId,
        member_group_id: &GroupId,
    ) -> Result<(), DirectoryError> {
        (**self).remove_group_from_group(group_id, member_group_id).await
    }
}
