//! Subcommand implementations.
//!
//! Commands are written against any [`MembershipClient`] so they run the same
//! way over HTTP and over an in-memory directory.

use crate::error::CliError;
use crate::state_store::{StateStore, StoredState};
use chrono::Utc;
use membersync_core::{GroupId, Result, UserId};
use membersync_directory::MembershipClient;
use membersync_reconcile::{
    Applied, DesiredState, MembershipPlan, MembershipReconciler, MembershipRecord, Protection,
    ReconcilerOptions,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Reads a desired-state JSON document.
pub fn read_desired(path: &Path) -> Result<DesiredState, CliError> {
    let file_error = |details: String| CliError::DesiredStateFile {
        path: path.display().to_string(),
        details,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    let desired = serde_json::from_str(&contents).map_err(|e| file_error(e.to_string()))?;
    Ok(desired)
}

/// Parses a group id argument.
pub fn parse_group_id(value: &str) -> Result<GroupId, CliError> {
    let group_id = value.parse().map_err(|e| CliError::InvalidArgument {
        details: format!("{e}"),
    })?;
    Ok(group_id)
}

/// Parses user id arguments.
pub fn parse_user_ids(values: &[String]) -> Result<BTreeSet<UserId>, CliError> {
    let mut user_ids = BTreeSet::new();
    for value in values {
        let user_id = value.parse().map_err(|e| CliError::InvalidArgument {
            details: format!("{e}"),
        })?;
        user_ids.insert(user_id);
    }
    Ok(user_ids)
}

/// Runs commands against a directory and an applied-state store.
pub struct Commands<C> {
    reconciler: MembershipReconciler<C>,
    store: StateStore,
}

impl<C: MembershipClient> Commands<C> {
    /// Creates the command runner.
    pub fn new(client: C, options: ReconcilerOptions, store: StateStore) -> Self {
        Self {
            reconciler: MembershipReconciler::with_options(client, options),
            store,
        }
    }

    /// Returns the applied-state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Previews what `apply` would do.
    #[instrument(skip_all, fields(group_id = %desired.target_group_id))]
    pub async fn plan(&self, desired: &DesiredState) -> Result<MembershipPlan, CliError> {
        let group_id = &desired.target_group_id;
        let prior = self
            .store
            .load(group_id)
            .map_err(|report| report.context(command_failed("plan", group_id)))?;

        let plan = self
            .reconciler
            .plan(desired, prior.as_ref().map(|state| &state.record))
            .await
            .map_err(|report| report.context(command_failed("plan", group_id)))?;
        Ok(plan)
    }

    /// Creates the group's membership, or updates it if it was applied before.
    #[instrument(skip_all, fields(group_id = %desired.target_group_id))]
    pub async fn apply(&self, desired: &DesiredState) -> Result<Applied, CliError> {
        let group_id = &desired.target_group_id;
        let prior = self
            .store
            .load(group_id)
            .map_err(|report| report.context(command_failed("apply", group_id)))?;

        let result = match &prior {
            None => self.reconciler.create(desired).await,
            Some(state) => self.reconciler.update(state.group_id(), desired).await,
        };
        let applied = result.map_err(|report| report.context(command_failed("apply", group_id)))?;

        self.persist("apply", &applied)?;
        info!(
            phase = %applied.phase,
            changed = applied.summary.has_changes(),
            "applied desired state"
        );
        Ok(applied)
    }

    /// Reads a group's membership, refreshing its applied state if managed.
    #[instrument(skip_all, fields(group_id = %group_id))]
    pub async fn read(&self, group_id: &GroupId) -> Result<MembershipRecord, CliError> {
        let prior = self
            .store
            .load(group_id)
            .map_err(|report| report.context(command_failed("read", group_id)))?;
        let protection = prior
            .as_ref()
            .map(|state| state.record.protection())
            .unwrap_or_default();

        let applied = self
            .reconciler
            .read(group_id, &protection)
            .await
            .map_err(|report| report.context(command_failed("read", group_id)))?;

        if prior.is_some() {
            self.persist("read", &applied)?;
        }
        Ok(applied.record)
    }

    /// Brings a group under management by id.
    #[instrument(skip_all, fields(group_id = %group_id))]
    pub async fn import(&self, group_id: &GroupId) -> Result<MembershipRecord, CliError> {
        let prior = self
            .store
            .load(group_id)
            .map_err(|report| report.context(command_failed("import", group_id)))?;
        if prior.is_some() {
            warn!("group already managed; replacing applied state");
        }

        let applied = self
            .reconciler
            .read(group_id, &Protection::default())
            .await
            .map_err(|report| report.context(command_failed("import", group_id)))?;

        self.persist("import", &applied)?;
        info!(
            users = applied.record.user_ids.len(),
            groups = applied.record.group_ids.len(),
            "group imported"
        );
        Ok(applied.record)
    }

    /// Removes every unprotected member and forgets the group.
    ///
    /// With no `protect_users`, the protection from the applied state is used.
    #[instrument(skip_all, fields(group_id = %group_id))]
    pub async fn delete(
        &self,
        group_id: &GroupId,
        protect_users: BTreeSet<UserId>,
    ) -> Result<Applied, CliError> {
        let prior = self
            .store
            .load(group_id)
            .map_err(|report| report.context(command_failed("delete", group_id)))?;

        let mut protection = prior
            .as_ref()
            .map(|state| state.record.protection())
            .unwrap_or_default();
        if !protect_users.is_empty() {
            protection.user_ids = protect_users;
        }

        let applied = self
            .reconciler
            .delete(group_id, &protection)
            .await
            .map_err(|report| report.context(command_failed("delete", group_id)))?;

        self.store
            .remove(group_id)
            .map_err(|report| report.context(command_failed("delete", group_id)))?;
        info!(
            users_removed = applied.summary.users_removed,
            groups_removed = applied.summary.groups_removed,
            "group released"
        );
        Ok(applied)
    }

    fn persist(&self, command: &'static str, applied: &Applied) -> Result<(), CliError> {
        let state = StoredState::from_applied(applied, Utc::now());
        self.store
            .save(&state)
            .map_err(|report| report.context(command_failed(command, state.group_id())))?;
        Ok(())
    }
}

fn command_failed(command: &'static str, group_id: &GroupId) -> CliError {
    CliError::Command {
        command,
        group_id: group_id.to_string(),
    }
}
