//! Applied-state persistence.
//!
//! One JSON document per managed group under the state directory. A group
//! has applied state from the first successful `apply` or `import` until it
//! is deleted.

use chrono::{DateTime, Utc};
use membersync_core::{GroupId, Result};
use membersync_reconcile::{Applied, MembershipRecord, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateStoreError {
    /// Reading or writing a state document failed.
    Io { path: String, details: String },
    /// A state document exists but cannot be parsed.
    Corrupt { path: String, details: String },
}

impl fmt::Display for StateStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, details } => write!(f, "state file '{path}': {details}"),
            Self::Corrupt { path, details } => {
                write!(f, "state file '{path}' is corrupt: {details}")
            }
        }
    }
}

impl std::error::Error for StateStoreError {}

/// The last applied state of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    /// Membership observed after the last operation.
    pub record: MembershipRecord,
    /// Phase reached by the last operation.
    pub phase: Phase,
    /// When the last operation finished.
    pub applied_at: DateTime<Utc>,
}

impl StoredState {
    /// Captures the outcome of an operation.
    #[must_use]
    pub fn from_applied(applied: &Applied, applied_at: DateTime<Utc>) -> Self {
        Self {
            record: applied.record.clone(),
            phase: applied.phase,
            applied_at,
        }
    }

    /// Returns the managed group.
    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        self.record.id()
    }
}

/// File-backed applied state.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the document path for a group.
    ///
    /// Group ids are opaque, so they are percent-encoded with dots escaped
    /// to keep the name a single path component.
    pub fn path_for(&self, group_id: &GroupId) -> PathBuf {
        let name = urlencoding::encode(group_id.as_str()).replace('.', "%2E");
        self.dir.join(format!("{name}.json"))
    }

    /// Loads the applied state of a group, if any.
    pub fn load(&self, group_id: &GroupId) -> Result<Option<StoredState>, StateStoreError> {
        let path = self.path_for(group_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, &e).into()),
        };

        let state = serde_json::from_str(&contents).map_err(|e| StateStoreError::Corrupt {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Ok(Some(state))
    }

    /// Writes the applied state of a group, replacing any previous document.
    pub fn save(&self, state: &StoredState) -> Result<PathBuf, StateStoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, &e))?;

        let path = self.path_for(state.group_id());
        let json = serde_json::to_string_pretty(state).map_err(|e| StateStoreError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| io_error(&staging, &e))?;
        fs::rename(&staging, &path).map_err(|e| io_error(&path, &e))?;

        debug!(path = %path.display(), phase = %state.phase, "saved applied state");
        Ok(path)
    }

    /// Removes the applied state of a group. Returns whether a document existed.
    pub fn remove(&self, group_id: &GroupId) -> Result<bool, StateStoreError> {
        let path = self.path_for(group_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, &e).into()),
        }
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> StateStoreError {
    StateStoreError::Io {
        path: path.display().to_string(),
        details: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membersync_core::UserId;
    use membersync_reconcile::{ChangeSummary, ObservedState, Protection};
    use std::collections::BTreeSet;

    fn gid(s: &str) -> GroupId {
        GroupId::new(s).unwrap()
    }

    fn stored(group: &str) -> StoredState {
        let observed = ObservedState {
            user_ids: BTreeSet::from([UserId::new("u1").unwrap()]),
            group_ids: BTreeSet::new(),
        };
        let applied = Applied {
            phase: Phase::Created,
            record: MembershipRecord::from_observed(gid(group), observed, Protection::default()),
            summary: ChangeSummary::default(),
        };
        StoredState::from_applied(&applied, Utc::now())
    }

    #[test]
    fn missing_state_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));

        assert_eq!(store.load(&gid("7")).unwrap(), None);
        assert!(!store.remove(&gid("7")).unwrap());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state"));
        let state = stored("7");

        let path = store.save(&state).unwrap();

        assert_eq!(path, dir.path().join("state").join("7.json"));
        assert_eq!(store.load(&gid("7")).unwrap(), Some(state));
        assert!(store.remove(&gid("7")).unwrap());
        assert_eq!(store.load(&gid("7")).unwrap(), None);
    }

    #[test]
    fn group_ids_stay_inside_state_dir() {
        let store = StateStore::new("/state");

        assert_eq!(
            store.path_for(&gid("../etc/passwd")),
            PathBuf::from("/state/%2E%2E%2Fetc%2Fpasswd.json")
        );
        assert_eq!(
            store.path_for(&gid("team_a-1")),
            PathBuf::from("/state/team_a-1.json")
        );
        assert_eq!(
            store.path_for(&gid("ops team/ü")),
            PathBuf::from("/state/ops%20team%2F%C3%BC.json")
        );
        assert_eq!(store.path_for(&gid("..")), PathBuf::from("/state/%2E%2E.json"));
    }

    #[test]
    fn corrupt_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        fs::write(store.path_for(&gid("7")), "{not json").unwrap();

        let err = store.load(&gid("7")).unwrap_err();

        assert!(matches!(
            err.current_context(),
            StateStoreError::Corrupt { .. }
        ));
    }
}
