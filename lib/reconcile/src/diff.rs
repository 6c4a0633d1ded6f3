//! Set arithmetic between desired and observed membership.
//!
//! Everything here is pure: no directory access, no shared state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ids to add and ids to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetDiff<T: Ord> {
    /// Ids to add.
    pub to_add: BTreeSet<T>,
    /// Ids to remove.
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord> SetDiff<T> {
    /// A diff with nothing to do.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
        }
    }

    /// Returns true if there is nothing to add or remove.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl<T: Ord> Default for SetDiff<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Returns `left − right`.
#[must_use]
pub fn difference<T: Ord + Clone>(left: &BTreeSet<T>, right: &BTreeSet<T>) -> BTreeSet<T> {
    left.difference(right).cloned().collect()
}

/// Computes the basic add/remove sets.
///
/// `to_add` is `desired − actual`; `to_remove` is `actual − protected`, so
/// every observed member that is not protected is a removal candidate
/// regardless of whether it is desired.
#[must_use]
pub fn diff<T: Ord + Clone>(
    desired: &BTreeSet<T>,
    actual: &BTreeSet<T>,
    protected: &BTreeSet<T>,
) -> SetDiff<T> {
    SetDiff {
        to_add: difference(desired, actual),
        to_remove: difference(actual, protected),
    }
}

/// Returns true if the two memberships are not the same set.
#[must_use]
pub fn memberships_differ<T: Ord>(desired: &BTreeSet<T>, actual: &BTreeSet<T>) -> bool {
    desired != actual
}

/// How membership is converged onto the desired set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Remove every unprotected member, then add every desired member.
    #[default]
    FullSweep,
    /// Remove only undesired unprotected members and add only missing ones.
    Delta,
}

impl SyncStrategy {
    /// Computes the calls this strategy issues to move `actual` to `desired`.
    ///
    /// Both strategies reach the same final membership: the desired set plus
    /// whatever protected members were already present.
    #[must_use]
    pub fn changes<T: Ord + Clone>(
        self,
        desired: &BTreeSet<T>,
        actual: &BTreeSet<T>,
        protected: &BTreeSet<T>,
    ) -> SetDiff<T> {
        let base = diff(desired, actual, protected);
        match self {
            Self::FullSweep => SetDiff {
                to_add: desired.clone(),
                to_remove: base.to_remove,
            },
            Self::Delta => SetDiff {
                to_add: base.to_add,
                to_remove: difference(&base.to_remove, desired),
            },
        }
    }

    /// Returns the strategy name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullSweep => "full_sweep",
            Self::Delta => "delta",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_adds_missing_and_removes_unprotected() {
        let result = diff(&set(&["u1", "u2"]), &set(&["u1", "u3"]), &set(&["u3"]));
        assert_eq!(result.to_add, set(&["u2"]));
        assert_eq!(result.to_remove, set(&["u1"]));
    }

    #[test]
    fn diff_removal_ignores_desired() {
        let result = diff(&set(&["a", "b"]), &set(&["a", "b"]), &set(&[]));
        assert!(result.to_add.is_empty());
        assert_eq!(result.to_remove, set(&["a", "b"]));
    }

    #[test]
    fn protected_member_absent_from_desired_is_kept() {
        let result = SyncStrategy::Delta.changes(&set(&["a"]), &set(&["p"]), &set(&["p"]));
        assert!(result.to_remove.is_empty());
        assert_eq!(result.to_add, set(&["a"]));
    }

    #[test]
    fn full_sweep_matches_scenario() {
        let result =
            SyncStrategy::FullSweep.changes(&set(&["u1", "u2"]), &set(&["u1", "u3"]), &set(&["u3"]));
        assert_eq!(result.to_remove, set(&["u1"]));
        assert_eq!(result.to_add, set(&["u1", "u2"]));
    }

    #[test]
    fn delta_issues_minimal_calls() {
        let result =
            SyncStrategy::Delta.changes(&set(&["u1", "u2"]), &set(&["u1", "u3", "u4"]), &set(&["u3"]));
        assert_eq!(result.to_remove, set(&["u4"]));
        assert_eq!(result.to_add, set(&["u2"]));
    }

    #[test]
    fn delta_on_converged_state_is_empty() {
        let members = set(&["a", "b"]);
        assert!(SyncStrategy::Delta.changes(&members, &members, &set(&[])).is_empty());
        assert!(!SyncStrategy::FullSweep.changes(&members, &members, &set(&[])).is_empty());
    }

    #[test]
    fn strategies_converge_to_same_membership() {
        let desired = set(&["a", "b", "c"]);
        let actual = set(&["b", "x", "p"]);
        let protected = set(&["p", "q"]);

        let apply = |changes: SetDiff<String>| {
            let mut members = difference(&actual, &changes.to_remove);
            members.extend(changes.to_add);
            members
        };

        let swept = apply(SyncStrategy::FullSweep.changes(&desired, &actual, &protected));
        let delta = apply(SyncStrategy::Delta.changes(&desired, &actual, &protected));
        assert_eq!(swept, delta);
        assert_eq!(swept, set(&["a", "b", "c", "p"]));
    }

    #[test]
    fn equality_is_order_independent() {
        let left: BTreeSet<String> = ["g2", "g1"].iter().map(|s| s.to_string()).collect();
        let right: BTreeSet<String> = ["g1", "g2"].iter().map(|s| s.to_string()).collect();
        assert!(!memberships_differ(&left, &right));
        assert!(memberships_differ(&left, &set(&["g1"])));
    }

    #[test]
    fn strategy_serde_names() {
        let strategy: SyncStrategy = serde_json::from_str("\"delta\"").expect("deserialize");
        assert_eq!(strategy, SyncStrategy::Delta);
        assert_eq!(SyncStrategy::default().as_str(), "full_sweep");
    }
}
