//! Membership reconciliation for directory groups.
//!
//! A [`MembershipReconciler`] drives one group's membership toward a
//! [`DesiredState`] through any [`membersync_directory::MembershipClient`]:
//!
//! - [`diff`]: pure set arithmetic and the [`SyncStrategy`] call patterns
//! - [`projector`]: listings, records and pre-mutation validation
//! - [`reconciler`]: the create/read/update/delete cycles and planning

pub mod diff;
pub mod error;
pub mod projector;
pub mod reconciler;
pub mod state;

pub use diff::{SetDiff, SyncStrategy};
pub use error::ReconcileError;
pub use projector::StateProjector;
pub use reconciler::{MembershipPlan, MembershipReconciler, PlanAction, ReconcilerOptions};
pub use state::{
    Applied, ChangeSummary, DesiredState, MembershipRecord, ObservedState, Phase, Protection,
};
