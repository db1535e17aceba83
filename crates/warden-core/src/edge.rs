//! Edge-set update policy shared by every pivot relation
//! (role → permission, package → permission, user → package).
//!
//! A request carries an [`EdgeUpdate`], which keeps apart "the caller left
//! the field out", "the caller sent an empty list" and "the caller sent
//! ids". [`EdgeUpdate::into_change`] is the only place that turns it into
//! the [`EdgeChange`] a repository applies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tri-state edge field of an update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<Uuid>>", into = "Option<Vec<Uuid>>")]
pub enum EdgeUpdate {
    /// The field was not sent.
    #[default]
    Omitted,
    /// The field was sent as an empty list.
    Cleared,
    /// The field was sent with at least one id.
    Replace(BTreeSet<Uuid>),
}

impl EdgeUpdate {
    /// Builds an update from the ids a caller sent; an empty iterator is
    /// [`EdgeUpdate::Cleared`], never [`EdgeUpdate::Omitted`].
    pub fn from_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        let ids: BTreeSet<Uuid> = ids.into_iter().collect();
        if ids.is_empty() {
            EdgeUpdate::Cleared
        } else {
            EdgeUpdate::Replace(ids)
        }
    }

    /// Ids that must exist before the update may be applied.
    pub fn requested_ids(&self) -> impl Iterator<Item = &Uuid> {
        match self {
            EdgeUpdate::Replace(ids) => Some(ids.iter()),
            EdgeUpdate::Omitted | EdgeUpdate::Cleared => None,
        }
        .into_iter()
        .flatten()
    }

    /// Absence and emptiness both detach every edge; ids sync to exactly
    /// that set.
    pub fn into_change(self) -> EdgeChange {
        match self {
            EdgeUpdate::Omitted | EdgeUpdate::Cleared => EdgeChange::Detach,
            EdgeUpdate::Replace(ids) => EdgeChange::Sync(ids),
        }
    }
}

impl From<Option<Vec<Uuid>>> for EdgeUpdate {
    fn from(value: Option<Vec<Uuid>>) -> Self {
        match value {
            None => EdgeUpdate::Omitted,
            Some(ids) => EdgeUpdate::from_ids(ids),
        }
    }
}

impl From<EdgeUpdate> for Option<Vec<Uuid>> {
    fn from(value: EdgeUpdate) -> Self {
        match value {
            EdgeUpdate::Omitted => None,
            EdgeUpdate::Cleared => Some(Vec::new()),
            EdgeUpdate::Replace(ids) => Some(ids.into_iter().collect()),
        }
    }
}

/// What a repository does to one relation of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeChange {
    /// Remove every edge of the relation.
    Detach,
    /// Add missing edges and remove the ones not in the set.
    Sync(BTreeSet<Uuid>),
}

impl EdgeChange {
    /// The edge set that exists once the change is applied.
    pub fn target(&self) -> BTreeSet<Uuid> {
        match self {
            EdgeChange::Detach => BTreeSet::new(),
            EdgeChange::Sync(ids) => ids.clone(),
        }
    }
}
