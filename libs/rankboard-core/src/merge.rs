//! Coordination-free reconciliation of local and remote copies.
//!
//! The only policy shipped is [`LocalWins`]: when both sides hold a copy the
//! local one is kept and `updated_at` is never consulted. Edits made on
//! another device while this one held a local copy are therefore discarded.

use std::collections::BTreeMap;

use crate::types::{Board, Card, Friendship, Report, Snapshot, UserProfile};

/// Anything reconciled by id.
pub trait Identified {
    fn entity_id(&self) -> &str;
}

macro_rules! identified_by_id {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn entity_id(&self) -> &str {
                &self.id
            }
        })*
    };
}

identified_by_id!(Board, Card, Snapshot, Friendship, Report, UserProfile);

/// Strategy for choosing between a local and a remote copy.
pub trait MergePolicy<T>: Send + Sync {
    fn merge(&self, local: Option<T>, remote: Option<T>) -> Option<T>;
}

/// The device holding a local copy always keeps it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWins;

impl<T> MergePolicy<T> for LocalWins {
    fn merge(&self, local: Option<T>, remote: Option<T>) -> Option<T> {
        match (local, remote) {
            (Some(local), _) => Some(local),
            (None, remote) => remote,
        }
    }
}

/// Merge one entity with the default policy.
pub fn merge_entity<T>(local: Option<T>, remote: Option<T>) -> Option<T> {
    LocalWins.merge(local, remote)
}

/// Merge two collections, producing one entity per id in their union.
///
/// Output is ordered by id; callers needing display order must re-sort.
pub fn merge_list<T: Identified>(local: Vec<T>, remote: Vec<T>) -> Vec<T> {
    merge_list_with(&LocalWins, local, remote)
}

/// [`merge_list`] with an explicit policy.
pub fn merge_list_with<T, P>(policy: &P, local: Vec<T>, remote: Vec<T>) -> Vec<T>
where
    T: Identified,
    P: MergePolicy<T> + ?Sized,
{
    let mut pairs: BTreeMap<String, (Option<T>, Option<T>)> = BTreeMap::new();
    for item in local {
        let id = item.entity_id().to_string();
        pairs.entry(id).or_default().0 = Some(item);
    }
    for item in remote {
        let id = item.entity_id().to_string();
        pairs.entry(id).or_default().1 = Some(item);
    }

    pairs
        .into_values()
        .filter_map(|(l, r)| policy.merge(l, r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn board(id: &str, name: &str) -> Board {
        let mut b = Board::new(name);
        b.id = id.to_string();
        b
    }

    #[test]
    fn test_merge_entity_one_side_absent() {
        let local = board("1", "local");
        let remote = board("1", "remote");
        assert_eq!(merge_entity(Some(local.clone()), None), Some(local));
        assert_eq!(merge_entity(None, Some(remote.clone())), Some(remote));
        assert_eq!(merge_entity::<Board>(None, None), None);
    }

    #[test]
    fn test_merge_entity_ignores_timestamps() {
        let local = board("1", "local");
        let mut remote = board("1", "remote");
        remote.updated_at = local.updated_at + Duration::days(30);
        let merged = merge_entity(Some(local.clone()), Some(remote)).unwrap();
        assert_eq!(merged.name, "local");

        let mut fresher_local = board("1", "local");
        fresher_local.updated_at = Utc::now() - Duration::days(30);
        let merged = merge_entity(Some(fresher_local), Some(board("1", "remote"))).unwrap();
        assert_eq!(merged.name, "local");
    }

    #[test]
    fn test_merge_list_union() {
        let local = vec![board("1", "l1"), board("2", "l2")];
        let remote = vec![board("2", "r2"), board("3", "r3")];
        let merged = merge_list(local, remote);
        let names: Vec<(&str, &str)> = merged
            .iter()
            .map(|b| (b.id.as_str(), b.name.as_str()))
            .collect();
        assert_eq!(names, vec![("1", "l1"), ("2", "l2"), ("3", "r3")]);
    }

    #[test]
    fn test_merge_list_empty_sides() {
        assert!(merge_list::<Board>(Vec::new(), Vec::new()).is_empty());
        assert_eq!(merge_list(Vec::new(), vec![board("9", "r")]).len(), 1);
    }

    #[test]
    fn test_merge_list_keeps_local_card_fields() {
        let mut local = Card::new("b1", "Local name");
        local.rank = 1;
        let mut remote = local.clone();
        remote.name = "Remote name".to_string();
        remote.rank = 3;
        let only_remote = Card::new("b1", "Other");

        let merged = merge_list(vec![local.clone()], vec![remote, only_remote.clone()]);
        assert_eq!(merged.len(), 2);
        let shared = merged.iter().find(|c| c.id == local.id).unwrap();
        assert_eq!((shared.name.as_str(), shared.rank), ("Local name", 1));
        assert!(merged.iter().any(|c| c.id == only_remote.id));
    }

    struct RemoteWins;

    impl<T> MergePolicy<T> for RemoteWins {
        fn merge(&self, local: Option<T>, remote: Option<T>) -> Option<T> {
            remote.or(local)
        }
    }

    #[test]
    fn test_policy_is_swappable() {
        let merged = merge_list_with(&RemoteWins, vec![board("1", "l")], vec![board("1", "r")]);
        assert_eq!(merged[0].name, "r");
    }
}
