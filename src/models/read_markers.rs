use crate::models::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Records whether, and by whom, a message has been seen.
///
/// Both variants only ever grow: a reader once recorded is never removed,
/// and a direct message read timestamp is never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadMarker {
    /// Direct messages: the time the recipient first read it
    Timestamp { read_at: Option<DateTime<Utc>> },
    /// Group and community messages: everyone who has read it
    Receipts { read_by: BTreeSet<UserId> },
}

impl ReadMarker {
    pub const fn unread() -> Self {
        ReadMarker::Timestamp { read_at: None }
    }

    pub const fn no_receipts() -> Self {
        ReadMarker::Receipts {
            read_by: BTreeSet::new(),
        }
    }

    pub fn is_read_by(&self, viewer_id: UserId) -> bool {
        match self {
            ReadMarker::Timestamp { read_at } => read_at.is_some(),
            ReadMarker::Receipts { read_by } => read_by.contains(&viewer_id),
        }
    }

    /// Records `viewer_id` as a reader. Returns whether anything changed.
    pub fn record(&mut self, viewer_id: UserId, at: DateTime<Utc>) -> bool {
        match self {
            ReadMarker::Timestamp { read_at } => match read_at {
                Some(_) => false,
                None => {
                    *read_at = Some(at);
                    true
                }
            },
            ReadMarker::Receipts { read_by } => read_by.insert(viewer_id),
        }
    }

    /// Folds `other` into `self` without ever dropping read state.
    /// Markers of different shapes are left untouched.
    pub fn merge(&mut self, other: &ReadMarker) -> bool {
        match (self, other) {
            (ReadMarker::Timestamp { read_at }, ReadMarker::Timestamp { read_at: theirs }) => {
                let merged = match (*read_at, *theirs) {
                    (Some(ours), Some(theirs)) => Some(ours.min(theirs)),
                    (ours, theirs) => ours.or(theirs),
                };
                let changed = merged != *read_at;
                *read_at = merged;
                changed
            }
            (ReadMarker::Receipts { read_by }, ReadMarker::Receipts { read_by: theirs }) => {
                let before = read_by.len();
                read_by.extend(theirs.iter().copied());
                read_by.len() != before
            }
            _ => false,
        }
    }

    /// Whether a message sent by `sender_id` counts as seen under `policy`.
    /// `members` is only consulted for [`GroupReadPolicy::AllMembers`].
    pub fn is_seen(&self, sender_id: UserId, policy: GroupReadPolicy, members: &[UserId]) -> bool {
        match self {
            ReadMarker::Timestamp { read_at } => read_at.is_some(),
            ReadMarker::Receipts { read_by } => match policy {
                GroupReadPolicy::AnyMember => read_by.iter().any(|id| *id != sender_id),
                GroupReadPolicy::AllMembers => {
                    let mut others = members.iter().filter(|id| **id != sender_id).peekable();
                    others.peek().is_some() && others.all(|id| read_by.contains(id))
                }
            },
        }
    }
}

/// When a group message shows as "seen" to its sender
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum GroupReadPolicy {
    #[default]
    AnyMember,
    AllMembers,
}

impl GroupReadPolicy {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "any" => Some(GroupReadPolicy::AnyMember),
            "all" => Some(GroupReadPolicy::AllMembers),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn timestamp_is_written_once() {
        let mut marker = ReadMarker::unread();
        assert!(marker.record(2, at(10)));
        assert!(!marker.record(2, at(20)));
        assert_eq!(marker, ReadMarker::Timestamp { read_at: Some(at(10)) });
    }

    #[test]
    fn merging_never_unreads() {
        let mut marker = ReadMarker::Timestamp { read_at: Some(at(5)) };
        assert!(!marker.merge(&ReadMarker::unread()));
        assert!(marker.is_read_by(1));

        assert!(marker.merge(&ReadMarker::Timestamp { read_at: Some(at(1)) }));
        assert_eq!(marker, ReadMarker::Timestamp { read_at: Some(at(1)) });

        let mut receipts = ReadMarker::Receipts {
            read_by: BTreeSet::from([1, 2]),
        };
        assert!(!receipts.merge(&ReadMarker::no_receipts()));
        assert!(receipts.merge(&ReadMarker::Receipts {
            read_by: BTreeSet::from([3]),
        }));
        assert_eq!(
            receipts,
            ReadMarker::Receipts {
                read_by: BTreeSet::from([1, 2, 3]),
            }
        );
    }

    #[test]
    fn mismatched_shapes_do_not_merge() {
        let mut marker = ReadMarker::no_receipts();
        assert!(!marker.merge(&ReadMarker::Timestamp { read_at: Some(at(1)) }));
        assert_eq!(marker, ReadMarker::no_receipts());
    }

    #[test]
    fn group_policies() {
        let marker = ReadMarker::Receipts {
            read_by: BTreeSet::from([2]),
        };
        let members = [1, 2, 3];
        assert!(marker.is_seen(1, GroupReadPolicy::AnyMember, &members));
        assert!(!marker.is_seen(1, GroupReadPolicy::AllMembers, &members));

        let everyone = ReadMarker::Receipts {
            read_by: BTreeSet::from([2, 3]),
        };
        assert!(everyone.is_seen(1, GroupReadPolicy::AllMembers, &members));

        // the sender's own receipt never counts
        let own = ReadMarker::Receipts {
            read_by: BTreeSet::from([1]),
        };
        assert!(!own.is_seen(1, GroupReadPolicy::AnyMember, &members));
        assert!(!own.is_seen(1, GroupReadPolicy::AllMembers, &[1]));
    }

    #[test]
    fn policy_keys() {
        assert_eq!(GroupReadPolicy::from_key("ALL"), Some(GroupReadPolicy::AllMembers));
        assert_eq!(GroupReadPolicy::from_key("any"), Some(GroupReadPolicy::AnyMember));
        assert_eq!(GroupReadPolicy::from_key("most"), None);
    }
}
