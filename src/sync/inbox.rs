use crate::models::containers::ContainerRef;
use crate::models::inbox::InboxEntry;
use crate::models::messages::Message;
use crate::models::UserId;
use hashbrown::HashMap;

/// The viewer's conversation list, kept current from live messages
#[derive(Debug)]
pub struct Inbox {
    viewer_id: UserId,
    entries: HashMap<ContainerRef, InboxEntry>,
}

impl Inbox {
    pub fn new(viewer_id: UserId) -> Self {
        Self {
            viewer_id,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, container: ContainerRef) -> Option<&InboxEntry> {
        self.entries.get(&container)
    }

    pub fn replace_all(&mut self, entries: Vec<InboxEntry>) {
        self.entries = entries
            .into_iter()
            .map(|entry| (entry.container, entry))
            .collect();
    }

    /// Applies a newly inserted message. Returns false for containers the
    /// viewer is not in and for messages already applied.
    pub fn record_message(&mut self, message: &Message) -> bool {
        let Some(entry) = self.entries.get_mut(&message.container) else {
            return false;
        };
        // ids grow with insertion, so anything at or below the last one is old
        if entry.last_message_id.is_some_and(|last| last >= message.message_id) {
            return false;
        }
        entry.last_message_id = Some(message.message_id);
        entry.last_activity = entry.last_activity.max(message.created_at);
        if !message.is_read_by(self.viewer_id) {
            entry.unread_count += 1;
        }
        true
    }

    pub fn mark_read(&mut self, container: ContainerRef) {
        if let Some(entry) = self.entries.get_mut(&container) {
            entry.unread_count = 0;
        }
    }

    pub fn total_unread(&self) -> usize {
        self.entries.values().map(|entry| entry.unread_count).sum()
    }

    /// Most recently active first
    pub fn ordered(&self) -> Vec<&InboxEntry> {
        let mut entries: Vec<&InboxEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| b.container.cmp(&a.container))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use crate::models::read_markers::ReadMarker;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn entry(container: ContainerRef, secs: i64) -> InboxEntry {
        InboxEntry {
            container,
            title: container.to_string(),
            last_message_id: None,
            last_activity: at(secs),
            unread_count: 0,
        }
    }

    fn message(message_id: MessageId, container: ContainerRef, sender_id: UserId, secs: i64) -> Message {
        Message {
            message_id,
            container,
            sender_id,
            sender_name: format!("user{sender_id}"),
            content: Some("hey".to_owned()),
            shared_post: None,
            created_at: at(secs),
            read: ReadMarker::no_receipts(),
        }
    }

    #[test]
    fn live_messages_reorder_and_count() {
        let direct = ContainerRef::direct(1);
        let group = ContainerRef::group(2);
        let mut inbox = Inbox::new(10);
        inbox.replace_all(vec![entry(direct, 50), entry(group, 10)]);
        assert_eq!(inbox.ordered()[0].container, direct);

        assert!(inbox.record_message(&message(7, group, 11, 60)));
        assert!(!inbox.record_message(&message(7, group, 11, 60)));
        assert!(inbox.record_message(&message(8, group, 10, 61)));

        let ordered = inbox.ordered();
        assert_eq!(ordered[0].container, group);
        assert_eq!(ordered[0].unread_count, 1);
        assert_eq!(ordered[0].last_message_id, Some(8));

        inbox.mark_read(group);
        assert_eq!(inbox.total_unread(), 0);
    }

    #[test]
    fn unknown_containers_and_stale_messages_are_ignored() {
        let direct = ContainerRef::direct(1);
        let mut inbox = Inbox::new(10);
        let mut known = entry(direct, 10);
        known.last_message_id = Some(20);
        inbox.replace_all(vec![known]);

        assert!(!inbox.record_message(&message(5, ContainerRef::community(3), 11, 20)));
        assert!(!inbox.record_message(&message(19, direct, 11, 20)));
        assert_eq!(inbox.get(direct).unwrap().unread_count, 0);
    }
}
