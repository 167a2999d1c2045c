//! Keyed message rows with scroll and draft state that survive redraws

use crate::models::containers::ContainerKind;
use crate::models::messages::{Message, SharedPost};
use crate::models::read_markers::GroupReadPolicy;
use crate::models::{MessageId, UserId};
use crate::sync::log::MessageLog;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::Serialize;

pub const DEFAULT_LINE_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: Option<String>,
    pub shared_post: Option<SharedPost>,
    pub created_at: DateTime<Utc>,
    pub is_own: bool,
    /// Only ever set on the viewer's own messages
    pub seen: bool,
    pub height: usize,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub height: usize,
}

/// The compose box. Reconciliation never touches it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DraftInput {
    value: String,
    /// In characters, not bytes
    caret: usize,
    focused: bool,
}

impl DraftInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    fn byte_offset(&self, caret: usize) -> usize {
        self.value
            .char_indices()
            .nth(caret)
            .map(|(offset, _)| offset)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, text: &str) {
        let offset = self.byte_offset(self.caret);
        self.value.insert_str(offset, text);
        self.caret += text.chars().count();
    }

    /// Deletes the character before the caret
    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        let offset = self.byte_offset(self.caret - 1);
        self.value.remove(offset);
        self.caret -= 1;
    }

    pub fn move_caret(&mut self, caret: usize) {
        self.caret = caret.min(self.value.chars().count());
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_owned();
        self.caret = self.value.chars().count();
    }

    /// Empties the draft and returns its text, unless it is blank.
    /// Focus is kept so the viewer can keep typing.
    pub fn take(&mut self) -> Option<String> {
        if self.value.trim().is_empty() {
            return None;
        }
        self.caret = 0;
        Some(std::mem::take(&mut self.value))
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.caret = 0;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScrollAction {
    Unchanged,
    PinnedToBottom,
    /// The previous offset, clamped to the new content height
    Restored { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPatch {
    pub inserted: Vec<MessageId>,
    pub updated: Vec<MessageId>,
    pub removed: Vec<MessageId>,
    pub scroll: ScrollAction,
}

impl ViewPatch {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
pub struct MessageListView {
    rows: Vec<RowView>,
    viewport: Viewport,
    draft: DraftInput,
    line_width: usize,
    read_policy: GroupReadPolicy,
    members: Vec<UserId>,
}

impl MessageListView {
    pub fn new(viewport_height: usize, line_width: usize, read_policy: GroupReadPolicy) -> Self {
        Self {
            rows: vec![],
            viewport: Viewport {
                offset: 0,
                height: viewport_height,
            },
            draft: DraftInput::default(),
            line_width: line_width.max(1),
            read_policy,
            members: vec![],
        }
    }

    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn draft(&self) -> &DraftInput {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftInput {
        &mut self.draft
    }

    /// Group members whose receipts count under [`GroupReadPolicy::AllMembers`]
    pub fn set_members(&mut self, members: Vec<UserId>) {
        self.members = members;
    }

    /// Forgets every row, the draft and the scroll position
    pub fn reset(&mut self) {
        self.rows.clear();
        self.members.clear();
        self.draft = DraftInput::default();
        self.viewport.offset = 0;
    }

    pub fn content_height(&self) -> usize {
        self.rows.iter().map(|row| row.height).sum()
    }

    fn max_offset(&self) -> usize {
        self.content_height().saturating_sub(self.viewport.height)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.viewport.offset >= self.max_offset()
    }

    pub fn scroll_to(&mut self, offset: usize) {
        self.viewport.offset = offset.min(self.max_offset());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.viewport.offset = self.max_offset();
    }

    pub fn resize(&mut self, height: usize) {
        self.viewport.height = height;
        self.viewport.offset = self.viewport.offset.min(self.max_offset());
    }

    fn row_height(&self, message: &Message) -> usize {
        let chars = message
            .content
            .as_deref()
            .map(|text| text.chars().count())
            .unwrap_or(0);
        1 + chars / self.line_width + usize::from(message.shared_post.is_some())
    }

    fn render(&self, message: &Message, viewer_id: UserId) -> RowView {
        let is_own = message.sender_id == viewer_id;
        let policy = match message.container.kind {
            ContainerKind::Group => self.read_policy,
            ContainerKind::Direct | ContainerKind::Community => GroupReadPolicy::AnyMember,
        };
        RowView {
            message_id: message.message_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            text: message.content.clone(),
            shared_post: message.shared_post.clone(),
            created_at: message.created_at,
            is_own,
            seen: is_own && message.read.is_seen(message.sender_id, policy, &self.members),
            height: self.row_height(message),
        }
    }

    /// Brings the rows in line with `log`, touching only what changed
    pub fn reconcile(&mut self, log: &MessageLog, viewer_id: UserId) -> ViewPatch {
        let was_at_bottom = self.is_at_bottom();
        let previous_offset = self.viewport.offset;

        let mut previous: HashMap<MessageId, RowView> = self
            .rows
            .drain(..)
            .map(|row| (row.message_id, row))
            .collect();
        let mut inserted = vec![];
        let mut updated = vec![];
        let mut rows = Vec::with_capacity(log.len());
        for message in log.iter() {
            let row = self.render(message, viewer_id);
            match previous.remove(&row.message_id) {
                None => inserted.push(row.message_id),
                Some(old) if old != row => updated.push(row.message_id),
                Some(_) => {}
            }
            rows.push(row);
        }
        let mut removed: Vec<MessageId> = previous.into_keys().collect();
        removed.sort_unstable();
        self.rows = rows;

        let scroll = if !inserted.is_empty() && was_at_bottom {
            self.scroll_to_bottom();
            ScrollAction::PinnedToBottom
        } else {
            self.scroll_to(previous_offset);
            match self.viewport.offset == previous_offset {
                true => ScrollAction::Unchanged,
                false => ScrollAction::Restored {
                    offset: self.viewport.offset,
                },
            }
        };
        ViewPatch {
            inserted,
            updated,
            removed,
            scroll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::containers::ContainerRef;
    use crate::models::read_markers::ReadMarker;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn message(message_id: MessageId, sender_id: UserId) -> Message {
        Message {
            message_id,
            container: ContainerRef::group(1),
            sender_id,
            sender_name: format!("user{sender_id}"),
            content: Some("hi".to_owned()),
            shared_post: None,
            created_at: Utc.timestamp_opt(1_700_000_000 + message_id as i64, 0).unwrap(),
            read: ReadMarker::no_receipts(),
        }
    }

    fn log_of(count: u64) -> MessageLog {
        let mut log = MessageLog::new();
        log.replace_all((1..=count).map(|id| message(id, 2)).collect());
        log
    }

    #[test]
    fn new_content_pins_a_bottomed_view() {
        let mut view = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        let patch = view.reconcile(&log_of(10), 1);
        assert_eq!(patch.inserted.len(), 10);
        assert_eq!(patch.scroll, ScrollAction::PinnedToBottom);
        assert_eq!(view.viewport().offset, 5);

        let patch = view.reconcile(&log_of(12), 1);
        assert_eq!(patch.inserted, vec![11, 12]);
        assert_eq!(patch.scroll, ScrollAction::PinnedToBottom);
        assert!(view.is_at_bottom());
        assert_eq!(view.viewport().offset, 7);
    }

    #[test]
    fn scrolled_up_view_keeps_its_offset() {
        let mut view = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        view.reconcile(&log_of(10), 1);
        view.scroll_to(2);

        let patch = view.reconcile(&log_of(15), 1);
        assert_eq!(patch.inserted.len(), 5);
        assert_eq!(patch.scroll, ScrollAction::Unchanged);
        assert_eq!(view.viewport().offset, 2);
    }

    #[test]
    fn unchanged_rows_produce_an_empty_patch() {
        let mut view = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        let log = log_of(3);
        view.reconcile(&log, 1);
        let patch = view.reconcile(&log, 1);
        assert!(patch.is_empty());
        assert_eq!(patch.scroll, ScrollAction::Unchanged);
    }

    #[test]
    fn shrinking_content_clamps_the_offset() {
        let mut view = MessageListView::new(2, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        view.reconcile(&log_of(10), 1);
        view.scroll_to(6);
        let patch = view.reconcile(&log_of(4), 1);
        assert_eq!(patch.removed, vec![5, 6, 7, 8, 9, 10]);
        assert_eq!(patch.scroll, ScrollAction::Restored { offset: 2 });
    }

    #[test]
    fn draft_survives_reconciliation() {
        let mut view = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        view.draft_mut().focus();
        view.draft_mut().insert("see you at the");
        view.draft_mut().move_caret(4);
        view.reconcile(&log_of(3), 1);
        assert_eq!(view.draft().value(), "see you at the");
        assert_eq!(view.draft().caret(), 4);
        assert!(view.draft().is_focused());
    }

    #[test]
    fn draft_editing_is_char_aware() {
        let mut draft = DraftInput::default();
        draft.insert("café");
        draft.backspace();
        draft.insert("e!");
        assert_eq!(draft.value(), "cafe!");
        draft.move_caret(100);
        assert_eq!(draft.caret(), 5);
        assert_eq!(draft.take().as_deref(), Some("cafe!"));
        assert_eq!(draft.value(), "");

        draft.set("   ");
        assert_eq!(draft.take(), None);
    }

    #[test]
    fn long_text_and_shared_posts_add_height() {
        let view = MessageListView::new(5, 10, GroupReadPolicy::AnyMember);
        let mut long = message(1, 2);
        long.content = Some("x".repeat(25));
        assert_eq!(view.row_height(&long), 3);
        long.shared_post = Some(SharedPost {
            post_id: 4,
            author_name: "ana".to_owned(),
            caption: None,
        });
        assert_eq!(view.row_height(&long), 4);
    }

    #[test]
    fn seen_follows_the_group_policy() {
        let mut own = message(1, 1);
        own.read = ReadMarker::Receipts {
            read_by: BTreeSet::from([2]),
        };
        let mut log = MessageLog::new();
        log.merge(own);

        let mut any = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AnyMember);
        any.reconcile(&log, 1);
        assert!(any.rows()[0].seen);

        let mut all = MessageListView::new(5, DEFAULT_LINE_WIDTH, GroupReadPolicy::AllMembers);
        all.set_members(vec![1, 2, 3]);
        all.reconcile(&log, 1);
        assert!(!all.rows()[0].seen);
    }
}
