//! Local, ordered view of a channel.

use std::collections::HashSet;

use identity_store::{Message, MessageId, Snapshot};

/// Messages of one channel, deduplicated by id and ordered by `sent_at`.
///
/// Snapshots may arrive late, twice, or out of order; merging is a union,
/// so the rendered list only ever grows and never repeats a message.
#[derive(Debug, Default)]
pub struct MessageLog {
    seen: HashSet<MessageId>,
    ordered: Vec<Message>,
    last_sequence: Option<u64>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a snapshot. Returns how many messages were new.
    pub fn merge(&mut self, snapshot: Snapshot<Message>) -> usize {
        let mut added = 0;
        for message in snapshot.items {
            if self.seen.insert(message.id.clone()) {
                self.ordered.push(message);
                added += 1;
            }
        }
        if added > 0 {
            self.ordered
                .sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
        }
        self.last_sequence = Some(
            self.last_sequence
                .map_or(snapshot.sequence, |seq| seq.max(snapshot.sequence)),
        );
        added
    }

    pub fn messages(&self) -> &[Message] {
        &self.ordered
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Highest snapshot sequence merged so far.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }
}
