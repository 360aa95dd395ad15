// Conversation Timeline
//
// Ordered, append-only sequence of finalized message records. The sequence
// order is the only order ever rendered; nothing re-sorts by timestamp.

use crate::models::assistant::MessageRecord;

/// Ordered sequence of finalized message records for one conversation
#[derive(Debug, Default)]
pub struct Timeline {
    records: Vec<MessageRecord>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a finalized record, returning a reference to it
    pub fn push(&mut self, record: MessageRecord) -> &MessageRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// All records in append order
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&MessageRecord> {
        self.records.last()
    }

    /// Roll back the most recent record if it matches `id`
    ///
    /// Only the optimistic user record of a rejected send is ever retracted;
    /// inbound event processing never shrinks the timeline.
    pub fn retract(&mut self, id: &str) -> Option<MessageRecord> {
        if self.records.last().map(|record| record.id == id) == Some(true) {
            self.records.pop()
        } else {
            None
        }
    }

    /// Drop every record (the explicit "start new conversation" action)
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
