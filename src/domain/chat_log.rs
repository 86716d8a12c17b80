use std::collections::HashSet;

use super::events::ChatEvent;

/// Turns a raw batch into the records that should land in the display list.
/// Content events pass through, deletions become a redacted copy of the event
/// they point at, everything else is ignored.
pub fn reconcile(incoming: &[ChatEvent]) -> Vec<ChatEvent> {
    let (content, deletions): (Vec<&ChatEvent>, Vec<&ChatEvent>) = incoming
        .iter()
        .filter(|event| event.eventtype.is_content() || event.eventtype.is_deletion())
        .partition(|event| event.eventtype.is_content());

    let redactions = deletions.into_iter().filter_map(|deletion| match &deletion.replyto {
        Some(target) => Some(target.redacted()),
        None => {
            log::debug!("Dropping {:?} event {} without a target", deletion.eventtype, deletion.id);
            None
        }
    });

    content.into_iter().cloned().chain(redactions).collect()
}

/// Drops reaction-only entries that carry no text.
pub fn drop_reaction_placeholders(batch: Vec<ChatEvent>) -> Vec<ChatEvent> {
    batch
        .into_iter()
        .filter(|event| !event.is_reaction_placeholder())
        .collect()
}

/// Merges a batch into the display list, newest first, one entry per id.
/// Returns false, leaving `display` untouched, when the batch has nothing to
/// apply. Applying the same batch again yields the same list.
pub fn merge_into(display: &mut Vec<ChatEvent>, incoming: &[ChatEvent]) -> bool {
    let updates = reconcile(incoming);
    if updates.is_empty() {
        return false;
    }

    for update in updates {
        match display.iter_mut().find(|existing| existing.id == update.id) {
            Some(existing) => *existing = update,
            None => display.insert(0, update),
        }
    }

    display.sort_by(|a, b| b.ts.cmp(&a.ts));
    let mut seen: HashSet<String> = HashSet::with_capacity(display.len());
    display.retain(|event| seen.insert(event.id.clone()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EventType, REDACTED_BODY};

    fn speech(id: &str, ts: i64, body: &str) -> ChatEvent {
        ChatEvent::new(id, EventType::Speech, ts).with_body(body)
    }

    fn ids(events: &[ChatEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    fn assert_descending(events: &[ChatEvent]) {
        for pair in events.windows(2) {
            assert!(pair[0].ts >= pair[1].ts, "{} before {}", pair[0].id, pair[1].id);
        }
    }

    #[test]
    fn new_events_are_ordered_newest_first() {
        let mut display = vec![speech("1", 100, "hi")];
        assert!(merge_into(&mut display, &[speech("2", 200, "yo")]));
        assert_eq!(ids(&display), vec!["2", "1"]);

        assert!(merge_into(&mut display, &[speech("0", 50, "early"), speech("3", 150, "mid")]));
        assert_eq!(ids(&display), vec!["2", "3", "1", "0"]);
        assert_descending(&display);
    }

    #[test]
    fn same_batch_twice_is_idempotent() {
        let mut once = vec![speech("1", 100, "hi"), speech("0", 10, "first")];
        let batch = vec![
            speech("2", 200, "yo"),
            speech("1", 100, "hi (edited)"),
            ChatEvent::new("rm", EventType::Remove, 300).with_replyto(speech("0", 10, "first")),
        ];
        merge_into(&mut once, &batch);
        let mut twice = once.clone();
        merge_into(&mut twice, &batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn incoming_version_replaces_existing_id() {
        let mut display = vec![speech("X", 100, "old"), speech("Y", 90, "other")];
        merge_into(&mut display, &[speech("X", 100, "new")]);
        let matching: Vec<&ChatEvent> = display.iter().filter(|e| e.id == "X").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].body.as_deref(), Some("new"));
    }

    #[test]
    fn duplicates_inside_a_batch_collapse() {
        let mut display = vec![];
        merge_into(&mut display, &[speech("A", 5, "one"), speech("A", 5, "two")]);
        assert_eq!(display.len(), 1);
        assert_eq!(display[0].body.as_deref(), Some("two"));
    }

    #[test]
    fn removal_synthesizes_redaction() {
        let mut display = vec![speech("42", 100, "hello")];
        let removal =
            ChatEvent::new("rm-1", EventType::Remove, 500).with_replyto(speech("42", 100, "hello"));
        assert!(merge_into(&mut display, &[removal]));
        assert_eq!(display.len(), 1);
        assert_eq!(display[0].id, "42");
        assert_eq!(display[0].body.as_deref(), Some(REDACTED_BODY));
        assert_eq!(display[0].originalbody.as_deref(), Some("hello"));
    }

    #[test]
    fn removal_of_unseen_event_still_produces_redaction() {
        let mut display = vec![speech("1", 100, "hi")];
        let replace =
            ChatEvent::new("rp", EventType::Replace, 500).with_replyto(speech("42", 150, "hello"));
        merge_into(&mut display, &[replace]);
        assert_eq!(ids(&display), vec!["42", "1"]);
        assert_eq!(display[0].originalbody.as_deref(), Some("hello"));
    }

    #[test]
    fn deletion_without_target_and_other_types_are_ignored() {
        let mut display = vec![speech("1", 100, "hi")];
        let batch = vec![
            ChatEvent::new("rm", EventType::Remove, 200),
            ChatEvent::new("an", EventType::Announcement, 300).with_body("welcome"),
            ChatEvent::new("cu", EventType::Custom, 400).with_body("{}"),
        ];
        assert!(!merge_into(&mut display, &batch));
        assert_eq!(ids(&display), vec!["1"]);
        assert!(!merge_into(&mut display, &[]));
    }

    #[test]
    fn placeholders_are_filtered() {
        let batch = vec![
            ChatEvent::new("r", EventType::Reaction, 1),
            speech("s", 2, "text"),
        ];
        assert_eq!(ids(&drop_reaction_placeholders(batch)), vec!["s"]);
    }
}
