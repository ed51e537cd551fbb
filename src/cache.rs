use leptos::prelude::*;
use std::collections::HashMap;

use crate::models::QuestionRecord;
use crate::reference::ReferenceSet;

/// State of one cached reference lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
    /// A fetch is in flight; renders as a loading placeholder.
    Pending,
    Ready(T),
    /// The backend could not resolve the id. Never retried.
    Failed,
}

impl<T> Resolution<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Resolution::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Session-wide lookup cache for embedded references.
///
/// Entries are only ever added or upgraded, never evicted. A `Ready` entry is
/// not downgraded by a later failure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolutionCache {
    questions: HashMap<String, Resolution<QuestionRecord>>,
    notes: HashMap<String, Resolution<String>>,
}

impl ResolutionCache {
    pub fn question(&self, id: &str) -> Option<&Resolution<QuestionRecord>> {
        self.questions.get(id)
    }

    pub fn note(&self, id: &str) -> Option<&Resolution<String>> {
        self.notes.get(id)
    }

    /// Ids of `wanted` that have no entry of any kind yet.
    pub fn missing(&self, wanted: &ReferenceSet) -> ReferenceSet {
        ReferenceSet {
            questions: wanted
                .questions
                .iter()
                .filter(|id| !self.questions.contains_key(*id))
                .cloned()
                .collect(),
            notes: wanted
                .notes
                .iter()
                .filter(|id| !self.notes.contains_key(*id))
                .cloned()
                .collect(),
        }
    }

    /// Marks every missing id of `wanted` as pending and returns those ids.
    pub fn claim(&mut self, wanted: &ReferenceSet) -> ReferenceSet {
        let claimed = self.missing(wanted);
        for id in &claimed.questions {
            self.questions.insert(id.clone(), Resolution::Pending);
        }
        for id in &claimed.notes {
            self.notes.insert(id.clone(), Resolution::Pending);
        }
        claimed
    }

    /// Stores `record` under the id it was requested by, which may differ
    /// in case or whitespace from the id the backend echoes back.
    pub fn store_question(&mut self, id: String, record: QuestionRecord) {
        self.questions.insert(id, Resolution::Ready(record));
    }

    pub fn store_note(&mut self, id: String, name: String) {
        self.notes.insert(id, Resolution::Ready(name));
    }

    pub fn fail_question(&mut self, id: &str) {
        fail_entry(&mut self.questions, id);
    }

    pub fn fail_note(&mut self, id: &str) {
        fail_entry(&mut self.notes, id);
    }
}

fn fail_entry<T>(entries: &mut HashMap<String, Resolution<T>>, id: &str) {
    match entries.get(id) {
        Some(Resolution::Ready(_)) => {}
        _ => {
            entries.insert(id.to_string(), Resolution::Failed);
        }
    }
}

/// Shared handle to the session cache.
///
/// Every `modify` is a change notification: the UI owns the cache as a signal,
/// so each write re-runs the render of the open note.
pub trait CacheCell {
    fn inspect<R>(&self, f: impl FnOnce(&ResolutionCache) -> R) -> R;
    fn modify(&self, f: impl FnOnce(&mut ResolutionCache));
}

impl CacheCell for RwSignal<ResolutionCache> {
    fn inspect<R>(&self, f: impl FnOnce(&ResolutionCache) -> R) -> R {
        self.with_untracked(f)
    }

    fn modify(&self, f: impl FnOnce(&mut ResolutionCache)) {
        self.update(f);
    }
}

impl CacheCell for std::cell::RefCell<ResolutionCache> {
    fn inspect<R>(&self, f: impl FnOnce(&ResolutionCache) -> R) -> R {
        f(&self.borrow())
    }

    fn modify(&self, f: impl FnOnce(&mut ResolutionCache)) {
        f(&mut self.borrow_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    fn wanted(refs: &[Reference]) -> ReferenceSet {
        let mut set = ReferenceSet::default();
        for reference in refs {
            set.insert(reference.clone());
        }
        set
    }

    #[test]
    fn claim_marks_only_missing_ids_pending() {
        let mut cache = ResolutionCache::default();
        cache.store_note("N1".into(), "Optics".into());

        let claimed = cache.claim(&wanted(&[
            Reference::note("N1"),
            Reference::note("N2"),
            Reference::question("Q1"),
        ]));

        assert_eq!(claimed.notes.iter().collect::<Vec<_>>(), vec!["N2"]);
        assert_eq!(claimed.questions.iter().collect::<Vec<_>>(), vec!["Q1"]);
        assert_eq!(cache.note("N2"), Some(&Resolution::Pending));

        let again = cache.claim(&wanted(&[Reference::note("N2"), Reference::question("Q1")]));
        assert!(again.is_empty());
    }

    #[test]
    fn failure_never_downgrades_a_ready_entry() {
        let mut cache = ResolutionCache::default();
        cache.store_question(
            "Q1".into(),
            QuestionRecord {
                id: "Q1".into(),
                ..Default::default()
            },
        );
        cache.fail_question("Q1");
        cache.fail_question("Q2");

        assert!(cache.question("Q1").and_then(Resolution::ready).is_some());
        assert_eq!(cache.question("Q2"), Some(&Resolution::Failed));
    }

    #[test]
    fn ready_replaces_pending_and_failed() {
        let mut cache = ResolutionCache::default();
        cache.claim(&wanted(&[Reference::note("N1")]));
        cache.fail_note("N2");

        cache.store_note("N1".into(), "Waves".into());
        cache.store_note("N2".into(), "Heat".into());

        assert_eq!(cache.note("N1").and_then(Resolution::ready).map(String::as_str), Some("Waves"));
        assert_eq!(cache.note("N2").and_then(Resolution::ready).map(String::as_str), Some("Heat"));
    }
}
