//! Resolution of reference placeholders left behind by a render pass.

use futures_util::future::{join, join_all};
use log::{debug, warn};

use crate::api::ReferenceSource;
use crate::cache::{CacheCell, Resolution};
use crate::models::QuestionRecord;
use crate::reference::{Reference, ReferenceSet};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub requested: usize,
    pub resolved: usize,
    pub failed: usize,
}

enum Outcome {
    Resolved,
    Failed,
}

/// Fetches every id of `unresolved` that has no cache entry yet.
///
/// Ids already in the cache (in flight, resolved or failed) are skipped, so
/// each distinct missing id is fetched once. All fetches run concurrently and
/// the pass returns once every one has settled. Each settled fetch is its own
/// cache write, which is what re-renders the note.
pub async fn resolve_pass<S, C>(source: &S, cache: &C, unresolved: &ReferenceSet) -> ResolveReport
where
    S: ReferenceSource + ?Sized,
    C: CacheCell,
{
    if cache.inspect(|c| c.missing(unresolved)).is_empty() {
        return ResolveReport::default();
    }
    let mut claimed = ReferenceSet::default();
    cache.modify(|c| claimed = c.claim(unresolved));
    debug!(
        "event=resolve_pass module=resolver status=start questions={} notes={}",
        claimed.questions.len(),
        claimed.notes.len()
    );

    let question_fetches = claimed.questions.iter().map(|id| async move {
        match source.fetch_question(id).await {
            Ok(record) => {
                cache.modify(|c| c.store_question(id.clone(), record));
                Outcome::Resolved
            }
            Err(err) => {
                warn!("event=resolve_question module=resolver status=error id={id} error={err}");
                cache.modify(|c| c.fail_question(id));
                Outcome::Failed
            }
        }
    });
    let note_fetches = claimed.notes.iter().map(|id| async move {
        match source.fetch_note_info(id).await {
            Ok(info) => {
                cache.modify(|c| c.store_note(id.clone(), info.name));
                Outcome::Resolved
            }
            Err(err) => {
                warn!("event=resolve_note module=resolver status=error id={id} error={err}");
                cache.modify(|c| c.fail_note(id));
                Outcome::Failed
            }
        }
    });

    let (questions, notes) = join(join_all(question_fetches), join_all(note_fetches)).await;

    let mut report = ResolveReport {
        requested: claimed.len(),
        ..Default::default()
    };
    for outcome in questions.into_iter().chain(notes) {
        match outcome {
            Outcome::Resolved => report.resolved += 1,
            Outcome::Failed => report.failed += 1,
        }
    }
    debug!(
        "event=resolve_pass module=resolver status=done requested={} resolved={} failed={}",
        report.requested, report.resolved, report.failed
    );
    report
}

/// What the detail view can show for a question id.
#[derive(Clone, Debug, PartialEq)]
pub enum QuestionLookup {
    Ready(QuestionRecord),
    /// Another fetch owns the id; its result lands in the cache.
    InFlight,
    /// The backend cannot resolve the id.
    Unavailable,
}

/// Returns the question for the detail view, fetching and caching it on a
/// miss. The id is claimed before the fetch, so a concurrent resolve pass
/// does not request it again, and an id some pass already claimed is not
/// fetched twice.
pub async fn ensure_question<S, C>(source: &S, cache: &C, id: &str) -> QuestionLookup
where
    S: ReferenceSource + ?Sized,
    C: CacheCell,
{
    match cache.inspect(|c| c.question(id).cloned()) {
        Some(Resolution::Ready(record)) => return QuestionLookup::Ready(record),
        Some(Resolution::Failed) => return QuestionLookup::Unavailable,
        Some(Resolution::Pending) => return QuestionLookup::InFlight,
        None => {}
    }

    let mut wanted = ReferenceSet::default();
    wanted.insert(Reference::question(id));
    let mut claimed = ReferenceSet::default();
    cache.modify(|c| claimed = c.claim(&wanted));
    if claimed.is_empty() {
        return QuestionLookup::InFlight;
    }

    match source.fetch_question(id).await {
        Ok(record) => {
            cache.modify(|c| c.store_question(id.to_string(), record.clone()));
            QuestionLookup::Ready(record)
        }
        Err(err) => {
            warn!("event=open_question module=resolver status=error id={id} error={err}");
            cache.modify(|c| c.fail_question(id));
            QuestionLookup::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResolutionCache;
    use crate::error::ApiError;
    use crate::models::NoteInfo;
    use crate::render::{render, EMPTY_NOTE_HTML};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Backend double that counts calls per id.
    #[derive(Default)]
    struct FakeBackend {
        questions: HashMap<String, QuestionRecord>,
        notes: HashMap<String, String>,
        calls: RefCell<HashMap<String, usize>>,
    }

    impl FakeBackend {
        fn with_question(mut self, id: &str, content: &str) -> Self {
            self.questions.insert(
                id.to_string(),
                QuestionRecord {
                    id: id.to_string(),
                    content: content.to_string(),
                    tags: vec!["mechanics".into()],
                    correct_option_id: Some("A".into()),
                    ..Default::default()
                },
            );
            self
        }

        fn with_note(mut self, id: &str, name: &str) -> Self {
            self.notes.insert(id.to_string(), name.to_string());
            self
        }

        fn count(&self, key: &str) {
            *self.calls.borrow_mut().entry(key.to_string()).or_default() += 1;
        }

        fn calls(&self, key: &str) -> usize {
            self.calls.borrow().get(key).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.borrow().values().sum()
        }
    }

    #[async_trait(?Send)]
    impl ReferenceSource for FakeBackend {
        async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, ApiError> {
            self.count(&format!("q:{id}"));
            tokio::task::yield_now().await;
            self.questions.get(id).cloned().ok_or_else(|| ApiError::Remote {
                endpoint: "get_question",
                message: "Question not found".into(),
            })
        }

        async fn fetch_note_info(&self, id: &str) -> Result<NoteInfo, ApiError> {
            self.count(&format!("n:{id}"));
            tokio::task::yield_now().await;
            self.notes
                .get(id)
                .map(|name| NoteInfo {
                    id: id.to_string(),
                    name: name.clone(),
                })
                .ok_or_else(|| ApiError::Status {
                    endpoint: "notes/info",
                    status: 404,
                })
        }
    }

    /// Renders, resolves, and re-renders until no pass has work left.
    async fn render_to_fixpoint(
        raw: &str,
        backend: &FakeBackend,
        cache: &RefCell<ResolutionCache>,
    ) -> String {
        loop {
            let rendered = render(raw, &cache.borrow());
            let report = resolve_pass(backend, cache, &rendered.unresolved).await;
            if report.requested == 0 {
                return rendered.html;
            }
        }
    }

    #[tokio::test]
    async fn duplicate_reference_is_fetched_once_and_resolves_both_cards() {
        let backend = FakeBackend::default().with_question("Q1", "A ball is thrown up.");
        let cache = RefCell::new(ResolutionCache::default());
        let raw = "See [[Q1]] and [[Q1]] again";

        let initial = render(raw, &cache.borrow());
        assert_eq!(initial.html.matches("data-qid=\"Q1\"").count(), 2);

        let report = resolve_pass(&backend, &cache, &initial.unresolved).await;
        assert_eq!(
            report,
            ResolveReport {
                requested: 1,
                resolved: 1,
                failed: 0
            }
        );

        let after = render(raw, &cache.borrow());
        assert_eq!(after.html.matches("data-question-card=\"Q1\"").count(), 2);
        assert!(!after.html.contains("data-qid"));
        assert!(after.unresolved.is_empty());
        assert_eq!(backend.calls("q:Q1"), 1);
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn deleted_note_renders_marker_and_is_never_refetched() {
        let backend = FakeBackend::default();
        let cache = RefCell::new(ResolutionCache::default());
        let raw = "[[note:N5]]";

        let initial = render(raw, &cache.borrow());
        assert!(initial.html.contains("data-nid=\"N5\""));

        let report = resolve_pass(&backend, &cache, &initial.unresolved).await;
        assert_eq!(report.failed, 1);

        let html = render_to_fixpoint(raw, &backend, &cache).await;
        assert!(html.contains("<span class=\"embed-error\">Deleted</span>"));

        // Later passes with the same reference do nothing.
        resolve_pass(&backend, &cache, &initial.unresolved).await;
        assert_eq!(backend.calls("n:N5"), 1);
    }

    #[tokio::test]
    async fn empty_note_issues_no_fetches() {
        let backend = FakeBackend::default();
        let cache = RefCell::new(ResolutionCache::default());

        let html = render_to_fixpoint("", &backend, &cache).await;
        assert_eq!(html, EMPTY_NOTE_HTML);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn one_fetch_per_distinct_missing_id_across_kinds() {
        let backend = FakeBackend::default()
            .with_question("Q1", "one")
            .with_question("Q2", "two")
            .with_note("N1", "Optics");
        let cache = RefCell::new(ResolutionCache::default());
        cache.borrow_mut().store_question(
            "Q2".into(),
            QuestionRecord {
                id: "Q2".into(),
                ..Default::default()
            },
        );
        let raw = "[[Q1]] [[Q2]] [[note:N1]] [[Q1]] [[note:N1]] [[Q3]]";

        let rendered = render(raw, &cache.borrow());
        let report = resolve_pass(&backend, &cache, &rendered.unresolved).await;

        assert_eq!(report.requested, 3);
        assert_eq!(report.resolved, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(backend.calls("q:Q1"), 1);
        assert_eq!(backend.calls("q:Q2"), 0);
        assert_eq!(backend.calls("q:Q3"), 1);
        assert_eq!(backend.calls("n:N1"), 1);

        let html = render(raw, &cache.borrow()).html;
        assert!(html.contains("data-note-link=\"N1\">Optics</button>"));
        assert!(html.contains("Error: Q3"));
    }

    #[tokio::test]
    async fn concurrent_passes_share_in_flight_claims() {
        let backend = FakeBackend::default().with_question("Q1", "shared");
        let cache = RefCell::new(ResolutionCache::default());
        let rendered = render("[[Q1]]", &cache.borrow());

        let (first, second) = join(
            resolve_pass(&backend, &cache, &rendered.unresolved),
            resolve_pass(&backend, &cache, &rendered.unresolved),
        )
        .await;

        assert_eq!(first.requested + second.requested, 1);
        assert_eq!(backend.calls("q:Q1"), 1);
    }

    #[tokio::test]
    async fn inserted_reference_resolves_without_leftover_placeholder() {
        let backend = FakeBackend::default()
            .with_question("Q7", "Energy is conserved.")
            .with_note("N2", "Thermodynamics");
        let cache = RefCell::new(ResolutionCache::default());

        let html = render_to_fixpoint("Intro\n\n[[Q7]] see [[note:N2]]", &backend, &cache).await;
        assert!(!html.contains("data-qid=\"Q7\""));
        assert!(!html.contains("data-nid=\"N2\""));
        assert!(html.contains("Energy is conserved."));
    }

    #[tokio::test]
    async fn ensure_question_uses_cache_before_network() {
        let backend = FakeBackend::default().with_question("Q1", "cached later");
        let cache = RefCell::new(ResolutionCache::default());

        let first = ensure_question(&backend, &cache, "Q1").await;
        let second = ensure_question(&backend, &cache, "Q1").await;
        assert!(matches!(first, QuestionLookup::Ready(_)));
        assert_eq!(first, second);
        assert_eq!(backend.calls("q:Q1"), 1);

        assert_eq!(
            ensure_question(&backend, &cache, "Q404").await,
            QuestionLookup::Unavailable
        );
        assert_eq!(
            ensure_question(&backend, &cache, "Q404").await,
            QuestionLookup::Unavailable
        );
        assert_eq!(backend.calls("q:Q404"), 1);
    }

    #[tokio::test]
    async fn opening_a_card_during_a_pass_shares_the_fetch() {
        let backend = FakeBackend::default().with_question("Q1", "shared");
        let cache = RefCell::new(ResolutionCache::default());
        let rendered = render("[[Q1]]", &cache.borrow());

        let (report, lookup) = join(
            resolve_pass(&backend, &cache, &rendered.unresolved),
            ensure_question(&backend, &cache, "Q1"),
        )
        .await;

        assert_eq!(report.requested, 1);
        assert_eq!(lookup, QuestionLookup::InFlight);
        assert_eq!(backend.calls("q:Q1"), 1);
        assert!(matches!(
            ensure_question(&backend, &cache, "Q1").await,
            QuestionLookup::Ready(_)
        ));
        assert_eq!(backend.calls("q:Q1"), 1);
    }

    #[tokio::test]
    async fn pass_started_after_opening_a_card_skips_the_claimed_id() {
        let backend = FakeBackend::default().with_question("Q1", "shared");
        let cache = RefCell::new(ResolutionCache::default());
        let rendered = render("[[Q1]]", &cache.borrow());

        let (lookup, report) = join(
            ensure_question(&backend, &cache, "Q1"),
            resolve_pass(&backend, &cache, &rendered.unresolved),
        )
        .await;

        assert!(matches!(lookup, QuestionLookup::Ready(_)));
        assert_eq!(report.requested, 0);
        assert_eq!(backend.calls("q:Q1"), 1);
    }
}
