//! Markdown rendering with embedded note links and question cards.
//!
//! Rendering is a pure function of the raw text and the current cache
//! contents. References that the cache cannot show yet become loading
//! placeholders and are reported back so the caller can resolve them; the
//! next cache change re-renders from scratch.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::cache::{Resolution, ResolutionCache};
use crate::models::QuestionRecord;
use crate::reference::{token_pattern, Reference, ReferenceKind, ReferenceSet};

pub const EMPTY_NOTE_HTML: &str = "<span class=\"note-empty\">Empty note...</span>";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderedNote {
    pub html: String,
    /// Ids rendered as loading placeholders in this pass.
    pub unresolved: ReferenceSet,
}

pub fn render(raw: &str, cache: &ResolutionCache) -> RenderedNote {
    if raw.is_empty() {
        return RenderedNote {
            html: EMPTY_NOTE_HTML.to_string(),
            unresolved: ReferenceSet::default(),
        };
    }

    let mut unresolved = ReferenceSet::default();
    let mut events = Vec::new();
    let mut text_run = String::new();

    // The parser splits `[[id]]` into several text events, so references are
    // matched against whole runs of adjacent text. Code block contents and
    // image alt text arrive as text events too and stay literal.
    let mut in_code_block = false;
    let mut image_depth = 0usize;
    for event in Parser::new_ext(raw, markdown_options()) {
        let literal = in_code_block || image_depth > 0;
        match event {
            Event::Text(text) if !literal => text_run.push_str(&text),
            Event::Html(markup) if !literal => {
                flush_text_run(&mut text_run, cache, &mut unresolved, &mut events);
                events.push(Event::Html(expand_markup(markup, cache, &mut unresolved)));
            }
            other => {
                match &other {
                    Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                    Event::End(TagEnd::CodeBlock) => in_code_block = false,
                    Event::Start(Tag::Image { .. }) => image_depth += 1,
                    Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
                    _ => {}
                }
                flush_text_run(&mut text_run, cache, &mut unresolved, &mut events);
                events.push(other);
            }
        }
    }
    flush_text_run(&mut text_run, cache, &mut unresolved, &mut events);

    let mut out = String::with_capacity(raw.len() * 2);
    html::push_html(&mut out, events.into_iter());
    RenderedNote {
        html: out,
        unresolved,
    }
}

/// Plain markdown conversion, used for question bodies. References inside
/// are left as literal text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, Parser::new_ext(markdown, markdown_options()));
    out
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

enum Segment {
    Text(String),
    Markup(String),
}

fn flush_text_run<'a>(
    text_run: &mut String,
    cache: &ResolutionCache,
    unresolved: &mut ReferenceSet,
    events: &mut Vec<Event<'a>>,
) {
    if text_run.is_empty() {
        return;
    }
    let text = std::mem::take(text_run);
    if !text.contains("[[") {
        events.push(Event::Text(CowStr::from(text)));
        return;
    }
    for segment in expand_references(text, cache, unresolved) {
        events.push(match segment {
            Segment::Text(text) => Event::Text(CowStr::from(text)),
            Segment::Markup(markup) => Event::InlineHtml(CowStr::from(markup)),
        });
    }
}

/// Raw HTML written in the note passes through as-is, with any references
/// inside it replaced by their widgets.
fn expand_markup<'a>(
    markup: CowStr<'a>,
    cache: &ResolutionCache,
    unresolved: &mut ReferenceSet,
) -> CowStr<'a> {
    if !markup.contains("[[") {
        return markup;
    }
    let expanded: String = expand_references(markup.to_string(), cache, unresolved)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) | Segment::Markup(text) => text,
        })
        .collect();
    CowStr::from(expanded)
}

fn expand_references(
    text: String,
    cache: &ResolutionCache,
    unresolved: &mut ReferenceSet,
) -> Vec<Segment> {
    // Note links first; the question pass skips anything prefixed `note:`.
    let segments = vec![Segment::Text(text)];
    let segments = expand_pass(segments, ReferenceKind::Note, |id| {
        note_widget(id, cache.note(id), unresolved)
    });
    expand_pass(segments, ReferenceKind::Question, |id| {
        question_widget(id, cache.question(id), unresolved)
    })
}

fn expand_pass(
    segments: Vec<Segment>,
    kind: ReferenceKind,
    mut widget: impl FnMut(&str) -> String,
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let text = match segment {
            Segment::Text(text) => text,
            markup => {
                out.push(markup);
                continue;
            }
        };

        let mut cursor = 0;
        for cap in token_pattern().captures_iter(&text) {
            let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let Some(reference) = Reference::parse(inner.as_str()).filter(|r| r.kind == kind)
            else {
                continue;
            };
            if whole.start() > cursor {
                out.push(Segment::Text(text[cursor..whole.start()].to_string()));
            }
            out.push(Segment::Markup(widget(&reference.id)));
            cursor = whole.end();
        }
        if cursor < text.len() {
            out.push(Segment::Text(text[cursor..].to_string()));
        }
    }
    out
}

fn note_widget(
    id: &str,
    entry: Option<&Resolution<String>>,
    unresolved: &mut ReferenceSet,
) -> String {
    let id_attr = escape_html(id);
    match entry {
        Some(Resolution::Ready(name)) => format!(
            "<button type=\"button\" class=\"note-link\" data-note-link=\"{id_attr}\">{}</button>",
            escape_html(name)
        ),
        Some(Resolution::Failed) => format!(
            "<span class=\"note-link-placeholder\" data-nid=\"{id_attr}\"><span class=\"embed-error\">Deleted</span></span>"
        ),
        Some(Resolution::Pending) | None => {
            unresolved.insert(Reference::note(id));
            format!("<span class=\"note-link-placeholder\" data-nid=\"{id_attr}\">Loading...</span>")
        }
    }
}

fn question_widget(
    id: &str,
    entry: Option<&Resolution<QuestionRecord>>,
    unresolved: &mut ReferenceSet,
) -> String {
    let id_attr = escape_html(id);
    match entry {
        Some(Resolution::Ready(question)) => question_card(&id_attr, question),
        Some(Resolution::Failed) => format!(
            "<div class=\"question-embed-placeholder\" data-qid=\"{id_attr}\"><span class=\"embed-error\">Error: {id_attr}</span></div>"
        ),
        Some(Resolution::Pending) | None => {
            unresolved.insert(Reference::question(id));
            format!(
                "<div class=\"question-embed-placeholder\" data-qid=\"{id_attr}\"><span class=\"spinner\"></span><span class=\"embed-loading\">Loading {id_attr}...</span></div>"
            )
        }
    }
}

fn question_card(id_attr: &str, question: &QuestionRecord) -> String {
    let tags: String = question
        .tags
        .iter()
        .map(|tag| format!("<span class=\"question-tag\">{}</span>", escape_html(tag)))
        .collect();
    format!(
        "<div class=\"question-card\" data-question-card=\"{id_attr}\">\
         <div class=\"question-card-header\"><span class=\"question-id\">{id_attr}</span>{tags}\
         <span class=\"question-card-action\">Practice</span></div>\
         <div class=\"question-card-body math-content\">{}</div></div>",
        markdown_to_html(&question.content)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, content: &str, tags: &[&str]) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            correct_option_id: Some("A".into()),
            ..Default::default()
        }
    }

    fn populated_cache() -> ResolutionCache {
        let mut cache = ResolutionCache::default();
        cache.store_question("Q1".into(), question("Q1", "Find **x**", &["algebra"]));
        cache.store_note("N5".into(), "Lens formula".into());
        cache.fail_question("Q9");
        cache
    }

    #[test]
    fn empty_text_renders_canned_placeholder() {
        let rendered = render("", &populated_cache());
        assert_eq!(rendered.html, EMPTY_NOTE_HTML);
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn reference_free_text_ignores_cache() {
        let raw = "# Heading\n\nSome *text* with [a link](http://x) and `[[Q1]]` in code.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let with_empty = render(raw, &ResolutionCache::default());
        let with_full = render(raw, &populated_cache());

        assert_eq!(with_empty, with_full);
        assert_eq!(with_empty.html, markdown_to_html(raw));
        assert!(with_empty.unresolved.is_empty());
    }

    #[test]
    fn missing_ids_render_as_tagged_placeholders() {
        let rendered = render("See [[Q1]] and [[Q1]] again", &ResolutionCache::default());

        assert_eq!(rendered.html.matches("data-qid=\"Q1\"").count(), 2);
        assert_eq!(
            rendered.unresolved.questions.iter().collect::<Vec<_>>(),
            vec!["Q1"]
        );
        assert!(rendered.unresolved.notes.is_empty());
    }

    #[test]
    fn cached_question_renders_card_for_every_occurrence() {
        let cache = populated_cache();
        let first = render("See [[Q1]] and [[ Q1 ]] again", &cache);
        let second = render("See [[Q1]] and [[ Q1 ]] again", &cache);

        assert_eq!(first, second);
        assert_eq!(first.html.matches("data-question-card=\"Q1\"").count(), 2);
        assert!(first.html.contains("<span class=\"question-tag\">algebra</span>"));
        assert!(first.html.contains("<strong>x</strong>"));
        assert!(!first.html.contains("data-qid"));
        assert!(first.unresolved.is_empty());
    }

    #[test]
    fn note_links_render_name_or_placeholder() {
        let cache = populated_cache();
        let rendered = render("Read [[note:N5]] then [[note:N6]].", &cache);

        assert!(rendered
            .html
            .contains("<button type=\"button\" class=\"note-link\" data-note-link=\"N5\">Lens formula</button>"));
        assert!(rendered
            .html
            .contains("<span class=\"note-link-placeholder\" data-nid=\"N6\">Loading...</span>"));
        assert_eq!(rendered.unresolved.notes.iter().collect::<Vec<_>>(), vec!["N6"]);
        assert!(rendered.unresolved.questions.is_empty());
    }

    #[test]
    fn failed_entries_render_inline_markers_and_are_not_unresolved() {
        let mut cache = populated_cache();
        cache.fail_note("N7");
        let rendered = render("[[Q9]] [[note:N7]]", &cache);

        assert!(rendered.html.contains("<span class=\"embed-error\">Error: Q9</span>"));
        assert!(rendered.html.contains("<span class=\"embed-error\">Deleted</span>"));
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn pending_entries_stay_placeholders() {
        let mut cache = ResolutionCache::default();
        let mut wanted = ReferenceSet::default();
        wanted.insert(Reference::question("Q1"));
        cache.claim(&wanted);

        let rendered = render("[[Q1]]", &cache);
        assert!(rendered.html.contains("data-qid=\"Q1\""));
        assert_eq!(rendered.unresolved, wanted);
    }

    #[test]
    fn unterminated_and_blank_tokens_stay_literal() {
        let rendered = render("open [[Q1 and [[ ]] and [[note:]]", &ResolutionCache::default());
        assert!(rendered.html.contains("open [[Q1 and [[ ]] and [[note:]]"));
        assert!(rendered.unresolved.is_empty());
    }

    #[test]
    fn code_blocks_keep_tokens_literal() {
        let raw = "```\n[[Q1]] [[note:N5]]\n```\n\nafter [[Q2]]\n";
        let rendered = render(raw, &populated_cache());

        assert!(rendered.html.contains("<pre><code>[[Q1]] [[note:N5]]\n</code></pre>"));
        assert!(!rendered.html.contains("data-question-card=\"Q1\""));
        assert_eq!(rendered.unresolved.questions.iter().collect::<Vec<_>>(), vec!["Q2"]);
        assert!(rendered.unresolved.notes.is_empty());
    }

    #[test]
    fn references_inside_raw_html_blocks_are_expanded() {
        let rendered = render("<div class=\"box\">[[Q2]] and [[Q1]]</div>\n", &populated_cache());

        assert!(rendered.html.starts_with("<div class=\"box\">"));
        assert!(rendered.html.contains("data-qid=\"Q2\""));
        assert!(rendered.html.contains("data-question-card=\"Q1\""));
        assert!(!rendered.html.contains("[[Q2]]"));
        assert_eq!(rendered.unresolved.questions.iter().collect::<Vec<_>>(), vec!["Q2"]);
    }

    #[test]
    fn image_alt_text_keeps_tokens_literal() {
        let rendered = render("![alt [[Q1]]](img.png) then [[Q3]]", &ResolutionCache::default());

        assert!(rendered.html.contains("alt=\"alt [[Q1]]\""));
        assert!(!rendered.html.contains("&lt;div"));
        assert_eq!(rendered.unresolved.questions.iter().collect::<Vec<_>>(), vec!["Q3"]);
    }

    #[test]
    fn ids_are_escaped_in_markup() {
        let rendered = render("[[a&b\"c]]", &ResolutionCache::default());
        assert!(rendered.html.contains("data-qid=\"a&amp;b&quot;c\""));
        assert!(rendered.unresolved.questions.contains("a&b\"c"));
    }

    #[test]
    fn colon_ids_other_than_note_prefix_are_questions() {
        let rendered = render("[[chapter:3]]", &ResolutionCache::default());
        assert!(rendered.html.contains("data-qid=\"chapter:3\""));
        assert!(rendered.unresolved.notes.is_empty());
    }

    #[test]
    fn note_link_never_expands_the_linked_body() {
        let mut cache = ResolutionCache::default();
        cache.store_note("self".into(), "[[note:self]]".into());
        let rendered = render("[[note:self]]", &cache);
        assert!(rendered.html.contains(">[[note:self]]</button>"));
        assert!(rendered.unresolved.is_empty());
    }
}
