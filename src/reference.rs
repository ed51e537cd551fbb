//! Reference tokens embedded in note text.
//!
//! `[[note:<id>]]` links another note, any other `[[<id>]]` embeds a question.
//! Only an id whose trimmed text starts with exactly `note:` is a note link;
//! ids containing a colon anywhere else (`[[chapter:3]]`) are question ids.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

const NOTE_PREFIX: &str = "note:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Note,
    Question,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: String,
}

impl Reference {
    pub fn note(id: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Note,
            id: id.into(),
        }
    }

    pub fn question(id: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Question,
            id: id.into(),
        }
    }

    /// Classifies the text between `[[` and `]]`. Blank ids are not references.
    pub fn parse(inner: &str) -> Option<Self> {
        let trimmed = inner.trim();
        if let Some(rest) = trimmed.strip_prefix(NOTE_PREFIX) {
            let id = rest.trim();
            return (!id.is_empty()).then(|| Self::note(id));
        }
        (!trimmed.is_empty()).then(|| Self::question(trimmed))
    }

    /// Source text that inserting this reference produces.
    pub fn token(&self) -> String {
        match self.kind {
            ReferenceKind::Note => format!("[[{NOTE_PREFIX}{}]]", self.id),
            ReferenceKind::Question => format!("[[{}]]", self.id),
        }
    }
}

/// Matches one `[[...]]` token. Brackets and newlines are not allowed inside,
/// so an unterminated `[[` never swallows following text.
pub(crate) fn token_pattern() -> &'static Regex {
    static RE_TOKEN: OnceLock<Regex> = OnceLock::new();
    RE_TOKEN.get_or_init(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").unwrap())
}

/// Distinct ids, per kind, that a render pass could not show resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub questions: BTreeSet<String>,
    pub notes: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn insert(&mut self, reference: Reference) {
        match reference.kind {
            ReferenceKind::Note => self.notes.insert(reference.id),
            ReferenceKind::Question => self.questions.insert(reference.id),
        };
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len() + self.notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_note_and_question_ids() {
        assert_eq!(Reference::parse("note:N5"), Some(Reference::note("N5")));
        assert_eq!(Reference::parse(" note: N5 "), Some(Reference::note("N5")));
        assert_eq!(Reference::parse(" Q1 "), Some(Reference::question("Q1")));
        assert_eq!(
            Reference::parse("chapter:3"),
            Some(Reference::question("chapter:3"))
        );
        assert_eq!(
            Reference::parse("Note:N5"),
            Some(Reference::question("Note:N5"))
        );
    }

    #[test]
    fn blank_ids_are_not_references() {
        assert_eq!(Reference::parse("   "), None);
        assert_eq!(Reference::parse("note:"), None);
        assert_eq!(Reference::parse("note:  "), None);
    }

    #[test]
    fn token_pattern_leaves_unterminated_brackets_alone() {
        let re = token_pattern();
        assert!(re.find("see [[Q1 and more").is_none());
        assert!(re.find("see [[Q1]\n]").is_none());

        let found: Vec<_> = re
            .captures_iter("[[[Q1]] and [[note:N2]]")
            .map(|cap| cap[1].to_string())
            .collect();
        assert_eq!(found, vec!["Q1", "note:N2"]);
    }

    #[test]
    fn tokens_round_trip_through_parse() {
        for reference in [Reference::note("N5"), Reference::question("Q1")] {
            let token = reference.token();
            let inner = &token[2..token.len() - 2];
            assert_eq!(Reference::parse(inner), Some(reference));
        }
    }
}
