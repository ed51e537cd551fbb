//! Question picker filtering and the practice state of the detail view.

use crate::models::{AnswerFeedback, QuestionRecord, QuestionSummary};

const UNFILTERED_LIMIT: usize = 10;
const FILTERED_LIMIT: usize = 20;

/// Questions offered for insertion: the first few without a query, otherwise
/// case-insensitive matches on summary or id.
pub fn filter_questions<'a>(all: &'a [QuestionSummary], query: &str) -> Vec<&'a QuestionSummary> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return all.iter().take(UNFILTERED_LIMIT).collect();
    }
    all.iter()
        .filter(|q| {
            q.id.to_lowercase().contains(&query)
                || q.summary
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&query))
        })
        .take(FILTERED_LIMIT)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionState {
    Idle,
    Selected,
    Correct,
    Wrong,
    Dimmed,
}

impl OptionState {
    pub fn class(self) -> &'static str {
        match self {
            OptionState::Idle => "option",
            OptionState::Selected => "option option-selected",
            OptionState::Correct => "option option-correct",
            OptionState::Wrong => "option option-wrong",
            OptionState::Dimmed => "option option-dimmed",
        }
    }
}

/// One attempt at a question opened from a note.
#[derive(Clone, Debug, PartialEq)]
pub struct PracticeSession {
    pub question: QuestionRecord,
    pub selected: Option<String>,
    pub feedback: Option<AnswerFeedback>,
}

impl PracticeSession {
    pub fn new(question: QuestionRecord) -> Self {
        Self {
            question,
            selected: None,
            feedback: None,
        }
    }

    pub fn submitted(&self) -> bool {
        self.feedback.is_some()
    }

    /// Selection is frozen once the answer was submitted.
    pub fn select(&mut self, option_id: &str) {
        if !self.submitted() {
            self.selected = Some(option_id.to_string());
        }
    }

    /// `(question id, chosen option)` when an answer can be submitted.
    pub fn submission(&self) -> Option<(String, String)> {
        if self.submitted() {
            return None;
        }
        self.selected
            .clone()
            .map(|choice| (self.question.id.clone(), choice))
    }

    pub fn option_state(&self, option_id: &str) -> OptionState {
        let is_selected = self.selected.as_deref() == Some(option_id);
        match &self.feedback {
            None if is_selected => OptionState::Selected,
            None => OptionState::Idle,
            Some(feedback) if feedback.correct_id == option_id => OptionState::Correct,
            Some(_) if is_selected => OptionState::Wrong,
            Some(_) => OptionState::Dimmed,
        }
    }
}
