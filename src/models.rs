//! Wire types exchanged with the study backend.

use serde::{Deserialize, Serialize};

pub const ROOT_NOTE_ID: &str = "root";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    #[serde(default, alias = "content")]
    pub text: String,
}

/// A question as embedded in notes and shown in the detail view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "correct_id")]
    pub correct_option_id: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub analysis: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    File,
    Folder,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::File => "file",
            NoteKind::Folder => "folder",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub created_at: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: String,
    pub name: String,
}

/// Response of `notes/view`: the opened node, its children and its path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteView {
    pub info: NoteItem,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub items: Vec<NoteItem>,
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl NoteView {
    pub fn is_file(&self) -> bool {
        self.info.kind == NoteKind::File
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub correct_id: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BookDetails {
    #[serde(default)]
    pub questions: Vec<QuestionSummary>,
}
