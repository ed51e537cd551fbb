//! Typed HTTP client for the study backend.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::models::{
    Ack, AnswerFeedback, BookDetails, NoteInfo, NoteKind, NoteView, QuestionRecord,
    QuestionSummary, ROOT_NOTE_ID,
};

/// Lookups needed to resolve references embedded in a note.
#[async_trait(?Send)]
pub trait ReferenceSource {
    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, ApiError>;
    async fn fetch_note_info(&self, id: &str) -> Result<NoteInfo, ApiError>;
}

#[derive(Serialize)]
struct SaveNoteBody<'a> {
    id: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct CreateItemBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: NoteKind,
    parent: &'a str,
}
#[derive(Serialize)]
struct RenameBody<'a> {
    id: &'a str,
    name: &'a str,
}
#[derive(Serialize)]
struct DeleteBody<'a> {
    id: &'a str,
}
#[derive(Serialize)]
struct MoveBody<'a> {
    id: &'a str,
    target: &'a str,
}
#[derive(Serialize)]
struct ReorderBody<'a> {
    parent_id: &'a str,
    order: &'a [String],
}
#[derive(Serialize)]
struct SubmitBody<'a> {
    q_id: &'a str,
    choice: &'a str,
}

#[derive(Clone, Debug)]
pub struct NotesApi {
    base_url: String,
    client: reqwest::Client,
}

impl NotesApi {
    /// `base_url` must be absolute, e.g. `https://host/api`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;
        read_payload(endpoint, resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;
        read_payload(endpoint, resp).await
    }

    async fn post_ack<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<(), ApiError> {
        let ack: Ack = self.post_json(endpoint, body).await?;
        if ack.success {
            Ok(())
        } else {
            Err(ApiError::Rejected {
                endpoint,
                message: ack.msg,
            })
        }
    }

    pub async fn load_note(&self, id: &str) -> Result<NoteView, ApiError> {
        self.get_json("notes/view", &[("id", id)]).await
    }

    pub async fn save_note(&self, id: &str, content: &str) -> Result<(), ApiError> {
        self.post_ack("notes/save", &SaveNoteBody { id, content })
            .await
    }

    pub async fn create_item(
        &self,
        name: &str,
        kind: NoteKind,
        parent: &str,
    ) -> Result<(), ApiError> {
        self.post_ack("notes/create", &CreateItemBody { name, kind, parent })
            .await
    }

    pub async fn rename_item(&self, id: &str, name: &str) -> Result<(), ApiError> {
        self.post_ack("notes/rename", &RenameBody { id, name }).await
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), ApiError> {
        self.post_ack("notes/delete", &DeleteBody { id }).await
    }

    /// Moves `id` under the folder `target` (`root` for the top level).
    pub async fn move_item(&self, id: &str, target: &str) -> Result<(), ApiError> {
        self.post_ack("notes/move", &MoveBody { id, target }).await
    }

    pub async fn reorder(&self, parent_id: &str, order: &[String]) -> Result<(), ApiError> {
        self.post_ack("notes/reorder", &ReorderBody { parent_id, order })
            .await
    }

    pub async fn list_questions(&self) -> Result<Vec<QuestionSummary>, ApiError> {
        let details: BookDetails = self
            .get_json("book_details", &[("book", ROOT_NOTE_ID)])
            .await?;
        Ok(details.questions)
    }

    pub async fn submit_answer(&self, q_id: &str, choice: &str) -> Result<AnswerFeedback, ApiError> {
        self.post_json("submit", &SubmitBody { q_id, choice }).await
    }
}

#[async_trait(?Send)]
impl ReferenceSource for NotesApi {
    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, ApiError> {
        self.get_json("get_question", &[("q_id", id)]).await
    }

    async fn fetch_note_info(&self, id: &str) -> Result<NoteInfo, ApiError> {
        self.get_json("notes/info", &[("id", id)]).await
    }
}

fn transport(endpoint: &'static str, err: reqwest::Error) -> ApiError {
    ApiError::Transport {
        endpoint,
        message: err.to_string(),
    }
}

async fn read_payload<T: DeserializeOwned>(
    endpoint: &'static str,
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    let status = resp.status().as_u16();
    let body = resp.text().await.map_err(|e| transport(endpoint, e))?;
    decode_payload(endpoint, status, &body)
}

/// Maps a raw response onto `T`.
///
/// An `{error}` payload wins over the status code: the backend answers
/// unknown ids with HTTP 404 and an error message.
pub(crate) fn decode_payload<T: DeserializeOwned>(
    endpoint: &'static str,
    status: u16,
    body: &str,
) -> Result<T, ApiError> {
    let value: Option<Value> = serde_json::from_str(body).ok();
    if let Some(message) = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .filter(|e| !e.is_null())
    {
        return Err(ApiError::Remote {
            endpoint,
            message: message
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string()),
        });
    }
    if !(200..300).contains(&status) {
        return Err(ApiError::Status { endpoint, status });
    }
    let value = value.ok_or_else(|| ApiError::Decode {
        endpoint,
        message: "response body is not JSON".to_string(),
    })?;
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_successful_payload() {
        let info: NoteInfo =
            decode_payload("notes/info", 200, r#"{"id":"N1","name":"Optics"}"#).unwrap();
        assert_eq!(info.name, "Optics");
    }

    #[test]
    fn error_payload_is_remote_error_even_with_ok_status() {
        let err = decode_payload::<QuestionRecord>("get_question", 200, r#"{"error":"gone"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Remote {
                endpoint: "get_question",
                message: "gone".into()
            }
        );
    }

    #[test]
    fn not_found_with_error_body_reports_message() {
        let err = decode_payload::<QuestionRecord>(
            "get_question",
            404,
            r#"{"error":"No questions available","code":404}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Remote { .. }));
        assert_eq!(
            err.to_string(),
            "get_question reported an error: No questions available"
        );
    }

    #[test]
    fn status_and_shape_failures() {
        assert_eq!(
            decode_payload::<NoteInfo>("notes/info", 500, "<html>oops</html>").unwrap_err(),
            ApiError::Status {
                endpoint: "notes/info",
                status: 500
            }
        );
        assert!(matches!(
            decode_payload::<NoteInfo>("notes/info", 200, "not json").unwrap_err(),
            ApiError::Decode { .. }
        ));
        assert!(matches!(
            decode_payload::<NoteInfo>("notes/info", 200, r#"{"id":"N1"}"#).unwrap_err(),
            ApiError::Decode { .. }
        ));
    }

    #[test]
    fn rejected_error_mentions_backend_message() {
        let err = ApiError::Rejected {
            endpoint: "notes/create",
            message: Some("Name required".into()),
        };
        assert_eq!(err.to_string(), "notes/create rejected the request: Name required");
    }

    #[test]
    fn move_body_uses_target_field() {
        let body = serde_json::to_value(MoveBody {
            id: "n1",
            target: ROOT_NOTE_ID,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"id": "n1", "target": "root"}));
    }

    #[test]
    fn base_url_is_normalized() {
        let api = NotesApi::new("http://localhost:5000/api/");
        assert_eq!(api.url("notes/view"), "http://localhost:5000/api/notes/view");
    }
}
