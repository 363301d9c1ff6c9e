use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use stockdesk::api::{load_edit_bundle, ApiError, MaterialService};
use stockdesk::auth::{CredentialError, CredentialStore};
use stockdesk::model::{MaterialDraft, MaterialRecord, PendingImage, RefEntry, UpdateResponse};
use stockdesk::state::{AfterSubmit, EditPhase, EditSession};

struct MemoryCredentials(Mutex<Option<String>>);

impl MemoryCredentials {
    fn with_token(token: &str) -> Self {
        Self(Mutex::new(Some(token.to_string())))
    }
}

impl CredentialStore for MemoryCredentials {
    fn load(&self) -> Option<String> {
        self.0.lock().unwrap().clone()
    }

    fn store(&self, token: &str) -> Result<(), CredentialError> {
        *self.0.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) {
        *self.0.lock().unwrap() = None;
    }
}

type Scripted<T> = Mutex<VecDeque<Result<T, ApiError>>>;

#[derive(Default)]
struct RecordingBackend {
    material_responses: Scripted<MaterialRecord>,
    floor_responses: Scripted<Vec<RefEntry>>,
    unit_responses: Scripted<Vec<RefEntry>>,
    update_responses: Scripted<UpdateResponse>,
    seen_tokens: Mutex<Vec<String>>,
    update_calls: Mutex<Vec<(String, MaterialDraft, Option<PendingImage>)>>,
}

impl RecordingBackend {
    fn push_material(&self, response: Result<MaterialRecord, ApiError>) {
        self.material_responses.lock().unwrap().push_back(response);
    }

    fn push_floors(&self, response: Result<Vec<RefEntry>, ApiError>) {
        self.floor_responses.lock().unwrap().push_back(response);
    }

    fn push_units(&self, response: Result<Vec<RefEntry>, ApiError>) {
        self.unit_responses.lock().unwrap().push_back(response);
    }

    fn push_update(&self, response: Result<UpdateResponse, ApiError>) {
        self.update_responses.lock().unwrap().push_back(response);
    }

    fn update_calls(&self) -> Vec<(String, MaterialDraft, Option<PendingImage>)> {
        self.update_calls.lock().unwrap().clone()
    }
}

fn pop<T>(queue: &Scripted<T>) -> Result<T, ApiError> {
    queue.lock().unwrap().pop_front().unwrap_or_else(|| {
        Err(ApiError::Status {
            status: reqwest::StatusCode::NOT_IMPLEMENTED,
            body: "no scripted response".to_string(),
        })
    })
}

#[async_trait]
impl MaterialService for RecordingBackend {
    async fn material(&self, token: &str, _id: &str) -> Result<MaterialRecord, ApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_string());
        pop(&self.material_responses)
    }

    async fn materials(&self, token: &str) -> Result<Vec<MaterialRecord>, ApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_string());
        Ok(Vec::new())
    }

    async fn floors(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_string());
        pop(&self.floor_responses)
    }

    async fn units(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_string());
        pop(&self.unit_responses)
    }

    async fn update_material(
        &self,
        token: &str,
        id: &str,
        draft: &MaterialDraft,
        image: Option<&PendingImage>,
    ) -> Result<UpdateResponse, ApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_string());
        self.update_calls
            .lock()
            .unwrap()
            .push((id.to_string(), draft.clone(), image.cloned()));
        pop(&self.update_responses)
    }
}

fn sample_record() -> MaterialRecord {
    MaterialRecord {
        id: "7".into(),
        name: "Steel beam".into(),
        detail: "Grade S355".into(),
        unit_id: "u2".into(),
        floor_id: "f1".into(),
        total: "40".into(),
        image_url: "/uploads/beam.jpg".into(),
        created_at: "2024-03-01T08:30:00Z".into(),
    }
}

fn sample_floors() -> Vec<RefEntry> {
    vec![
        RefEntry {
            id: "f1".into(),
            name: "Ground".into(),
        },
        RefEntry {
            id: "f2".into(),
            name: "Mezzanine".into(),
        },
    ]
}

fn sample_units() -> Vec<RefEntry> {
    vec![
        RefEntry {
            id: "u1".into(),
            name: "Boxes".into(),
        },
        RefEntry {
            id: "u2".into(),
            name: "Pieces".into(),
        },
    ]
}

async fn loaded_session(backend: &RecordingBackend, creds: &MemoryCredentials) -> EditSession {
    backend.push_material(Ok(sample_record()));
    backend.push_floors(Ok(sample_floors()));
    backend.push_units(Ok(sample_units()));
    let mut session = EditSession::new("7");
    let outcome = load_edit_bundle(backend, "tok", "7").await;
    session.apply_load(outcome, creds);
    assert_eq!(session.phase, EditPhase::Ready);
    session
}

#[tokio::test]
async fn load_populates_form_and_pickers_in_order() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    let session = loaded_session(&backend, &creds).await;

    assert_eq!(session.draft.name, "Steel beam");
    assert_eq!(session.draft.detail, "Grade S355");
    assert_eq!(session.draft.unit_id, "u2");
    assert_eq!(session.draft.floor_id, "f1");
    assert_eq!(session.draft.total, "40");
    assert_eq!(session.image_url, "/uploads/beam.jpg");

    let floor_values: Vec<&str> = session
        .floor_options
        .iter()
        .map(|o| o.value.as_str())
        .collect();
    assert_eq!(floor_values, ["f1", "f2"]);
    let unit_labels: Vec<&str> = session
        .unit_options
        .iter()
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(unit_labels, ["Boxes", "Pieces"]);

    // every fetch carried the bearer credential
    assert!(backend
        .seen_tokens
        .lock()
        .unwrap()
        .iter()
        .all(|token| token == "tok"));
    assert_eq!(creds.load(), Some("tok".to_string()));
}

#[tokio::test]
async fn unauthorized_reference_fetch_aborts_whole_load() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    backend.push_material(Ok(sample_record()));
    backend.push_floors(Err(ApiError::Unauthorized));
    backend.push_units(Ok(sample_units()));

    let mut session = EditSession::new("7");
    let outcome = load_edit_bundle(&backend, "tok", "7").await;
    assert!(matches!(outcome, Err(ApiError::Unauthorized)));
    session.apply_load(outcome, &creds);

    assert_eq!(creds.load(), None);
    assert_eq!(session.phase, EditPhase::Loading);
    assert_eq!(session.draft, MaterialDraft::default());
    assert!(session.floor_options.is_empty());
    assert!(session.unit_options.is_empty());
}

#[tokio::test]
async fn submit_without_image_omits_binary_and_navigates() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    let mut session = loaded_session(&backend, &creds).await;

    session.draft.detail = "Grade S355, primed".to_string();
    assert!(session.begin_submit());
    backend.push_update(Ok(UpdateResponse {
        image_url: "/uploads/beam.jpg".into(),
    }));
    let outcome = backend
        .update_material("tok", &session.material_id, &session.draft, None)
        .await;
    let after = session.apply_submit(outcome, &creds);

    assert_eq!(after, AfterSubmit::GoToListing);
    let calls = backend.update_calls();
    assert_eq!(calls.len(), 1);
    let (id, draft, image) = &calls[0];
    assert_eq!(id, "7");
    assert_eq!(draft.detail, "Grade S355, primed");
    assert!(image.is_none());
}

#[tokio::test]
async fn submit_with_image_carries_file_bytes_and_updates_preview_url() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    let mut session = loaded_session(&backend, &creds).await;

    session.attach_image(PendingImage {
        file_name: "beam-new.png".into(),
        mime: "image/png".into(),
        bytes: vec![137, 80, 78, 71],
    });
    assert!(session.begin_submit());
    backend.push_update(Ok(UpdateResponse {
        image_url: "https://cdn/beam-new.png".into(),
    }));
    let outcome = backend
        .update_material(
            "tok",
            &session.material_id,
            &session.draft,
            session.pending_image.as_ref(),
        )
        .await;
    let after = session.apply_submit(outcome, &creds);

    assert_eq!(after, AfterSubmit::GoToListing);
    assert_eq!(session.image_url, "https://cdn/beam-new.png");
    assert_eq!(session.pending_image, None);

    let calls = backend.update_calls();
    let image = calls[0].2.as_ref().expect("image part present");
    assert_eq!(image.file_name, "beam-new.png");
    assert_eq!(image.bytes, vec![137, 80, 78, 71]);
}

#[tokio::test]
async fn unauthorized_update_clears_credential_and_stays() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    let mut session = loaded_session(&backend, &creds).await;

    assert!(session.begin_submit());
    backend.push_update(Err(ApiError::Unauthorized));
    let outcome = backend
        .update_material("tok", &session.material_id, &session.draft, None)
        .await;
    let after = session.apply_submit(outcome, &creds);

    assert_eq!(after, AfterSubmit::Stay);
    assert_eq!(creds.load(), None);
    // the form stays populated for whoever signs in again
    assert_eq!(session.draft.name, "Steel beam");
}

#[tokio::test]
async fn cancel_issues_no_update_request() {
    let backend = RecordingBackend::default();
    let creds = MemoryCredentials::with_token("tok");
    let mut session = loaded_session(&backend, &creds).await;

    // unsaved edits, then the operator cancels: navigation only, no call
    session.draft.name = "Steel beam (renamed)".to_string();
    drop(session);

    assert!(backend.update_calls().is_empty());
    assert_eq!(creds.load(), Some("tok".to_string()));
}
