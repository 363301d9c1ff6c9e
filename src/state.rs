//! Edit-session state: the editable draft, the loaded picker options, and
//! the `Loading → Ready → Submitting` lifecycle. All mutation happens on the
//! UI thread; network outcomes arrive here as values, and credential
//! clearing on 401 goes through the injected [`CredentialStore`].

use crate::api::{ApiError, EditBundle};
use crate::auth::CredentialStore;
use crate::model::{MaterialDraft, PendingImage, ReferenceOption, UpdateResponse};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Loading,
    Ready,
    Submitting,
}

/// Where the screen goes after a submit outcome is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSubmit {
    Stay,
    GoToListing,
}

pub struct EditSession {
    pub material_id: String,
    pub phase: EditPhase,
    pub draft: MaterialDraft,
    pub image_url: String,
    pub created_at: String,
    pub unit_options: Vec<ReferenceOption>,
    pub floor_options: Vec<ReferenceOption>,
    pub pending_image: Option<PendingImage>,
    pub last_error: Option<String>,
}

impl EditSession {
    pub fn new(material_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            phase: EditPhase::Loading,
            draft: MaterialDraft::default(),
            image_url: String::new(),
            created_at: String::new(),
            unit_options: Vec::new(),
            floor_options: Vec::new(),
            pending_image: None,
            last_error: None,
        }
    }

    /// Apply the joint-load outcome. On 401 the stored credential is cleared
    /// and the session stays blocked in `Loading`; nothing is ever populated
    /// from a partial success.
    pub fn apply_load(&mut self, outcome: Result<EditBundle, ApiError>, creds: &dyn CredentialStore) {
        match outcome {
            Ok(bundle) => {
                self.draft = MaterialDraft::from_record(&bundle.record);
                self.image_url = bundle.record.image_url;
                self.created_at = bundle.record.created_at;
                self.unit_options = bundle.unit_options;
                self.floor_options = bundle.floor_options;
                self.phase = EditPhase::Ready;
                self.last_error = None;
            }
            Err(ApiError::Unauthorized) => {
                warn!(material_id = %self.material_id, "credential rejected while loading; signing out");
                creds.clear();
                self.last_error = Some("Session expired, sign in again".to_string());
            }
            Err(err) => {
                error!(%err, material_id = %self.material_id, "material load failed");
                self.last_error = Some(format!("Load failed: {err}"));
            }
        }
    }

    /// Move into `Submitting`. Returns false while a flight is already out
    /// or the form never finished loading.
    pub fn begin_submit(&mut self) -> bool {
        if self.phase != EditPhase::Ready {
            return false;
        }
        self.phase = EditPhase::Submitting;
        true
    }

    pub fn apply_submit(
        &mut self,
        outcome: Result<UpdateResponse, ApiError>,
        creds: &dyn CredentialStore,
    ) -> AfterSubmit {
        self.phase = EditPhase::Ready;
        match outcome {
            Ok(response) => {
                self.image_url = response.image_url;
                self.pending_image = None;
                self.last_error = None;
                AfterSubmit::GoToListing
            }
            Err(ApiError::Unauthorized) => {
                warn!(material_id = %self.material_id, "credential rejected on update; signing out");
                creds.clear();
                self.last_error = Some("Session expired, sign in again".to_string());
                AfterSubmit::Stay
            }
            Err(err) => {
                error!(%err, material_id = %self.material_id, "material update failed");
                self.last_error = Some(format!("Update failed: {err}"));
                AfterSubmit::Stay
            }
        }
    }

    /// Keep a newly picked file for submission. The preview is handled
    /// separately; a failed decode never discards the selection.
    pub fn attach_image(&mut self, image: PendingImage) {
        self.pending_image = Some(image);
    }
}

/// RGBA pixels ready to become an egui texture.
#[derive(Debug, Clone)]
pub struct DecodedPreview {
    pub size: [usize; 2],
    pub rgba: Vec<u8>,
}

/// Single best-effort decode; `None` means the caller keeps whatever
/// preview it already had.
pub fn decode_preview(bytes: &[u8]) -> Option<DecodedPreview> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!(%err, "image decode failed; keeping previous preview");
            return None;
        }
    };
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Some(DecodedPreview {
        size,
        rgba: rgba.into_raw(),
    })
}

/// Content type for the multipart file part, sniffed from the bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}
