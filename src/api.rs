//! HTTP client for the facilities backend.
//!
//! All record and reference payloads arrive wrapped in `{ "data": … }`; a
//! 401 anywhere maps to [`ApiError::Unauthorized`] so callers can clear the
//! stored credential without inspecting status codes themselves.

use crate::model::{
    reference_options, Envelope, MaterialDraft, MaterialRecord, PendingImage, RefEntry,
    ReferenceOption, UpdateResponse,
};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("credential rejected or expired (401)")]
    Unauthorized,
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// Seam over the backend so flows can run against a recording double.
#[async_trait]
pub trait MaterialService: Send + Sync {
    async fn material(&self, token: &str, id: &str) -> Result<MaterialRecord, ApiError>;
    async fn materials(&self, token: &str) -> Result<Vec<MaterialRecord>, ApiError>;
    async fn floors(&self, token: &str) -> Result<Vec<RefEntry>, ApiError>;
    async fn units(&self, token: &str) -> Result<Vec<RefEntry>, ApiError>;
    async fn update_material(
        &self,
        token: &str,
        id: &str,
        draft: &MaterialDraft,
        image: Option<&PendingImage>,
    ) -> Result<UpdateResponse, ApiError>;
}

pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(mut base_url: Url) -> Self {
        // Url::join drops the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let http = Client::builder()
            .user_agent(concat!("stockdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client");
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Endpoint(format!("{path}: {err}")))
    }

    pub fn get_request(&self, path: &str, token: &str) -> Result<reqwest::Request, ApiError> {
        Ok(self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(token)
            .build()?)
    }

    async fn fetch_data<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let request = self.get_request(path, token)?;
        debug!(url = %request.url(), "fetching");
        let response = self.http.execute(request).await?;
        read_json::<Envelope<T>>(response)
            .await
            .map(|envelope| envelope.data)
    }

    pub async fn material(&self, token: &str, id: &str) -> Result<MaterialRecord, ApiError> {
        self.fetch_data(&format!("material/{id}"), token).await
    }

    pub async fn materials(&self, token: &str) -> Result<Vec<MaterialRecord>, ApiError> {
        self.fetch_data("material", token).await
    }

    pub async fn floors(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        self.fetch_data("floor", token).await
    }

    pub async fn units(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        self.fetch_data("unit", token).await
    }

    pub async fn update_material(
        &self,
        token: &str,
        id: &str,
        draft: &MaterialDraft,
        image: Option<&PendingImage>,
    ) -> Result<UpdateResponse, ApiError> {
        let endpoint = self.endpoint(&format!("material/{id}"))?;
        let form = multipart_form(update_parts(draft, image))?;
        debug!(url = %endpoint, has_image = image.is_some(), "submitting material update");
        let response = self
            .http
            .put(endpoint)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        read_json::<UpdateResponse>(response).await
    }

    /// Best-effort download of the record's current image for the preview.
    /// Image URLs are served publicly, so no bearer credential is attached.
    pub async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            Url::parse(url).map_err(|err| ApiError::Endpoint(format!("{url}: {err}")))?
        } else {
            self.endpoint(url.trim_start_matches('/'))?
        };
        let response = self.http.get(target).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MaterialService for BackendClient {
    async fn material(&self, token: &str, id: &str) -> Result<MaterialRecord, ApiError> {
        BackendClient::material(self, token, id).await
    }

    async fn materials(&self, token: &str) -> Result<Vec<MaterialRecord>, ApiError> {
        BackendClient::materials(self, token).await
    }

    async fn floors(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        BackendClient::floors(self, token).await
    }

    async fn units(&self, token: &str) -> Result<Vec<RefEntry>, ApiError> {
        BackendClient::units(self, token).await
    }

    async fn update_material(
        &self,
        token: &str,
        id: &str,
        draft: &MaterialDraft,
        image: Option<&PendingImage>,
    ) -> Result<UpdateResponse, ApiError> {
        BackendClient::update_material(self, token, id, draft, image).await
    }
}

/// Everything the edit screen needs, fetched in one joint load.
#[derive(Debug, Clone)]
pub struct EditBundle {
    pub record: MaterialRecord,
    pub floor_options: Vec<ReferenceOption>,
    pub unit_options: Vec<ReferenceOption>,
}

/// Fetch the record plus both reference lists concurrently. A failure in any
/// one invalidates the whole load, so no field state can ever be populated
/// from a partial success.
pub async fn load_edit_bundle(
    service: &dyn MaterialService,
    token: &str,
    id: &str,
) -> Result<EditBundle, ApiError> {
    let (record, floors, units) = tokio::try_join!(
        service.material(token, id),
        service.floors(token),
        service.units(token),
    )?;
    Ok(EditBundle {
        record,
        floor_options: reference_options(floors),
        unit_options: reference_options(units),
    })
}

/// One field of the multipart update body.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePart {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

/// Serialize the draft plus the pending image into multipart fields, in the
/// order the backend expects: `name, image_url, detail, floor_id, total,
/// unit_id`. The binary field is omitted entirely when no file was picked.
pub fn update_parts(draft: &MaterialDraft, image: Option<&PendingImage>) -> Vec<UpdatePart> {
    let mut parts = vec![UpdatePart::Text {
        name: "name",
        value: draft.name.clone(),
    }];
    if let Some(image) = image {
        parts.push(UpdatePart::File {
            name: "image_url",
            file_name: image.file_name.clone(),
            mime: image.mime.clone(),
            bytes: image.bytes.clone(),
        });
    }
    parts.push(UpdatePart::Text {
        name: "detail",
        value: draft.detail.clone(),
    });
    parts.push(UpdatePart::Text {
        name: "floor_id",
        value: draft.floor_id.clone(),
    });
    parts.push(UpdatePart::Text {
        name: "total",
        value: draft.total.clone(),
    });
    parts.push(UpdatePart::Text {
        name: "unit_id",
        value: draft.unit_id.clone(),
    });
    parts
}

fn multipart_form(parts: Vec<UpdatePart>) -> Result<multipart::Form, ApiError> {
    let mut form = multipart::Form::new();
    for part in parts {
        form = match part {
            UpdatePart::Text { name, value } => form.text(name, value),
            UpdatePart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime)?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
