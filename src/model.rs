use serde::{Deserialize, Deserializer, Serialize};

/// Wrapper the backend puts around every successful JSON payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// One material record as the backend returns it. Identifiers and `total`
/// arrive as JSON strings or numbers depending on the backend build, so they
/// are normalized to strings on the way in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    #[serde(deserialize_with = "string_or_number", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub unit_id: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub floor_id: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub total: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub created_at: String,
}

/// A `{id, name}` row from the floor or unit reference endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefEntry {
    #[serde(deserialize_with = "string_or_number", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Picker entry derived from a [`RefEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOption {
    pub value: String,
    pub label: String,
}

/// Map reference rows to picker options, preserving source order.
pub fn reference_options(entries: Vec<RefEntry>) -> Vec<ReferenceOption> {
    entries
        .into_iter()
        .map(|entry| ReferenceOption {
            value: entry.id,
            label: entry.name,
        })
        .collect()
}

/// The editable copy of a record held for the duration of an edit session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialDraft {
    pub name: String,
    pub detail: String,
    pub unit_id: String,
    pub floor_id: String,
    pub total: String,
}

impl MaterialDraft {
    pub fn from_record(record: &MaterialRecord) -> Self {
        Self {
            name: record.name.clone(),
            detail: record.detail.clone(),
            unit_id: record.unit_id.clone(),
            floor_id: record.floor_id.clone(),
            total: record.total.clone(),
        }
    }
}

/// A locally selected replacement image, kept in memory until submit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Body of a successful material update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) => value.to_string(),
    })
}
