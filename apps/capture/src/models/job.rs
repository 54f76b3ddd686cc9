use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field the pipeline stamps with the source tab's address.
pub const URL_FIELD: &str = "url";
/// Field the pipeline stamps with the capture timestamp.
pub const APPLIED_DATE_FIELD: &str = "appliedDate";
const ID_FIELD: &str = "id";

/// Structured job-application value returned by the extraction service.
///
/// The shape is owned by the service; the pipeline only requires it to be a
/// JSON object so `url` and `appliedDate` can be attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobApplicationDraft(Map<String, Value>);

impl JobApplicationDraft {
    /// Accepts only JSON objects; anything else is not a usable draft.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stable serialization of the extracted fields (keys sorted).
    pub fn canonical_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Attaches the pipeline-owned fields and produces the save payload.
    ///
    /// `url` and `appliedDate` always overwrite whatever the service returned
    /// under those names. A service-supplied `id` is dropped: identity is
    /// assigned by the persistence service.
    pub fn into_submission(mut self, url: &str, applied_at: DateTime<Utc>) -> JobSubmission {
        self.0.remove(ID_FIELD);
        self.0
            .insert(URL_FIELD.to_string(), Value::String(url.to_string()));
        self.0.insert(
            APPLIED_DATE_FIELD.to_string(),
            Value::String(applied_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        JobSubmission(self.0)
    }
}

/// A draft with `url` and `appliedDate` attached; the body of a save call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobSubmission(Map<String, Value>);

impl JobSubmission {
    pub fn url(&self) -> &str {
        self.0
            .get(URL_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn applied_date(&self) -> &str {
        self.0
            .get(APPLIED_DATE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A stored job application as listed by the persistence service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplicationRecord {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub applied_date: String,
    /// Extraction-derived fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobApplicationRecord {
    /// Calendar date of `applied_date` as `M/D/YYYY` (UTC), or `Invalid Date`.
    pub fn display_date(&self) -> String {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.applied_date) {
            return ts.with_timezone(&Utc).format("%-m/%-d/%Y").to_string();
        }
        NaiveDate::parse_from_str(&self.applied_date, "%Y-%m-%d")
            .map(|d| d.format("%-m/%-d/%Y").to_string())
            .unwrap_or_else(|_| "Invalid Date".to_string())
    }
}

/// Ids are opaque: the service may hand back strings or numbers.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("unsupported record id: {other}"))),
    }
}
