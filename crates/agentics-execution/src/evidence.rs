//! Attachments recorded on spans: artifacts and evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An output object produced while a span was running.
///
/// Owned by the span it is attached to; never shared between spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable reference for the artifact. Must be non-empty.
    pub id: String,
    /// Artifact type (e.g. "operation_result", "decision_event").
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub name: String,
    /// Opaque artifact payload.
    pub content: serde_json::Value,
    pub produced_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        id: impl Into<String>,
        artifact_type: impl Into<String>,
        name: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            artifact_type: artifact_type.into(),
            name: name.into(),
            content,
            produced_at: Utc::now(),
        }
    }

    /// Build an artifact from any JSON-serializable output.
    pub fn from_json_output<T: Serialize>(
        artifact_type: &str,
        id: &str,
        name: &str,
        output: &T,
    ) -> serde_json::Result<Self> {
        let content = serde_json::to_value(output)?;
        Ok(Self::new(id, artifact_type, name, content))
    }
}

/// Kind of proof an [`Evidence`] entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Id,
    Hash,
    Uri,
}

/// A machine-checkable pointer to proof that an action occurred.
///
/// Evidence is always an explicit value handed in by the code that performed
/// the action; it is never inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    /// Must be non-empty.
    pub value: String,
    pub description: String,
}

impl Evidence {
    pub fn new(
        evidence_type: EvidenceType,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            evidence_type,
            value: value.into(),
            description: description.into(),
        }
    }

    pub fn id(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(EvidenceType::Id, value, description)
    }

    pub fn hash(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(EvidenceType::Hash, value, description)
    }

    pub fn uri(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(EvidenceType::Uri, value, description)
    }

    /// Hash evidence over the JSON encoding of `payload` (SHA-256, lowercase hex).
    pub fn sha256_of<T: Serialize>(
        payload: &T,
        description: impl Into<String>,
    ) -> serde_json::Result<Self> {
        let bytes = serde_json::to_vec(payload)?;
        let digest = Sha256::digest(&bytes);
        Ok(Self::hash(hex::encode(digest), description))
    }

    pub fn is_verifiable(&self) -> bool {
        !self.value.is_empty()
    }
}
