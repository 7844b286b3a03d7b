//! Passage data model
//!
//! A passage is the immutable retrievable unit produced by ingestion. This
//! subsystem only ever reads passages; freshness is recomputed at query time
//! from `last_updated` instead of being stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Independently boostable passage fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageField {
    Title,
    JobName,
    Workstation,
    ErrorCode,
    MessageId,
    Body,
}

impl PassageField {
    /// All fields, in index schema order
    pub const ALL: [PassageField; 6] = [
        PassageField::Title,
        PassageField::JobName,
        PassageField::Workstation,
        PassageField::ErrorCode,
        PassageField::MessageId,
        PassageField::Body,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PassageField::Title => "title",
            PassageField::JobName => "job_name",
            PassageField::Workstation => "workstation",
            PassageField::ErrorCode => "error_code",
            PassageField::MessageId => "message_id",
            PassageField::Body => "body",
        }
    }
}

impl fmt::Display for PassageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document type, ordered from most to least authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Policy,
    Manual,
    #[serde(alias = "kb")]
    KnowledgeBase,
    Blog,
    Forum,
}

impl DocType {
    /// Tier position, 0 = most authoritative
    pub fn rank(&self) -> u8 {
        match self {
            DocType::Policy => 0,
            DocType::Manual => 1,
            DocType::KnowledgeBase => 2,
            DocType::Blog => 3,
            DocType::Forum => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Policy => "policy",
            DocType::Manual => "manual",
            DocType::KnowledgeBase => "knowledge_base",
            DocType::Blog => "blog",
            DocType::Forum => "forum",
        }
    }

    /// Parse from a filter or config string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "policy" => Some(Self::Policy),
            "manual" => Some(Self::Manual),
            "knowledge_base" | "knowledge-base" | "kb" => Some(Self::KnowledgeBase),
            "blog" => Some(Self::Blog),
            "forum" => Some(Self::Forum),
            _ => None,
        }
    }
}

/// Provenance tier of the source, ordered from most to least trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Verified,
    Official,
    Curated,
    Community,
    Generated,
}

impl SourceTier {
    /// Tier position, 0 = most trusted
    pub fn rank(&self) -> u8 {
        match self {
            SourceTier::Verified => 0,
            SourceTier::Official => 1,
            SourceTier::Curated => 2,
            SourceTier::Community => 3,
            SourceTier::Generated => 4,
        }
    }
}

/// Passage metadata
///
/// Every field is optional: ingestion does not guarantee completeness, and
/// missing metadata is itself a ranking signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default)]
    pub doc_type: Option<DocType>,
    #[serde(default)]
    pub source_tier: Option<SourceTier>,
    /// 1 (most authoritative) to 5
    #[serde(default)]
    pub authority_tier: Option<u8>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub doc_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

/// Retrievable unit of knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub document_id: String,
    pub content: String,
    /// Field-segmented text; `Body` falls back to `content` when absent
    #[serde(default)]
    pub fields: BTreeMap<PassageField, String>,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            content: content.into(),
            fields: BTreeMap::new(),
            metadata: PassageMetadata::default(),
        }
    }

    pub fn with_field(mut self, field: PassageField, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: PassageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Text of a field, with `Body` defaulting to the passage content
    pub fn field_text(&self, field: PassageField) -> Option<&str> {
        match self.fields.get(&field) {
            Some(value) => Some(value.as_str()),
            None if field == PassageField::Body => Some(self.content.as_str()),
            None => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.field_text(PassageField::Title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_falls_back_to_content() {
        let passage = Passage::new("p1", "d1", "job failed with RC=8");
        assert_eq!(passage.field_text(PassageField::Body), Some("job failed with RC=8"));
        assert_eq!(passage.field_text(PassageField::Title), None);

        let passage = passage.with_field(PassageField::Body, "override");
        assert_eq!(passage.field_text(PassageField::Body), Some("override"));
    }

    #[test]
    fn test_tier_ordering() {
        assert!(DocType::Policy.rank() < DocType::Forum.rank());
        assert!(SourceTier::Verified.rank() < SourceTier::Generated.rank());
        assert_eq!(DocType::parse("KB"), Some(DocType::KnowledgeBase));
        assert_eq!(DocType::parse("wiki"), None);
    }

    #[test]
    fn test_passage_deserialize_with_defaults() {
        let json = r#"{
            "id": "p1",
            "document_id": "runbook-7",
            "content": "Restart the agent on CPU_01",
            "fields": { "workstation": "CPU_01" },
            "metadata": { "doc_type": "kb", "authority_tier": 2 }
        }"#;
        let passage: Passage = serde_json::from_str(json).unwrap();
        assert_eq!(passage.metadata.doc_type, Some(DocType::KnowledgeBase));
        assert_eq!(passage.metadata.authority_tier, Some(2));
        assert!(!passage.metadata.is_deprecated);
        assert_eq!(passage.field_text(PassageField::Workstation), Some("CPU_01"));
    }
}
